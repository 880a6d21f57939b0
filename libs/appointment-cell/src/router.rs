use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppointmentState;

pub fn appointment_routes(state: AppointmentState) -> Router {
    // All appointment operations require authentication
    let protected_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/payment-intent", post(handlers::create_payment_intent))
        .route("/confirm", post(handlers::confirm_booking))
        .route(
            "/{appointment_id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::cancel_appointment),
        )
        .route("/{appointment_id}/refund", post(handlers::refund_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
