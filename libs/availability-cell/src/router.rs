use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AvailabilityState;

pub fn availability_routes(state: AvailabilityState) -> Router {
    let public_routes = Router::new()
        .route("/availability", get(handlers::get_availability))
        .route("/providers/{provider_id}/rate", get(handlers::get_provider_rate));

    let protected_routes = Router::new()
        .route("/availability", post(handlers::set_availability))
        .route("/providers/me/rate", put(handlers::set_provider_rate))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
