use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::AppointmentState;
use availability_cell::router::availability_routes;
use availability_cell::AvailabilityState;
use payment_cell::PaymentGateway;
use shared_config::AppConfig;
use shared_database::SchedulingStore;

pub fn create_router(
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    payments: Arc<dyn PaymentGateway>,
) -> Router {
    let availability_state = AvailabilityState::new(config.clone(), store.clone());
    let appointment_state = AppointmentState::new(config, store, payments);

    Router::new()
        .route("/", get(|| async { "Telehealth booking API is running!" }))
        .merge(availability_routes(availability_state))
        .nest("/appointments", appointment_routes(appointment_state))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use payment_cell::RazorpayClient;
    use shared_database::InMemoryStore;
    use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

    fn app(config: &TestConfig) -> Router {
        let app_config = config.to_arc();
        let payments = Arc::new(RazorpayClient::new(&app_config));
        create_router(app_config, Arc::new(InMemoryStore::new()), payments)
    }

    #[tokio::test]
    async fn test_health_and_mounted_cells() {
        let config = TestConfig::default();
        let app = app(&config);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let provider = TestUser::doctor("doc@example.com");
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/availability?provider_id={}&date=2026-03-02", provider.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let token = JwtTestUtils::create_test_token(&provider, &config.jwt_secret, None);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/appointments")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let listed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(listed["total"], 0);
    }
}
