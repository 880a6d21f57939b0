mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use shared_models::error::AppError;

use appointment_cell::services::appointments::AppointmentService;
use appointment_cell::services::booking::BookingService;
use appointment_cell::{AppointmentError, PaymentIntentRequest};
use payment_cell::{PaymentError, PaymentGateway};
use shared_database::SchedulingStore;
use shared_models::scheduling::{AppointmentStatus, ConsultationMode, PaymentStatus};

use common::{day, first_slot, paid_order, t, Harness, MockGateway};

fn intent(h: &Harness) -> PaymentIntentRequest {
    PaymentIntentRequest {
        provider_id: h.provider.uuid(),
        date: day(),
        start_time: t(9, 0),
        end_time: t(9, 30),
        consultation_mode: ConsultationMode::Chat,
        reason: None,
        notes: None,
    }
}

fn gateway_down() -> PaymentError {
    PaymentError::Gateway { message: "HTTP 503 Service Unavailable: upstream down".to_string() }
}

#[tokio::test]
async fn test_order_creation_failure_surfaces_as_bad_gateway() {
    let h = Harness::new().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_order().times(1).returning(|_| Err(gateway_down()));
    gateway.expect_key_id().never();

    let state = h.state_with(Arc::new(gateway));
    let result = BookingService::new(&state).create_payment_intent(h.patient.uuid(), intent(&h)).await;

    let error = result.unwrap_err();
    assert_matches!(error, AppointmentError::Payment(PaymentError::Gateway { .. }));
    let app_error: AppError = error.into();
    assert_eq!(app_error.status_code(), axum::http::StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_unconfigured_gateway_is_internal_error() {
    let h = Harness::new().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_order().returning(|_| Err(PaymentError::NotConfigured));

    let state = h.state_with(Arc::new(gateway));
    let error = BookingService::new(&state)
        .create_payment_intent(h.patient.uuid(), intent(&h))
        .await
        .unwrap_err();

    let app_error: AppError = error.into();
    assert_matches!(app_error, AppError::Internal(_));
}

#[tokio::test]
async fn test_order_lookup_failure_creates_no_appointment() {
    let h = Harness::new().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch_order()
        .withf(|order_id| order_id == "order_missing")
        .times(1)
        .returning(|_| Err(gateway_down()));

    let state = h.state_with(Arc::new(gateway));
    let result = BookingService::new(&state)
        .confirm_booking(h.patient.uuid(), h.signed_confirmation("order_missing", "pay_missing"))
        .await;

    assert_matches!(result, Err(AppointmentError::Payment(PaymentError::Gateway { .. })));
    assert!(h.store.find_appointment_by_payment_order("order_missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_order_without_booking_notes_is_rejected() {
    let h = Harness::new().await;
    let metadata = h.metadata(&h.patient, first_slot());
    let mut gateway = MockGateway::new();
    gateway.expect_fetch_order().returning(move |order_id| {
        let mut order = paid_order(order_id, &metadata);
        order.notes.remove("start_time");
        Ok(order)
    });

    let state = h.state_with(Arc::new(gateway));
    let result = BookingService::new(&state)
        .confirm_booking(h.patient.uuid(), h.signed_confirmation("order_bare", "pay_bare"))
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidMetadata(msg)) if msg.contains("start_time"));
    assert!(h.store.find_appointment_by_payment_order("order_bare").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_refund_leaves_appointment_unchanged() {
    let h = Harness::new().await;
    let metadata = h.metadata(&h.patient, first_slot());

    let mut gateway = MockGateway::new();
    let order = paid_order("order_keep", &metadata);
    gateway.expect_fetch_order().returning(move |_| Ok(order.clone()));
    gateway
        .expect_refund()
        .withf(|payment_id, amount| payment_id == "pay_keep" && *amount == common::FEE_MINOR)
        .times(1)
        .returning(|_, _| Err(gateway_down()));

    let state = h.state_with(Arc::new(gateway));
    let appointment = BookingService::new(&state)
        .confirm_booking(h.patient.uuid(), h.signed_confirmation("order_keep", "pay_keep"))
        .await
        .unwrap();

    let result = AppointmentService::new(&state).refund(&h.provider.to_user(), appointment.id).await;
    assert_matches!(result, Err(AppointmentError::Payment(_)));

    let stored = h.store.get_appointment(appointment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
    assert_eq!(stored.payment_status, PaymentStatus::Paid);
    assert!(stored.refund_id.is_none());

    let availability = h.store.find_availability(h.provider.uuid(), day()).await.unwrap().unwrap();
    assert!(availability.find_slot(&first_slot()).unwrap().is_booked);
}

#[tokio::test]
async fn test_key_id_comes_from_gateway() {
    let h = Harness::new().await;
    let gateway = common::recording_gateway();
    assert_eq!(gateway.key_id(), "rzp_test_key");

    let state = h.state_with(Arc::new(gateway));
    let intent = BookingService::new(&state)
        .create_payment_intent(h.patient.uuid(), intent(&h))
        .await
        .unwrap();
    assert_eq!(intent.key_id, "rzp_test_key");
    assert!(intent.order_id.starts_with("order_"));
}
