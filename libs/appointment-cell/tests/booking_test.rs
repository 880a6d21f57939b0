mod common;

use assert_matches::assert_matches;
use futures::future::join_all;
use serde_json::json;
use shared_models::error::AppError;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::services::booking::BookingService;
use appointment_cell::{AppointmentError, PaymentIntentRequest};
use payment_cell::{payment_signature, PaymentError};
use shared_database::SchedulingStore;
use shared_models::scheduling::{
    AppointmentStatus, ConsultationMode, PaymentStatus, ScheduleUpdate,
};
use shared_utils::test_utils::TestUser;

use common::{day, first_slot, mount_paid_order, t, Harness, FEE_MINOR};

fn intent_for(h: &Harness, start: (u32, u32), end: (u32, u32)) -> PaymentIntentRequest {
    PaymentIntentRequest {
        provider_id: h.provider.uuid(),
        date: day(),
        start_time: t(start.0, start.1),
        end_time: t(end.0, end.1),
        consultation_mode: ConsultationMode::Video,
        reason: Some("Follow-up".to_string()),
        notes: None,
    }
}

#[tokio::test]
async fn test_payment_intent_prices_from_provider_rate() {
    let h = Harness::new().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({
            "amount": FEE_MINOR,
            "currency": "INR",
            "notes": {
                "patient_id": h.patient.id,
                "provider_id": h.provider.id,
                "date": "2026-03-02",
                "start_time": "09:00:00",
                "end_time": "09:30:00",
                "timezone": "Asia/Kolkata",
                "consultation_mode": "video"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_intent",
            "entity": "order",
            "amount": FEE_MINOR,
            "currency": "INR",
            "status": "created",
            "notes": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = BookingService::new(&h.http_state(&server));
    let intent = service
        .create_payment_intent(h.patient.uuid(), intent_for(&h, (9, 0), (9, 30)))
        .await
        .unwrap();

    assert_eq!(intent.order_id, "order_intent");
    assert_eq!(intent.amount_minor, FEE_MINOR);
    assert_eq!(intent.key_id, "rzp_test_key");

    // No appointment exists until payment is confirmed.
    let appointments = h.store.list_appointments_for_user(h.patient.uuid()).await.unwrap();
    assert!(appointments.is_empty());
}

#[tokio::test]
async fn test_payment_intent_validates_slot_and_rate() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let service = BookingService::new(&h.http_state(&server));

    assert_matches!(
        service.create_payment_intent(h.patient.uuid(), intent_for(&h, (9, 15), (9, 45))).await,
        Err(AppointmentError::SlotNotFound)
    );

    let mut wrong_day = intent_for(&h, (9, 0), (9, 30));
    wrong_day.date = day().succ_opt().unwrap();
    assert_matches!(
        service.create_payment_intent(h.patient.uuid(), wrong_day).await,
        Err(AppointmentError::NoAvailability)
    );

    assert_matches!(
        service.create_payment_intent(h.provider.uuid(), intent_for(&h, (9, 0), (9, 30))).await,
        Err(AppointmentError::ValidationError(_))
    );

    let mut long_reason = intent_for(&h, (9, 0), (9, 30));
    long_reason.reason = Some("x".repeat(300));
    assert_matches!(
        service.create_payment_intent(h.patient.uuid(), long_reason).await,
        Err(AppointmentError::ValidationError(_))
    );

    h.store
        .claim_slot(h.provider.uuid(), day(), first_slot(), uuid::Uuid::new_v4())
        .await
        .unwrap();
    assert_matches!(
        service.create_payment_intent(h.patient.uuid(), intent_for(&h, (9, 0), (9, 30))).await,
        Err(AppointmentError::SlotUnavailable)
    );

    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_payment_intent_requires_rate() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let other = TestUser::doctor("other@example.com");

    h.store
        .apply_schedule(ScheduleUpdate {
            provider_id: other.uuid(),
            date: day(),
            timezone: "UTC".to_string(),
            is_available: true,
            working_window: Some(first_slot()),
            break_window: None,
            slot_duration_minutes: Some(30),
            candidate_slots: vec![first_slot()],
        })
        .await
        .unwrap();

    let mut request = intent_for(&h, (9, 0), (9, 30));
    request.provider_id = other.uuid();

    let service = BookingService::new(&h.http_state(&server));
    assert_matches!(
        service.create_payment_intent(h.patient.uuid(), request).await,
        Err(AppointmentError::RateNotFound)
    );
}

#[tokio::test]
async fn test_confirm_books_the_slot() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let metadata = h.metadata(&h.patient, first_slot());
    mount_paid_order(&server, "order_ok", &metadata).await;

    let service = BookingService::new(&h.http_state(&server));
    let appointment = service
        .confirm_booking(h.patient.uuid(), h.signed_confirmation("order_ok", "pay_ok"))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.payment_status, PaymentStatus::Paid);
    assert_eq!(appointment.fee_minor, FEE_MINOR);
    assert_eq!(appointment.payment_id.as_deref(), Some("pay_ok"));
    assert_eq!(appointment.timezone, "Asia/Kolkata");

    let availability = h.store.find_availability(h.provider.uuid(), day()).await.unwrap().unwrap();
    let slot = availability.find_slot(&first_slot()).unwrap();
    assert!(slot.is_booked);
    assert_eq!(slot.appointment_id, Some(appointment.id));
}

#[tokio::test]
async fn test_tampered_signature_creates_nothing() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let metadata = h.metadata(&h.patient, first_slot());
    mount_paid_order(&server, "order_sig", &metadata).await;

    let service = BookingService::new(&h.http_state(&server));

    let mut tampered_payment = h.signed_confirmation("order_sig", "pay_real");
    tampered_payment.payment_id = "pay_forged".to_string();
    let result = service.confirm_booking(h.patient.uuid(), tampered_payment).await;
    assert_matches!(result, Err(AppointmentError::Payment(PaymentError::SignatureMismatch)));

    let mut tampered_signature = h.signed_confirmation("order_sig", "pay_real");
    tampered_signature.signature = payment_signature("guessed-secret", "order_sig", "pay_real").unwrap();
    let result = service.confirm_booking(h.patient.uuid(), tampered_signature).await;
    let app_error: AppError = result.unwrap_err().into();
    assert_matches!(app_error, AppError::Integrity(_));

    assert!(h.store.find_appointment_by_payment_order("order_sig").await.unwrap().is_none());
    let availability = h.store.find_availability(h.provider.uuid(), day()).await.unwrap().unwrap();
    assert!(availability.slots.iter().all(|slot| !slot.is_booked));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_duplicate_callback_is_rejected() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let metadata = h.metadata(&h.patient, first_slot());
    mount_paid_order(&server, "order_dup", &metadata).await;

    let service = BookingService::new(&h.http_state(&server));
    let confirmation = h.signed_confirmation("order_dup", "pay_dup");

    let first = service.confirm_booking(h.patient.uuid(), confirmation.clone()).await.unwrap();
    let second = service.confirm_booking(h.patient.uuid(), confirmation).await;

    assert_matches!(second, Err(AppointmentError::DuplicateConfirmation(order)) if order == "order_dup");
    let stored = h.store.get_appointment(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
async fn test_concurrent_confirmations_book_once() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    let second_patient = TestUser::patient("second@example.com");

    mount_paid_order(&server, "order_a", &h.metadata(&h.patient, first_slot())).await;
    mount_paid_order(&server, "order_b", &h.metadata(&second_patient, first_slot())).await;

    let state = h.http_state(&server);
    let first = BookingService::new(&state);
    let second = BookingService::new(&state);

    let results = join_all(vec![
        first.confirm_booking(h.patient.uuid(), h.signed_confirmation("order_a", "pay_a")),
        second.confirm_booking(second_patient.uuid(), h.signed_confirmation("order_b", "pay_b")),
    ])
    .await;

    let booked: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].status, AppointmentStatus::Scheduled);

    let conflict = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    let (losing_order, losing_appointment) = match conflict {
        AppointmentError::PaymentCapturedConflict { order_id, appointment_id, .. } => {
            (order_id.clone(), appointment_id.unwrap())
        }
        other => panic!("expected PaymentCapturedConflict, got {:?}", other),
    };

    let failed = h.store.get_appointment(losing_appointment).await.unwrap().unwrap();
    assert_eq!(failed.payment_order_id, losing_order);
    assert_eq!(failed.status, AppointmentStatus::Failed);
    assert_eq!(failed.payment_status, PaymentStatus::RefundRequired);

    let availability = h.store.find_availability(h.provider.uuid(), day()).await.unwrap().unwrap();
    let slot = availability.find_slot(&first_slot()).unwrap();
    assert_eq!(slot.appointment_id, Some(booked[0].id));
}

#[tokio::test]
async fn test_slot_gone_after_payment_requires_refund() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    mount_paid_order(&server, "order_late", &h.metadata(&h.patient, first_slot())).await;

    // Provider closes the day between checkout and confirmation.
    h.store
        .apply_schedule(ScheduleUpdate {
            provider_id: h.provider.uuid(),
            date: day(),
            timezone: "Asia/Kolkata".to_string(),
            is_available: false,
            working_window: None,
            break_window: None,
            slot_duration_minutes: None,
            candidate_slots: vec![],
        })
        .await
        .unwrap();

    let service = BookingService::new(&h.http_state(&server));
    let result = service
        .confirm_booking(h.patient.uuid(), h.signed_confirmation("order_late", "pay_late"))
        .await;

    assert_matches!(result, Err(AppointmentError::PaymentCapturedConflict { ref payment_id, .. }) if payment_id == "pay_late");
    let app_error: AppError = result.unwrap_err().into();
    assert_eq!(app_error.status_code(), axum::http::StatusCode::CONFLICT);

    let recorded = h.store.find_appointment_by_payment_order("order_late").await.unwrap().unwrap();
    assert_eq!(recorded.payment_status, PaymentStatus::RefundRequired);
}

#[tokio::test]
async fn test_only_the_paying_patient_can_confirm() {
    let h = Harness::new().await;
    let server = MockServer::start().await;
    mount_paid_order(&server, "order_owned", &h.metadata(&h.patient, first_slot())).await;

    let intruder = TestUser::patient("intruder@example.com");
    let service = BookingService::new(&h.http_state(&server));
    let result = service
        .confirm_booking(intruder.uuid(), h.signed_confirmation("order_owned", "pay_owned"))
        .await;

    assert_matches!(result, Err(AppointmentError::Unauthorized));
    assert!(h.store.find_appointment_by_payment_order("order_owned").await.unwrap().is_none());
}
