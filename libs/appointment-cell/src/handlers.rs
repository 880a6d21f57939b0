use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::user_uuid;

use crate::models::{
    AppointmentListQuery, CancelAppointmentQuery, ConfirmBookingRequest, PaymentIntentRequest,
    UpdateAppointmentRequest,
};
use crate::services::{appointments::AppointmentService, booking::BookingService};
use crate::state::AppointmentState;

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn create_payment_intent(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<PaymentIntentRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user_uuid(&user)?;
    let booking_service = BookingService::new(&state);

    let intent = booking_service.create_payment_intent(patient_id, request).await?;
    Ok(Json(json!(intent)))
}

#[axum::debug_handler]
pub async fn confirm_booking(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Json(request): Json<ConfirmBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let patient_id = user_uuid(&user)?;
    let booking_service = BookingService::new(&state);

    let appointment = booking_service.confirm_booking(patient_id, request).await?;
    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment booked"
    })))
}

// ==============================================================================
// APPOINTMENT MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;
    let appointment_service = AppointmentService::new(&state);

    let appointments = appointment_service.list_for_user(user_id, query.status).await?;
    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);
    let appointment = appointment_service.get(&user, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);
    let appointment = appointment_service.update_status(&user, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Query(query): Query<CancelAppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);
    let appointment = appointment_service.cancel(&user, appointment_id, query.reason).await?;
    Ok(Json(json!({
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn refund_appointment(
    State(state): State<AppointmentState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointment_service = AppointmentService::new(&state);
    let appointment = appointment_service.refund(&user, appointment_id).await?;
    Ok(Json(json!({
        "appointment": appointment,
        "message": "Payment refunded"
    })))
}
