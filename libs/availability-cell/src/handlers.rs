use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;

use crate::models::{AvailabilityQuery, PublicAvailability, SetAvailabilityRequest, SetRateRequest};
use crate::services::availability::AvailabilityService;
use crate::state::AvailabilityState;

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<AvailabilityState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);

    let records = service.get_availability(query).await?;
    let availability: Vec<PublicAvailability> = records.iter().map(PublicAvailability::from).collect();

    Ok(Json(json!({
        "availability": availability,
        "total": availability.len()
    })))
}

#[axum::debug_handler]
pub async fn get_provider_rate(
    State(state): State<AvailabilityState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state);
    let rate = service.get_rate(provider_id).await?;
    Ok(Json(json!(rate)))
}

// ==============================================================================
// PROVIDER HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn set_availability(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let provider_id = require_doctor(&user)?;
    let service = AvailabilityService::new(&state);

    let availability = service.set_availability(provider_id, request).await?;
    let booked_slots_preserved = availability.booked_slots().count();

    Ok(Json(json!({
        "availability": availability,
        "booked_slots_preserved": booked_slots_preserved
    })))
}

#[axum::debug_handler]
pub async fn set_provider_rate(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(request): Json<SetRateRequest>,
) -> Result<Json<Value>, AppError> {
    let provider_id = require_doctor(&user)?;
    let service = AvailabilityService::new(&state);

    let rate = service.set_rate(provider_id, request).await?;
    Ok(Json(json!(rate)))
}
