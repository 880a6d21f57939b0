use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{Availability, Slot};

pub const DEFAULT_SLOT_DURATION_MINUTES: i32 = 30;
pub const MAX_QUERY_RANGE_DAYS: i64 = 62;

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub date: NaiveDate,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub timezone: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_duration_minutes: Option<i32>,
    pub break_start: Option<NaiveTime>,
    pub break_end: Option<NaiveTime>,
}

fn default_true() -> bool {
    true
}

/// `provider_id` plus either a single `date` or an inclusive `start_date`/`end_date` range.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub provider_id: Uuid,
    pub date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetRateRequest {
    pub consultation_fee_minor: i64,
    pub currency: Option<String>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Slot as shown to anyone browsing a provider's calendar. The appointment
/// back-reference stays server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicSlot {
    pub id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_booked: bool,
}

impl From<&Slot> for PublicSlot {
    fn from(slot: &Slot) -> Self {
        Self {
            id: slot.id,
            start_time: slot.start_time,
            end_time: slot.end_time,
            is_booked: slot.is_booked,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicAvailability {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub timezone: String,
    pub is_available: bool,
    pub slot_duration_minutes: Option<i32>,
    pub slots: Vec<PublicSlot>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Availability> for PublicAvailability {
    fn from(availability: &Availability) -> Self {
        Self {
            id: availability.id,
            provider_id: availability.provider_id,
            date: availability.date,
            timezone: availability.timezone.clone(),
            is_available: availability.is_available,
            slot_duration_minutes: availability.slot_duration_minutes,
            slots: availability.slots.iter().map(PublicSlot::from).collect(),
            updated_at: availability.updated_at,
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AvailabilityError {
    #[error("Invalid working window: {0}")]
    InvalidWindow(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid rate: {0}")]
    InvalidRate(String),

    #[error("Provider has no consultation rate")]
    RateNotFound,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<AvailabilityError> for AppError {
    fn from(error: AvailabilityError) -> Self {
        match error {
            AvailabilityError::InvalidWindow(_)
            | AvailabilityError::InvalidDateRange(_)
            | AvailabilityError::InvalidTimezone(_)
            | AvailabilityError::InvalidRate(_) => AppError::ValidationError(error.to_string()),
            AvailabilityError::RateNotFound => AppError::NotFound(error.to_string()),
            AvailabilityError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
