use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use payment_cell::{Notes, PaymentError};
use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{AppointmentStatus, ConsultationMode, TimeWindow};

/// Gateway limit on the length of a single order note value.
pub const MAX_NOTE_LENGTH: usize = 256;

// ==============================================================================
// BOOKING METADATA
// ==============================================================================

/// Everything needed to create the appointment once payment clears. Travels
/// with the payment order as its notes, so what the gateway hands back is
/// exactly what was priced and authorised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingMetadata {
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub timezone: String,
    pub consultation_mode: ConsultationMode,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

impl BookingMetadata {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn to_notes(&self) -> Notes {
        let mut notes = Notes::new();
        notes.insert("patient_id".to_string(), self.patient_id.to_string());
        notes.insert("provider_id".to_string(), self.provider_id.to_string());
        notes.insert("date".to_string(), self.date.to_string());
        notes.insert("start_time".to_string(), self.start_time.format("%H:%M:%S").to_string());
        notes.insert("end_time".to_string(), self.end_time.format("%H:%M:%S").to_string());
        notes.insert("timezone".to_string(), self.timezone.clone());
        notes.insert("consultation_mode".to_string(), self.consultation_mode.to_string());
        if let Some(reason) = &self.reason {
            notes.insert("reason".to_string(), reason.clone());
        }
        if let Some(extra) = &self.notes {
            notes.insert("notes".to_string(), extra.clone());
        }
        notes
    }

    pub fn from_notes(notes: &Notes) -> Result<Self, AppointmentError> {
        fn field<'a>(notes: &'a Notes, key: &str) -> Result<&'a str, AppointmentError> {
            notes
                .get(key)
                .map(String::as_str)
                .ok_or_else(|| AppointmentError::InvalidMetadata(format!("missing {}", key)))
        }

        fn parsed<T: std::str::FromStr>(notes: &Notes, key: &str) -> Result<T, AppointmentError> {
            field(notes, key)?
                .parse()
                .map_err(|_| AppointmentError::InvalidMetadata(format!("malformed {}", key)))
        }

        Ok(Self {
            patient_id: parsed(notes, "patient_id")?,
            provider_id: parsed(notes, "provider_id")?,
            date: parsed(notes, "date")?,
            start_time: parsed(notes, "start_time")?,
            end_time: parsed(notes, "end_time")?,
            timezone: field(notes, "timezone")?.to_string(),
            consultation_mode: parsed(notes, "consultation_mode")?,
            reason: notes.get("reason").cloned(),
            notes: notes.get("notes").cloned(),
        })
    }
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentRequest {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub consultation_mode: ConsultationMode,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub order_id: String,
    pub amount_minor: i64,
    pub currency: String,
    /// Public gateway key for the checkout widget.
    pub key_id: String,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Checkout callback. The booking fields are optional echoes of what the
/// client asked for; the order's own notes decide what gets booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmBookingRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub provider_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: AppointmentStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentQuery {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Not a party to this appointment")]
    Unauthorized,

    #[error("Provider has no availability on the requested date")]
    NoAvailability,

    #[error("Provider is not accepting bookings on the requested date")]
    ProviderUnavailable,

    #[error("Requested slot does not exist")]
    SlotNotFound,

    #[error("Requested slot is already booked")]
    SlotUnavailable,

    #[error("Provider has not set a consultation rate")]
    RateNotFound,

    #[error("Payment order {0} has already been used for a booking")]
    DuplicateConfirmation(String),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Appointment cannot be refunded: {0}")]
    NotRefundable(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Payment order carries unusable booking metadata: {0}")]
    InvalidMetadata(String),

    #[error("Payment captured but the slot could not be booked")]
    PaymentCapturedConflict {
        order_id: String,
        payment_id: String,
        appointment_id: Option<Uuid>,
    },

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound
            | AppointmentError::NoAvailability
            | AppointmentError::SlotNotFound
            | AppointmentError::RateNotFound => AppError::NotFound(error.to_string()),
            AppointmentError::Unauthorized => AppError::Forbidden(error.to_string()),
            AppointmentError::ProviderUnavailable
            | AppointmentError::SlotUnavailable
            | AppointmentError::DuplicateConfirmation(_)
            | AppointmentError::NotRefundable(_) => AppError::Conflict(error.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(error.to_string()),
            AppointmentError::ValidationError(_) => AppError::ValidationError(error.to_string()),
            AppointmentError::InvalidMetadata(_) => AppError::ExternalService(error.to_string()),
            AppointmentError::PaymentCapturedConflict { order_id, payment_id, appointment_id } => {
                AppError::PaymentCapturedConflict {
                    message: "Payment was captured but the slot is no longer available; a refund is required"
                        .to_string(),
                    order_id,
                    payment_id,
                    appointment_id: appointment_id.map(|id| id.to_string()),
                }
            }
            AppointmentError::Payment(e) => e.into(),
            AppointmentError::Store(e) => AppError::Database(e.to_string()),
        }
    }
}
