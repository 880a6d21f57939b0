use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use payment_cell::{verify_payment_signature, CreateOrderRequest, PaymentError, PaymentGateway};
use shared_config::AppConfig;
use shared_database::{SchedulingStore, StoreError};
use shared_models::scheduling::{
    Appointment, AppointmentStatus, PaymentStatus, SlotClaim,
};

use crate::models::{
    AppointmentError, BookingMetadata, ConfirmBookingRequest, PaymentIntentRequest,
    PaymentIntentResponse, MAX_NOTE_LENGTH,
};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::state::AppointmentState;

/// Payment-gated booking.
///
/// No appointment exists until the payment is confirmed. Confirmation writes
/// the appointment as `pending`, claims the slot with one conditional write,
/// then settles the appointment as `scheduled` or `failed`.
pub struct BookingService {
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
    payments: Arc<dyn PaymentGateway>,
}

impl BookingService {
    pub fn new(state: &AppointmentState) -> Self {
        Self {
            config: state.config.clone(),
            store: state.store.clone(),
            payments: state.payments.clone(),
        }
    }

    pub async fn create_payment_intent(
        &self,
        patient_id: Uuid,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntentResponse, AppointmentError> {
        debug!(
            "Payment intent requested by {} for provider {} on {} at {}",
            patient_id, request.provider_id, request.date, request.start_time
        );

        validate_free_text("reason", request.reason.as_deref())?;
        validate_free_text("notes", request.notes.as_deref())?;

        if patient_id == request.provider_id {
            return Err(AppointmentError::ValidationError(
                "Providers cannot book their own slots".to_string(),
            ));
        }

        let availability = self
            .store
            .find_availability(request.provider_id, request.date)
            .await?
            .ok_or(AppointmentError::NoAvailability)?;

        if !availability.is_available {
            return Err(AppointmentError::ProviderUnavailable);
        }

        let metadata = BookingMetadata {
            patient_id,
            provider_id: request.provider_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            timezone: availability.timezone.clone(),
            consultation_mode: request.consultation_mode,
            reason: request.reason,
            notes: request.notes,
        };

        let slot = availability
            .find_slot(&metadata.window())
            .ok_or(AppointmentError::SlotNotFound)?;
        if slot.is_booked {
            return Err(AppointmentError::SlotUnavailable);
        }

        let rate = self
            .store
            .get_provider_rate(request.provider_id)
            .await?
            .ok_or(AppointmentError::RateNotFound)?;

        let order = self
            .payments
            .create_order(CreateOrderRequest {
                amount_minor: rate.consultation_fee_minor,
                currency: rate.currency.clone(),
                receipt: format!("appt_{}", Uuid::new_v4().simple()),
                notes: metadata.to_notes(),
            })
            .await?;

        info!(
            "Opened payment order {} ({} {}) for slot {} on {}",
            order.id,
            order.amount_minor,
            order.currency,
            metadata.window(),
            metadata.date
        );

        Ok(PaymentIntentResponse {
            order_id: order.id,
            amount_minor: order.amount_minor,
            currency: order.currency,
            key_id: self.payments.key_id(),
            provider_id: metadata.provider_id,
            date: metadata.date,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
        })
    }

    pub async fn confirm_booking(
        &self,
        patient_id: Uuid,
        request: ConfirmBookingRequest,
    ) -> Result<Appointment, AppointmentError> {
        if let Err(e) = verify_payment_signature(
            &self.config.payment_key_secret,
            &request.order_id,
            &request.payment_id,
            &request.signature,
        ) {
            if matches!(e, PaymentError::SignatureMismatch) {
                warn!(
                    target: "security",
                    "Payment signature mismatch for order {} payment {} from user {}",
                    request.order_id, request.payment_id, patient_id
                );
            }
            return Err(e.into());
        }

        if self
            .store
            .find_appointment_by_payment_order(&request.order_id)
            .await?
            .is_some()
        {
            warn!("Duplicate confirmation for payment order {}", request.order_id);
            return Err(AppointmentError::DuplicateConfirmation(request.order_id));
        }

        let order = self.payments.fetch_order(&request.order_id).await?;
        let metadata = BookingMetadata::from_notes(&order.notes)?;

        if metadata.patient_id != patient_id {
            warn!(
                "User {} tried to confirm payment order {} opened by {}",
                patient_id, request.order_id, metadata.patient_id
            );
            return Err(AppointmentError::Unauthorized);
        }

        log_client_mismatch(&request, &metadata);

        let now = Utc::now();
        let pending = Appointment {
            id: Uuid::new_v4(),
            patient_id: metadata.patient_id,
            provider_id: metadata.provider_id,
            date: metadata.date,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
            timezone: metadata.timezone.clone(),
            consultation_mode: metadata.consultation_mode,
            reason: metadata.reason.clone(),
            notes: metadata.notes.clone(),
            status: AppointmentStatus::Pending,
            fee_minor: order.amount_minor,
            currency: order.currency.clone(),
            payment_status: PaymentStatus::Pending,
            payment_order_id: request.order_id.clone(),
            payment_id: Some(request.payment_id.clone()),
            refund_id: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };

        let pending = match self.store.insert_appointment(pending).await {
            Ok(appointment) => appointment,
            Err(StoreError::Duplicate(_)) => {
                warn!("Duplicate confirmation for payment order {}", request.order_id);
                return Err(AppointmentError::DuplicateConfirmation(request.order_id));
            }
            Err(e) => return Err(e.into()),
        };

        let claim = match self.claim(&pending).await {
            Ok(claim) => claim,
            Err(e) => {
                error!(
                    "Slot claim for appointment {} (order {}) failed, left pending for reconciliation: {}",
                    pending.id, request.order_id, e
                );
                return Err(e);
            }
        };

        match claim {
            SlotClaim::Claimed => self.settle_scheduled(pending).await,
            SlotClaim::AlreadyBooked | SlotClaim::Missing => {
                self.settle_failed(pending, claim, &request).await
            }
        }
    }

    async fn claim(&self, appointment: &Appointment) -> Result<SlotClaim, AppointmentError> {
        Ok(self
            .store
            .claim_slot(
                appointment.provider_id,
                appointment.date,
                appointment.slot_window(),
                appointment.id,
            )
            .await?)
    }

    async fn settle_scheduled(&self, mut appointment: Appointment) -> Result<Appointment, AppointmentError> {
        AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Scheduled)?;
        appointment.status = AppointmentStatus::Scheduled;
        appointment.payment_status = PaymentStatus::Paid;
        appointment.updated_at = Utc::now();

        match self.store.update_appointment(&appointment).await {
            Ok(saved) => {
                info!(
                    "Appointment {} scheduled with provider {} on {} at {}",
                    saved.id,
                    saved.provider_id,
                    saved.date,
                    saved.slot_window()
                );
                Ok(saved)
            }
            Err(e) => {
                // Give the slot back so a pending appointment does not hold it.
                error!(
                    "Could not mark appointment {} scheduled after claiming its slot: {}",
                    appointment.id, e
                );
                if let Err(release_error) = self
                    .store
                    .release_slot(
                        appointment.provider_id,
                        appointment.date,
                        appointment.start_time,
                        appointment.end_time,
                        appointment.id,
                    )
                    .await
                {
                    error!(
                        "Slot for appointment {} is still held after failed booking: {}",
                        appointment.id, release_error
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn settle_failed(
        &self,
        mut appointment: Appointment,
        claim: SlotClaim,
        request: &ConfirmBookingRequest,
    ) -> Result<Appointment, AppointmentError> {
        AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Failed)?;
        appointment.status = AppointmentStatus::Failed;
        appointment.payment_status = PaymentStatus::RefundRequired;
        appointment.updated_at = Utc::now();

        error!(
            "Payment captured but slot {:?} for appointment {} ({} on {}) could not be claimed; \
             order {} payment {} requires a refund",
            claim,
            appointment.id,
            appointment.slot_window(),
            appointment.date,
            request.order_id,
            request.payment_id
        );

        if let Err(e) = self.store.update_appointment(&appointment).await {
            error!(
                "Could not flag appointment {} for refund (order {}, payment {}): {}",
                appointment.id, request.order_id, request.payment_id, e
            );
        }

        Err(AppointmentError::PaymentCapturedConflict {
            order_id: request.order_id.clone(),
            payment_id: request.payment_id.clone(),
            appointment_id: Some(appointment.id),
        })
    }
}

fn validate_free_text(field: &str, value: Option<&str>) -> Result<(), AppointmentError> {
    match value {
        Some(text) if text.chars().count() > MAX_NOTE_LENGTH => Err(AppointmentError::ValidationError(
            format!("{} must be at most {} characters", field, MAX_NOTE_LENGTH),
        )),
        _ => Ok(()),
    }
}

/// The order's notes are authoritative. Client echoes that disagree are only logged.
fn log_client_mismatch(request: &ConfirmBookingRequest, metadata: &BookingMetadata) {
    let consistent = request.provider_id.map_or(true, |id| id == metadata.provider_id)
        && request.date.map_or(true, |date| date == metadata.date)
        && request.start_time.map_or(true, |t| t == metadata.start_time)
        && request.end_time.map_or(true, |t| t == metadata.end_time);

    if !consistent {
        warn!(
            "Confirmation for order {} disagrees with the order's booking details; using the order",
            request.order_id
        );
    }
}
