use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use payment_cell::PaymentGateway;
use shared_database::SchedulingStore;
use shared_models::auth::User;
use shared_models::scheduling::{Appointment, AppointmentStatus, PaymentStatus};

use crate::models::{AppointmentError, UpdateAppointmentRequest};
use crate::services::lifecycle::AppointmentLifecycle;
use crate::state::AppointmentState;

pub struct AppointmentService {
    store: Arc<dyn SchedulingStore>,
    payments: Arc<dyn PaymentGateway>,
}

impl AppointmentService {
    pub fn new(state: &AppointmentState) -> Self {
        Self {
            store: state.store.clone(),
            payments: state.payments.clone(),
        }
    }

    pub async fn get(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        authorize_party(user, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.store.list_appointments_for_user(user_id).await?;
        Ok(appointments
            .into_iter()
            .filter(|appointment| status.map_or(true, |s| appointment.status == s))
            .collect())
    }

    pub async fn update_status(
        &self,
        user: &User,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if !AppointmentLifecycle::is_user_transition(request.status) {
            return Err(AppointmentError::ValidationError(format!(
                "status {} cannot be set directly",
                request.status
            )));
        }

        if request.status == AppointmentStatus::Cancelled {
            return self.cancel(user, appointment_id, request.reason).await;
        }

        let mut appointment = self.get(user, appointment_id).await?;
        AppointmentLifecycle::validate_transition(appointment.status, request.status)?;

        appointment.status = request.status;
        appointment.updated_at = Utc::now();
        let saved = self.store.update_appointment(&appointment).await?;

        info!("Appointment {} marked {} by {}", saved.id, saved.status, user.id);
        Ok(saved)
    }

    /// Cancels and frees the slot. A slot that no longer exists is logged and skipped.
    pub async fn cancel(
        &self,
        user: &User,
        appointment_id: Uuid,
        reason: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get(user, appointment_id).await?;
        AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancellation_reason = reason;
        appointment.updated_at = Utc::now();
        let saved = self.store.update_appointment(&appointment).await?;

        self.release_slot(&saved).await;

        info!("Appointment {} cancelled by {}", saved.id, user.id);
        Ok(saved)
    }

    /// Refunds the captured payment. A scheduled appointment is cancelled and
    /// its slot released in the same step.
    pub async fn refund(&self, user: &User, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let mut appointment = self.get(user, appointment_id).await?;

        if user.uuid() != Some(appointment.provider_id) && !user.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }

        if !matches!(
            appointment.payment_status,
            PaymentStatus::Paid | PaymentStatus::RefundRequired
        ) {
            return Err(AppointmentError::NotRefundable(format!(
                "payment is {}",
                appointment.payment_status
            )));
        }

        let payment_id = appointment
            .payment_id
            .clone()
            .ok_or_else(|| AppointmentError::NotRefundable("no captured payment".to_string()))?;

        let releases_slot = appointment.holds_slot();
        if releases_slot {
            AppointmentLifecycle::validate_transition(appointment.status, AppointmentStatus::Cancelled)?;
        }

        let refund = self.payments.refund(&payment_id, appointment.fee_minor).await?;

        appointment.payment_status = PaymentStatus::Refunded;
        appointment.refund_id = Some(refund.id.clone());
        if releases_slot {
            appointment.status = AppointmentStatus::Cancelled;
            appointment.cancellation_reason.get_or_insert_with(|| "Refunded".to_string());
        }
        appointment.updated_at = Utc::now();

        let saved = match self.store.update_appointment(&appointment).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(
                    "Refund {} issued for appointment {} but the record could not be updated: {}",
                    refund.id, appointment.id, e
                );
                return Err(e.into());
            }
        };

        if releases_slot {
            self.release_slot(&saved).await;
        }

        info!(
            "Refunded {} {} for appointment {} (refund {})",
            saved.fee_minor, saved.currency, saved.id, refund.id
        );
        Ok(saved)
    }

    async fn release_slot(&self, appointment: &Appointment) {
        match self
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
            Ok(true) => debug!("Released slot {} for appointment {}", appointment.slot_window(), appointment.id),
            Ok(false) => warn!(
                "No slot {} on {} held by appointment {}; nothing to release",
                appointment.slot_window(),
                appointment.date,
                appointment.id
            ),
            Err(e) => error!(
                "Could not release slot {} on {} for appointment {}: {}",
                appointment.slot_window(),
                appointment.date,
                appointment.id,
                e
            ),
        }
    }
}

fn authorize_party(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if user.is_admin() {
        return Ok(());
    }

    match user.uuid() {
        Some(id) if appointment.is_party(id) => Ok(()),
        _ => Err(AppointmentError::Unauthorized),
    }
}
