use tracing::{debug, warn};

use shared_models::scheduling::AppointmentStatus;

use crate::models::AppointmentError;

/// Appointment state machine.
///
/// `pending` and `failed` belong to the booking saga: an appointment is written
/// as `pending` before its slot is claimed and ends `failed` when the claim loses.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
        match current {
            AppointmentStatus::Pending => &[AppointmentStatus::Scheduled, AppointmentStatus::Failed],
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow
            | AppointmentStatus::Failed => &[],
        }
    }

    pub fn validate_transition(
        from: AppointmentStatus,
        to: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !Self::valid_transitions(from).contains(&to) {
            warn!("Invalid status transition attempted: {} -> {}", from, to);
            return Err(AppointmentError::InvalidStatusTransition { from, to });
        }

        debug!("Status transition validated: {} -> {}", from, to);
        Ok(())
    }

    /// Transitions a party may request through the API. Saga states are internal.
    pub fn is_user_transition(to: AppointmentStatus) -> bool {
        matches!(
            to,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}
