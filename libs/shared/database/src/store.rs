use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, Availability, ProviderRate, ScheduleUpdate, SlotClaim, TimeWindow,
};

use crate::error::StoreError;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence seam for availability, slots, appointments and provider rates.
///
/// `claim_slot` must be a single conditional write: it flips `is_booked` from
/// false to true and attaches the appointment in one step, or does nothing.
/// It matches the slot by its window, since regeneration re-creates free slots.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    async fn find_availability(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<Availability>>;

    async fn list_availability(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Availability>>;

    /// Upsert by (provider, date). Booked slots are kept; free slots are replaced
    /// by the update's candidates that do not overlap a booked slot.
    async fn apply_schedule(&self, update: ScheduleUpdate) -> StoreResult<Availability>;

    async fn claim_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        window: TimeWindow,
        appointment_id: Uuid,
    ) -> StoreResult<SlotClaim>;

    /// Frees the slot at (provider, date, start, end) held by `appointment_id`.
    /// Returns false when no such slot exists any more.
    async fn release_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        appointment_id: Uuid,
    ) -> StoreResult<bool>;

    /// Fails with `StoreError::Duplicate` when the payment order id is already used.
    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment>;

    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>>;

    async fn find_appointment_by_payment_order(
        &self,
        order_id: &str,
    ) -> StoreResult<Option<Appointment>>;

    async fn update_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment>;

    async fn list_appointments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Appointment>>;

    async fn get_provider_rate(&self, provider_id: Uuid) -> StoreResult<Option<ProviderRate>>;

    async fn upsert_provider_rate(&self, rate: ProviderRate) -> StoreResult<ProviderRate>;
}
