use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_models::scheduling::{
    Appointment, Availability, ProviderRate, ScheduleUpdate, SlotClaim, TimeWindow,
};

use crate::error::StoreError;
use crate::store::{SchedulingStore, StoreResult};

/// Process-local store. Each operation holds one lock for its whole read-modify-write,
/// which gives `claim_slot` the same atomicity a conditional UPDATE has in a database.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    availabilities: RwLock<HashMap<(Uuid, NaiveDate), Availability>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    rates: RwLock<HashMap<Uuid, ProviderRate>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn find_availability(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<Availability>> {
        let availabilities = self.availabilities.read().await;
        Ok(availabilities.get(&(provider_id, date)).cloned())
    }

    async fn list_availability(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Availability>> {
        let availabilities = self.availabilities.read().await;
        let mut records: Vec<Availability> = availabilities
            .values()
            .filter(|a| a.provider_id == provider_id && a.date >= from && a.date <= to)
            .cloned()
            .collect();
        records.sort_by_key(|a| a.date);
        Ok(records)
    }

    async fn apply_schedule(&self, update: ScheduleUpdate) -> StoreResult<Availability> {
        let mut availabilities = self.availabilities.write().await;
        let now = Utc::now();
        let key = (update.provider_id, update.date);

        let record = match availabilities.get_mut(&key) {
            Some(existing) => {
                existing.apply_schedule(&update, now);
                existing.clone()
            }
            None => {
                let created = Availability::from_update(&update, now);
                availabilities.insert(key, created.clone());
                created
            }
        };

        debug!("Stored availability {} with {} slots", record.id, record.slots.len());
        Ok(record)
    }

    async fn claim_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        window: TimeWindow,
        appointment_id: Uuid,
    ) -> StoreResult<SlotClaim> {
        let mut availabilities = self.availabilities.write().await;
        let Some(availability) = availabilities.get_mut(&(provider_id, date)) else {
            return Ok(SlotClaim::Missing);
        };
        let Some(slot) = availability.slots.iter_mut().find(|s| s.matches(&window)) else {
            return Ok(SlotClaim::Missing);
        };

        if slot.is_booked {
            return Ok(SlotClaim::AlreadyBooked);
        }

        slot.is_booked = true;
        slot.appointment_id = Some(appointment_id);
        availability.updated_at = Utc::now();
        Ok(SlotClaim::Claimed)
    }

    async fn release_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        appointment_id: Uuid,
    ) -> StoreResult<bool> {
        let mut availabilities = self.availabilities.write().await;
        let Some(availability) = availabilities.get_mut(&(provider_id, date)) else {
            return Ok(false);
        };

        let slot = availability.slots.iter_mut().find(|s| {
            s.start_time == start_time
                && s.end_time == end_time
                && s.appointment_id == Some(appointment_id)
        });

        match slot {
            Some(slot) => {
                slot.is_booked = false;
                slot.appointment_id = None;
                availability.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        let mut appointments = self.appointments.write().await;

        if appointments
            .values()
            .any(|existing| existing.payment_order_id == appointment.payment_order_id)
        {
            return Err(StoreError::Duplicate(format!(
                "appointment for payment order {} already exists",
                appointment.payment_order_id
            )));
        }

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(appointments.get(&appointment_id).cloned())
    }

    async fn find_appointment_by_payment_order(
        &self,
        order_id: &str,
    ) -> StoreResult<Option<Appointment>> {
        let appointments = self.appointments.read().await;
        Ok(appointments
            .values()
            .find(|appointment| appointment.payment_order_id == order_id)
            .cloned())
    }

    async fn update_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&appointment.id) {
            Some(existing) => {
                *existing = appointment.clone();
                Ok(existing.clone())
            }
            None => Err(StoreError::NotFound(format!("appointment {}", appointment.id))),
        }
    }

    async fn list_appointments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let appointments = self.appointments.read().await;
        let mut list: Vec<Appointment> = appointments
            .values()
            .filter(|appointment| appointment.is_party(user_id))
            .cloned()
            .collect();
        list.sort_by_key(|appointment| (appointment.date, appointment.start_time));
        Ok(list)
    }

    async fn get_provider_rate(&self, provider_id: Uuid) -> StoreResult<Option<ProviderRate>> {
        let rates = self.rates.read().await;
        Ok(rates.get(&provider_id).cloned())
    }

    async fn upsert_provider_rate(&self, rate: ProviderRate) -> StoreResult<ProviderRate> {
        let mut rates = self.rates.write().await;
        rates.insert(rate.provider_id, rate.clone());
        Ok(rate)
    }
}
