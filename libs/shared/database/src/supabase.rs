use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::scheduling::{
    Appointment, Availability, ProviderRate, ScheduleUpdate, Slot, SlotClaim, TimeWindow,
};

use crate::error::StoreError;
use crate::store::{SchedulingStore, StoreResult};

const AVAILABILITY_SELECT: &str = "select=*,slots:availability_slots(*)";

/// Thin PostgREST client over the Supabase REST endpoint.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self) -> StoreResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&self.anon_key)
            .map_err(|e| StoreError::Backend(format!("invalid Supabase key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.anon_key))
            .map_err(|e| StoreError::Backend(format!("invalid Supabase key: {}", e)))?;

        headers.insert("apikey", api_key);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str, body: Option<Value>) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> StoreResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers()?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);
        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("PostgREST error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::CONFLICT => StoreError::Duplicate(error_text),
                StatusCode::NOT_FOUND => StoreError::NotFound(error_text),
                _ => StoreError::Backend(format!("({}) {}", status, error_text)),
            });
        }

        let text = response.text().await?;
        let data = if text.trim().is_empty() {
            serde_json::from_value(Value::Null)?
        } else {
            serde_json::from_str(&text)?
        };
        Ok(data)
    }
}

fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn time_param(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// `SchedulingStore` over PostgREST tables `availabilities`, `availability_slots`,
/// `appointments` and `provider_rates`.
pub struct SupabaseStore {
    supabase: SupabaseClient,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self { supabase: SupabaseClient::new(config) }
    }

    fn availability_row(availability: &Availability) -> Value {
        json!({
            "id": availability.id,
            "provider_id": availability.provider_id,
            "date": availability.date,
            "timezone": availability.timezone,
            "is_available": availability.is_available,
            "working_window": availability.working_window,
            "break_window": availability.break_window,
            "slot_duration_minutes": availability.slot_duration_minutes,
            "created_at": availability.created_at.to_rfc3339(),
            "updated_at": availability.updated_at.to_rfc3339(),
        })
    }

    fn slot_row(availability: &Availability, slot: &Slot) -> Value {
        json!({
            "id": slot.id,
            "availability_id": availability.id,
            "provider_id": availability.provider_id,
            "date": availability.date,
            "start_time": time_param(slot.start_time),
            "end_time": time_param(slot.end_time),
            "is_booked": slot.is_booked,
            "appointment_id": slot.appointment_id,
        })
    }

    async fn insert_free_slots(&self, availability: &Availability) -> StoreResult<()> {
        let rows: Vec<Value> = availability
            .free_slots()
            .map(|slot| Self::slot_row(availability, slot))
            .collect();

        if rows.is_empty() {
            return Ok(());
        }

        let _: Value = self
            .supabase
            .request(Method::POST, "/rest/v1/availability_slots", Some(Value::Array(rows)))
            .await?;
        Ok(())
    }

    async fn create_availability(&self, update: &ScheduleUpdate) -> StoreResult<()> {
        let record = Availability::from_update(update, Utc::now());
        let _: Value = self
            .supabase
            .request(Method::POST, "/rest/v1/availabilities", Some(Self::availability_row(&record)))
            .await?;
        self.insert_free_slots(&record).await
    }

    async fn regenerate_availability(
        &self,
        existing: Availability,
        update: &ScheduleUpdate,
    ) -> StoreResult<()> {
        let mut merged = existing;
        merged.apply_schedule(update, Utc::now());

        let path = format!("/rest/v1/availabilities?id=eq.{}", merged.id);
        let _: Value = self
            .supabase
            .request(Method::PATCH, &path, Some(Self::availability_row(&merged)))
            .await?;

        // Only free rows go; a row claimed since our read keeps is_booked=true and survives.
        let delete_path = format!(
            "/rest/v1/availability_slots?availability_id=eq.{}&is_booked=eq.false",
            merged.id
        );
        let _: Value = self.supabase.request(Method::DELETE, &delete_path, None).await?;

        self.insert_free_slots(&merged).await
    }

    fn first_or_none<T>(mut rows: Vec<T>) -> Option<T> {
        if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        }
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn find_availability(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
    ) -> StoreResult<Option<Availability>> {
        let path = format!(
            "/rest/v1/availabilities?provider_id=eq.{}&date=eq.{}&{}",
            provider_id, date, AVAILABILITY_SELECT
        );
        let rows: Vec<Availability> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(Self::first_or_none(rows).map(|mut availability| {
            availability.slots.sort_by_key(|slot| slot.start_time);
            availability
        }))
    }

    async fn list_availability(
        &self,
        provider_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<Availability>> {
        let path = format!(
            "/rest/v1/availabilities?provider_id=eq.{}&date=gte.{}&date=lte.{}&order=date.asc&{}",
            provider_id, from, to, AVAILABILITY_SELECT
        );
        let mut rows: Vec<Availability> = self.supabase.request(Method::GET, &path, None).await?;
        for availability in rows.iter_mut() {
            availability.slots.sort_by_key(|slot| slot.start_time);
        }
        Ok(rows)
    }

    async fn apply_schedule(&self, update: ScheduleUpdate) -> StoreResult<Availability> {
        match self.find_availability(update.provider_id, update.date).await? {
            Some(existing) => self.regenerate_availability(existing, &update).await?,
            None => match self.create_availability(&update).await {
                Ok(()) => {}
                Err(StoreError::Duplicate(_)) => {
                    // Lost a creation race on the (provider_id, date) unique key.
                    warn!("Availability for {} on {} created concurrently, updating instead", update.provider_id, update.date);
                    let existing = self
                        .find_availability(update.provider_id, update.date)
                        .await?
                        .ok_or_else(|| StoreError::NotFound("availability after duplicate insert".to_string()))?;
                    self.regenerate_availability(existing, &update).await?;
                }
                Err(e) => return Err(e),
            },
        }

        self.find_availability(update.provider_id, update.date)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("availability {} {}", update.provider_id, update.date)))
    }

    async fn claim_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        window: TimeWindow,
        appointment_id: Uuid,
    ) -> StoreResult<SlotClaim> {
        let slot_filter = format!(
            "provider_id=eq.{}&date=eq.{}&start_time=eq.{}&end_time=eq.{}",
            provider_id,
            date,
            time_param(window.start_time),
            time_param(window.end_time)
        );
        let path = format!("/rest/v1/availability_slots?{}&is_booked=eq.false", slot_filter);
        let claimed: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "is_booked": true, "appointment_id": appointment_id })),
                Some(return_representation()),
            )
            .await?;

        if !claimed.is_empty() {
            return Ok(SlotClaim::Claimed);
        }

        let lookup = format!("/rest/v1/availability_slots?{}&select=id,is_booked", slot_filter);
        let existing: Vec<Value> = self.supabase.request(Method::GET, &lookup, None).await?;
        if existing.is_empty() {
            Ok(SlotClaim::Missing)
        } else {
            Ok(SlotClaim::AlreadyBooked)
        }
    }

    async fn release_slot(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        appointment_id: Uuid,
    ) -> StoreResult<bool> {
        let path = format!(
            "/rest/v1/availability_slots?provider_id=eq.{}&date=eq.{}&start_time=eq.{}&end_time=eq.{}&appointment_id=eq.{}",
            provider_id,
            date,
            time_param(start_time),
            time_param(end_time),
            appointment_id
        );
        let released: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(json!({ "is_booked": false, "appointment_id": null })),
                Some(return_representation()),
            )
            .await?;

        Ok(!released.is_empty())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> StoreResult<Appointment> {
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(serde_json::to_value(&appointment)?),
                Some(return_representation()),
            )
            .await?;

        Self::first_or_none(rows)
            .ok_or_else(|| StoreError::Backend("appointment insert returned no rows".to_string()))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(Self::first_or_none(rows))
    }

    async fn find_appointment_by_payment_order(
        &self,
        order_id: &str,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?payment_order_id=eq.{}", order_id);
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(Self::first_or_none(rows))
    }

    async fn update_appointment(&self, appointment: &Appointment) -> StoreResult<Appointment> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let rows: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(serde_json::to_value(appointment)?),
                Some(return_representation()),
            )
            .await?;

        Self::first_or_none(rows)
            .ok_or_else(|| StoreError::NotFound(format!("appointment {}", appointment.id)))
    }

    async fn list_appointments_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?or=(patient_id.eq.{0},provider_id.eq.{0})&order=date.asc,start_time.asc",
            user_id
        );
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn get_provider_rate(&self, provider_id: Uuid) -> StoreResult<Option<ProviderRate>> {
        let path = format!("/rest/v1/provider_rates?provider_id=eq.{}", provider_id);
        let rows: Vec<ProviderRate> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(Self::first_or_none(rows))
    }

    async fn upsert_provider_rate(&self, rate: ProviderRate) -> StoreResult<ProviderRate> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );

        let rows: Vec<ProviderRate> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/provider_rates?on_conflict=provider_id",
                Some(serde_json::to_value(&rate)?),
                Some(headers),
            )
            .await?;

        Self::first_or_none(rows)
            .ok_or_else(|| StoreError::Backend("provider rate upsert returned no rows".to_string()))
    }
}
