use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SchedulingStore;
use shared_models::scheduling::{Availability, ProviderRate, ScheduleUpdate, TimeWindow};

use crate::models::{
    AvailabilityError, AvailabilityQuery, SetAvailabilityRequest, SetRateRequest,
    DEFAULT_SLOT_DURATION_MINUTES, MAX_QUERY_RANGE_DAYS,
};
use crate::services::slots::{generate_slot_windows, WorkingWindow};
use crate::state::AvailabilityState;

pub struct AvailabilityService {
    config: Arc<AppConfig>,
    store: Arc<dyn SchedulingStore>,
}

impl AvailabilityService {
    pub fn new(state: &AvailabilityState) -> Self {
        Self {
            config: state.config.clone(),
            store: state.store.clone(),
        }
    }

    /// Create or regenerate the provider's schedule for one date.
    ///
    /// Booked slots are carried over as they are. With `is_available = false`
    /// every free slot is dropped.
    pub async fn set_availability(
        &self,
        provider_id: Uuid,
        request: SetAvailabilityRequest,
    ) -> Result<Availability, AvailabilityError> {
        debug!("Setting availability for provider {} on {}", provider_id, request.date);

        let timezone = self.resolve_timezone(request.timezone.as_deref())?;

        let update = if request.is_available {
            let working = Self::working_window(&request)?;
            ScheduleUpdate {
                provider_id,
                date: request.date,
                timezone,
                is_available: true,
                working_window: Some(working.window()),
                break_window: working.break_window(),
                slot_duration_minutes: Some(working.slot_duration_minutes()),
                candidate_slots: generate_slot_windows(&working),
            }
        } else {
            ScheduleUpdate {
                provider_id,
                date: request.date,
                timezone,
                is_available: false,
                working_window: None,
                break_window: None,
                slot_duration_minutes: None,
                candidate_slots: Vec::new(),
            }
        };

        let availability = self.store.apply_schedule(update).await?;

        let booked = availability.booked_slots().count();
        if booked > 0 {
            info!(
                "Kept {} booked slot(s) for provider {} on {} while regenerating",
                booked, provider_id, availability.date
            );
        }

        info!(
            "Availability {} for provider {} on {} now has {} slot(s)",
            availability.id,
            provider_id,
            availability.date,
            availability.slots.len()
        );

        Ok(availability)
    }

    pub async fn get_availability(
        &self,
        query: AvailabilityQuery,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        match (query.date, query.start_date, query.end_date) {
            (Some(date), None, None) => {
                let record = self.store.find_availability(query.provider_id, date).await?;
                Ok(record.into_iter().collect())
            }
            (None, Some(start), Some(end)) => {
                if start > end {
                    return Err(AvailabilityError::InvalidDateRange(
                        "start_date must not be after end_date".to_string(),
                    ));
                }
                let days = (end - start).num_days() + 1;
                if days > MAX_QUERY_RANGE_DAYS {
                    return Err(AvailabilityError::InvalidDateRange(format!(
                        "range covers {} days, at most {} allowed",
                        days, MAX_QUERY_RANGE_DAYS
                    )));
                }
                Ok(self.store.list_availability(query.provider_id, start, end).await?)
            }
            _ => Err(AvailabilityError::InvalidDateRange(
                "provide either date or both start_date and end_date".to_string(),
            )),
        }
    }

    pub async fn set_rate(
        &self,
        provider_id: Uuid,
        request: SetRateRequest,
    ) -> Result<ProviderRate, AvailabilityError> {
        if request.consultation_fee_minor <= 0 {
            return Err(AvailabilityError::InvalidRate(
                "consultation_fee_minor must be positive".to_string(),
            ));
        }

        let currency = match request.currency {
            Some(code) => normalize_currency(&code)?,
            None => self.config.default_currency.clone(),
        };

        let rate = ProviderRate {
            provider_id,
            consultation_fee_minor: request.consultation_fee_minor,
            currency,
            updated_at: Utc::now(),
        };

        let saved = self.store.upsert_provider_rate(rate).await?;
        info!(
            "Provider {} rate set to {} {}",
            provider_id, saved.consultation_fee_minor, saved.currency
        );
        Ok(saved)
    }

    pub async fn get_rate(&self, provider_id: Uuid) -> Result<ProviderRate, AvailabilityError> {
        self.store
            .get_provider_rate(provider_id)
            .await?
            .ok_or(AvailabilityError::RateNotFound)
    }

    fn resolve_timezone(&self, requested: Option<&str>) -> Result<String, AvailabilityError> {
        let Some(timezone) = requested else {
            return Ok(self.config.default_timezone.clone());
        };

        let timezone = timezone.trim();
        if !is_zone_identifier(timezone) {
            warn!("Rejected timezone identifier {:?}", timezone);
            return Err(AvailabilityError::InvalidTimezone(timezone.to_string()));
        }

        Ok(timezone.to_string())
    }

    fn working_window(request: &SetAvailabilityRequest) -> Result<WorkingWindow, AvailabilityError> {
        let (Some(start_time), Some(end_time)) = (request.start_time, request.end_time) else {
            return Err(AvailabilityError::InvalidWindow(
                "start_time and end_time are required when available".to_string(),
            ));
        };

        let break_window = match (request.break_start, request.break_end) {
            (Some(start), Some(end)) => Some(TimeWindow::new(start, end)),
            (None, None) => None,
            _ => {
                return Err(AvailabilityError::InvalidWindow(
                    "break_start and break_end must be given together".to_string(),
                ))
            }
        };

        WorkingWindow::new(
            start_time,
            end_time,
            request.slot_duration_minutes.unwrap_or(DEFAULT_SLOT_DURATION_MINUTES),
            break_window,
        )
    }
}

fn normalize_currency(code: &str) -> Result<String, AvailabilityError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(code)
    } else {
        Err(AvailabilityError::InvalidRate(format!("unknown currency code {:?}", code)))
    }
}

const ZONE_AREAS: &[&str] = &[
    "Africa", "America", "Antarctica", "Arctic", "Asia", "Atlantic", "Australia", "Etc", "Europe",
    "Indian", "Pacific",
];

/// `UTC` or an IANA `Area/Location[/Sublocation]` name. The zone database itself
/// is not consulted, so identifiers are stored as given once they have that shape.
fn is_zone_identifier(timezone: &str) -> bool {
    if timezone == "UTC" {
        return true;
    }

    let mut parts = timezone.split('/');
    let Some(area) = parts.next() else {
        return false;
    };
    let locations: Vec<&str> = parts.collect();

    ZONE_AREAS.contains(&area)
        && !locations.is_empty()
        && locations.iter().all(|location| {
            location.starts_with(|c: char| c.is_ascii_uppercase())
                && location
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+'))
        })
}
