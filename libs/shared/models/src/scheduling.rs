use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// TIME WINDOWS
// ==============================================================================

/// Half-open wall-clock interval `[start_time, end_time)` in provider-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeWindow {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self { start_time, end_time }
    }

    pub fn is_valid(&self) -> bool {
        self.end_time > self.start_time
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start_time < other.end_time && other.start_time < self.end_time
    }

    pub fn contains(&self, other: &TimeWindow) -> bool {
        self.start_time <= other.start_time && other.end_time <= self.end_time
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start_time.format("%H:%M"), self.end_time.format("%H:%M"))
    }
}

// ==============================================================================
// AVAILABILITY AND SLOTS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_booked: bool,
    pub appointment_id: Option<Uuid>,
}

impl Slot {
    pub fn free(window: TimeWindow) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time: window.start_time,
            end_time: window.end_time,
            is_booked: false,
            appointment_id: None,
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn matches(&self, window: &TimeWindow) -> bool {
        self.start_time == window.start_time && self.end_time == window.end_time
    }
}

/// One provider's bookable day. At most one record exists per (provider, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Availability {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub timezone: String,
    pub is_available: bool,
    pub working_window: Option<TimeWindow>,
    pub break_window: Option<TimeWindow>,
    pub slot_duration_minutes: Option<i32>,
    pub slots: Vec<Slot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Availability {
    pub fn from_update(update: &ScheduleUpdate, now: DateTime<Utc>) -> Self {
        let mut availability = Self {
            id: Uuid::new_v4(),
            provider_id: update.provider_id,
            date: update.date,
            timezone: update.timezone.clone(),
            is_available: update.is_available,
            working_window: update.working_window,
            break_window: update.break_window,
            slot_duration_minutes: update.slot_duration_minutes,
            slots: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        availability.apply_schedule(update, now);
        availability
    }

    /// Overwrites the schedule fields and regenerates free slots.
    ///
    /// Booked slots survive untouched; a candidate that overlaps any of them is dropped.
    pub fn apply_schedule(&mut self, update: &ScheduleUpdate, now: DateTime<Utc>) {
        self.timezone = update.timezone.clone();
        self.is_available = update.is_available;
        self.working_window = update.working_window;
        self.break_window = update.break_window;
        self.slot_duration_minutes = update.slot_duration_minutes;

        self.slots.retain(|slot| slot.is_booked);
        let fresh: Vec<Slot> = update
            .candidate_slots
            .iter()
            .filter(|candidate| !self.slots.iter().any(|booked| booked.window().overlaps(candidate)))
            .map(|candidate| Slot::free(*candidate))
            .collect();
        self.slots.extend(fresh);
        self.slots.sort_by_key(|slot| slot.start_time);
        self.updated_at = now;
    }

    pub fn find_slot(&self, window: &TimeWindow) -> Option<&Slot> {
        self.slots.iter().find(|slot| slot.matches(window))
    }

    pub fn booked_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.is_booked)
    }

    pub fn free_slots(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| !slot.is_booked)
    }
}

/// Input to `SchedulingStore::apply_schedule`.
#[derive(Debug, Clone)]
pub struct ScheduleUpdate {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub timezone: String,
    pub is_available: bool,
    pub working_window: Option<TimeWindow>,
    pub break_window: Option<TimeWindow>,
    pub slot_duration_minutes: Option<i32>,
    pub candidate_slots: Vec<TimeWindow>,
}

/// Outcome of the atomic conditional slot claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    Claimed,
    AlreadyBooked,
    Missing,
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationMode {
    #[serde(alias = "realtime_video", alias = "video_call")]
    Video,
    #[serde(alias = "text", alias = "async_text")]
    Chat,
}

impl fmt::Display for ConsultationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsultationMode::Video => write!(f, "video"),
            ConsultationMode::Chat => write!(f, "chat"),
        }
    }
}

impl std::str::FromStr for ConsultationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" | "realtime_video" | "video_call" => Ok(ConsultationMode::Video),
            "chat" | "text" | "async_text" => Ok(ConsultationMode::Chat),
            other => Err(format!("unknown consultation mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
    Failed,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
            AppointmentStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    RefundRequired,
    Refunded,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::RefundRequired => write!(f, "refund_required"),
            PaymentStatus::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub timezone: String,
    pub consultation_mode: ConsultationMode,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub fee_minor: i64,
    pub currency: String,
    pub payment_status: PaymentStatus,
    pub payment_order_id: String,
    pub payment_id: Option<String>,
    pub refund_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_window(&self) -> TimeWindow {
        TimeWindow::new(self.start_time, self.end_time)
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.patient_id == user_id || self.provider_id == user_id
    }

    pub fn holds_slot(&self) -> bool {
        self.status == AppointmentStatus::Scheduled
    }
}

/// A provider's current consultation rate, in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRate {
    pub provider_id: Uuid,
    pub consultation_fee_minor: i64,
    pub currency: String,
    pub updated_at: DateTime<Utc>,
}
