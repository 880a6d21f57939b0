use chrono::{NaiveTime, Timelike};

use shared_models::scheduling::TimeWindow;

use crate::models::AvailabilityError;

const MINUTES_PER_DAY: i32 = 24 * 60;

/// A validated day template: working hours, slot length and an optional break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingWindow {
    window: TimeWindow,
    slot_duration_minutes: i32,
    break_window: Option<TimeWindow>,
}

impl WorkingWindow {
    pub fn new(
        start_time: NaiveTime,
        end_time: NaiveTime,
        slot_duration_minutes: i32,
        break_window: Option<TimeWindow>,
    ) -> Result<Self, AvailabilityError> {
        let window = TimeWindow::new(start_time, end_time);

        if !window.is_valid() {
            return Err(AvailabilityError::InvalidWindow(
                "start_time must be before end_time".to_string(),
            ));
        }

        if slot_duration_minutes <= 0 || slot_duration_minutes > MINUTES_PER_DAY {
            return Err(AvailabilityError::InvalidWindow(format!(
                "slot_duration_minutes must be between 1 and {}",
                MINUTES_PER_DAY
            )));
        }

        if let Some(break_window) = break_window {
            if !break_window.is_valid() {
                return Err(AvailabilityError::InvalidWindow(
                    "break start must be before break end".to_string(),
                ));
            }
            if !window.contains(&break_window) {
                return Err(AvailabilityError::InvalidWindow(format!(
                    "break {} must lie within working hours {}",
                    break_window, window
                )));
            }
        }

        Ok(Self { window, slot_duration_minutes, break_window })
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    pub fn slot_duration_minutes(&self) -> i32 {
        self.slot_duration_minutes
    }

    pub fn break_window(&self) -> Option<TimeWindow> {
        self.break_window
    }
}

/// Walks the working window in `slot_duration_minutes` steps.
///
/// A step that intersects the break is skipped whole and a trailing partial
/// step is dropped. Pure: identical input gives an identical sequence.
pub fn generate_slot_windows(working: &WorkingWindow) -> Vec<TimeWindow> {
    let step = working.slot_duration_minutes as u32 * 60;
    let end = working.window.end_time.num_seconds_from_midnight();

    let mut windows = Vec::new();
    let mut cursor = working.window.start_time.num_seconds_from_midnight();

    while cursor + step <= end {
        let slot_start = at_seconds(working.window.start_time, cursor);
        let slot_end = at_seconds(working.window.end_time, cursor + step);
        let candidate = TimeWindow::new(slot_start, slot_end);

        let in_break = working
            .break_window
            .map(|b| b.overlaps(&candidate))
            .unwrap_or(false);

        if !in_break {
            windows.push(candidate);
        }

        cursor += step;
    }

    windows
}

// Only called with offsets inside the working window, so the fallback is never taken.
fn at_seconds(fallback: NaiveTime, seconds: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or(fallback)
}
