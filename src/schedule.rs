use crate::model::{DayEvent, EventCategory};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const LAST_MINUTE: u32 = 23 * 60 + 59;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("invalid time (use HH:MM): {0}")]
    InvalidTime(String),
    #[error("hour out of range 0-23: {0}")]
    InvalidHour(u32),
}

/// Wall-clock time of day with minute resolution, stored as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidTime(format!("{hour}:{minute}")));
        }
        Ok(ClockTime { hour, minute })
    }

    pub(crate) const fn new_unchecked(hour: u32, minute: u32) -> Self {
        ClockTime { hour, minute }
    }

    fn from_minutes(total: u32) -> Self {
        let total = total.min(LAST_MINUTE);
        ClockTime {
            hour: total / 60,
            minute: total % 60,
        }
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        self.hour * 60 + self.minute
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let invalid = || ScheduleError::InvalidTime(raw.to_string());
        let (h, m) = raw.split_once(':').ok_or_else(invalid)?;
        let digits = |field: &str| field.bytes().all(|b| b.is_ascii_digit());
        if h.is_empty() || h.len() > 2 || m.len() != 2 || !digits(h) || !digits(m) {
            return Err(invalid());
        }
        let hour = h.parse().map_err(|_| invalid())?;
        let minute = m.parse().map_err(|_| invalid())?;
        ClockTime::new(hour, minute).map_err(|_| invalid())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub day_start_hour: u32,
    pub day_end_hour: u32,
    pub pixels_per_hour: f64,
    pub min_height: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            day_start_hour: 6,
            day_end_hour: 23,
            pixels_per_hour: 80.0,
            min_height: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventBox {
    pub top: f64,
    pub height: f64,
}

/// Vertical placement on the day timeline. Short, empty and reversed ranges
/// all get the minimum height; overlapping events are not separated.
pub fn position(start: ClockTime, end: ClockTime, config: &LayoutConfig) -> EventBox {
    let origin = f64::from(config.day_start_hour * 60);
    let start_min = f64::from(start.minutes_since_midnight()) - origin;
    let duration = f64::from(end.minutes_since_midnight()) - f64::from(start.minutes_since_midnight());
    let scale = config.pixels_per_hour / 60.0;
    EventBox {
        top: start_min * scale,
        height: (duration * scale).max(config.min_height),
    }
}

/// Moves an event to `new_start_hour`, keeping its minute offset and length.
/// The end is capped at 23:59 rather than wrapping past midnight; a reversed
/// range is treated as zero length.
pub fn reschedule_to_hour(event: &DayEvent, new_start_hour: u32) -> Result<DayEvent, ScheduleError> {
    if new_start_hour > 23 {
        return Err(ScheduleError::InvalidHour(new_start_hour));
    }
    let duration = event
        .end_time
        .minutes_since_midnight()
        .saturating_sub(event.start_time.minutes_since_midnight());
    let start = ClockTime::new(new_start_hour, event.start_time.minute())?;
    let end = ClockTime::from_minutes(start.minutes_since_midnight() + duration);
    if end.minutes_since_midnight() - start.minutes_since_midnight() < duration {
        tracing::debug!(id = event.id, %start, %end, "rescheduled end capped at end of day");
    }
    Ok(DayEvent {
        start_time: start,
        end_time: end,
        ..event.clone()
    })
}

/// Stable: equal start times keep their insertion order.
pub fn sort_by_start_time(events: &mut [DayEvent]) {
    events.sort_by_key(|e| e.start_time);
}

pub fn events_on(events: &[DayEvent], date: NaiveDate) -> Vec<DayEvent> {
    let mut day: Vec<DayEvent> = events.iter().filter(|e| e.date == date).cloned().collect();
    sort_by_start_time(&mut day);
    day
}

pub fn timeline_hours(config: &LayoutConfig) -> Vec<u32> {
    (config.day_start_hour..=config.day_end_hour).collect()
}

pub fn category_counts(events: &[DayEvent]) -> Vec<(EventCategory, usize)> {
    EventCategory::ALL
        .iter()
        .map(|cat| (*cat, events.iter().filter(|e| e.category == *cat).count()))
        .collect()
}
