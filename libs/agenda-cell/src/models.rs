use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, Weekday::Saturday | Weekday::Sunday)
    }

    pub fn label(self) -> &'static str {
        match self {
            Weekday::Monday => "Monday",
            Weekday::Tuesday => "Tuesday",
            Weekday::Wednesday => "Wednesday",
            Weekday::Thursday => "Thursday",
            Weekday::Friday => "Friday",
            Weekday::Saturday => "Saturday",
            Weekday::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One bookable interval within a single day. `start` and `end` are zero-padded
/// 24h `HH:MM` strings and are compared as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub active: bool,
    pub start: String,
    pub end: String,
    pub location_id: Option<String>,
}

impl TimeBlock {
    pub fn new(start: &str, end: &str, location_id: Option<&str>) -> Self {
        Self {
            active: true,
            start: start.to_string(),
            end: end.to_string(),
            location_id: location_id.map(str::to_string),
        }
    }

    pub fn inactive(start: &str, end: &str) -> Self {
        Self {
            active: false,
            start: start.to_string(),
            end: end.to_string(),
            location_id: None,
        }
    }

    /// The block the editor appends when the doctor adds one to `day`:
    /// a morning shift, switched off on weekends, with no location picked yet.
    pub fn template_for(day: Weekday) -> Self {
        Self {
            active: !day.is_weekend(),
            start: "08:00".to_string(),
            end: "12:00".to_string(),
            location_id: None,
        }
    }
}

/// A doctor's recurring weekly availability. All seven days are always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Weekday, Vec<TimeBlock>>", into = "BTreeMap<Weekday, Vec<TimeBlock>>")]
pub struct WeekSchedule {
    days: BTreeMap<Weekday, Vec<TimeBlock>>,
}

impl From<BTreeMap<Weekday, Vec<TimeBlock>>> for WeekSchedule {
    fn from(mut days: BTreeMap<Weekday, Vec<TimeBlock>>) -> Self {
        for day in Weekday::ALL {
            days.entry(day).or_default();
        }
        Self { days }
    }
}

impl From<WeekSchedule> for BTreeMap<Weekday, Vec<TimeBlock>> {
    fn from(week: WeekSchedule) -> Self {
        week.days
    }
}

impl Default for WeekSchedule {
    fn default() -> Self {
        Self::empty()
    }
}

impl WeekSchedule {
    pub fn empty() -> Self {
        Self::from(BTreeMap::new())
    }

    pub fn with_day(mut self, day: Weekday, blocks: Vec<TimeBlock>) -> Self {
        self.set_day(day, blocks);
        self
    }

    pub fn day(&self, day: Weekday) -> &[TimeBlock] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_day(&mut self, day: Weekday, blocks: Vec<TimeBlock>) {
        self.days.insert(day, blocks);
    }

    /// Days in Monday-to-Sunday order.
    pub fn iter(&self) -> impl Iterator<Item = (Weekday, &[TimeBlock])> {
        self.days.iter().map(|(day, blocks)| (*day, blocks.as_slice()))
    }

    pub fn active_block_count(&self) -> usize {
        self.days
            .values()
            .flat_map(|blocks| blocks.iter())
            .filter(|block| block.active)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
}

pub const MIN_CONSULTATION_MINUTES: u32 = 15;
pub const MAX_CONSULTATION_MINUTES: u32 = 120;
pub const MAX_BUFFER_MINUTES: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationSettings {
    pub duration_minutes: u32,
    pub buffer_minutes: u32,
}

impl Default for ConsultationSettings {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            buffer_minutes: 0,
        }
    }
}

impl ConsultationSettings {
    pub fn validate(&self) -> Result<(), AgendaError> {
        if !(MIN_CONSULTATION_MINUTES..=MAX_CONSULTATION_MINUTES).contains(&self.duration_minutes) {
            return Err(AgendaError::Validation(format!(
                "Consultation duration must be between {} and {} minutes",
                MIN_CONSULTATION_MINUTES, MAX_CONSULTATION_MINUTES
            )));
        }
        if self.buffer_minutes > MAX_BUFFER_MINUTES {
            return Err(AgendaError::Validation(format!(
                "Buffer between consultations must be at most {} minutes",
                MAX_BUFFER_MINUTES
            )));
        }
        Ok(())
    }

    pub fn slot_interval_minutes(&self) -> u32 {
        self.duration_minutes.saturating_add(self.buffer_minutes)
    }
}

/// Everything the editor needs on mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    pub locations: Vec<Location>,
    pub week: WeekSchedule,
    pub settings: ConsultationSettings,
}

/// An already-booked appointment as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub start_minute: u32,
    pub end_minute: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub time: String,
    pub location_id: Option<String>,
}

// Request/response DTOs for the HTTP surface

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceAgendaRequest {
    pub week: WeekSchedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: chrono::NaiveDate,
    pub location_id: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AgendaError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to load agenda: {0}")]
    Load(String),

    #[error("Failed to save agenda: {0}")]
    Submit(String),

    #[error("Schedule store error: {0}")]
    Store(String),

    #[error("Malformed agenda record: {0}")]
    Normalization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}
