// Conversion between the loosely-typed rows of the hosted database and the
// agenda's internal records. Every read and write of agenda data passes
// through here exactly once.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::models::{
    AgendaError, BookedInterval, ConsultationSettings, Location, TimeBlock, WeekSchedule, Weekday,
    MAX_BUFFER_MINUTES,
};

/// Placeholder the older editor stored instead of a real location id.
const ALL_LOCATIONS_PLACEHOLDER: &str = "all-locations";
const UNNAMED_LOCATION: &str = "Unnamed location";
const WEEK_KEY: &str = "horarioAtendimento";
const DURATION_KEY: &str = "duracaoConsulta";
const BUFFER_KEY: &str = "bufferMinutos";
const DEFAULT_APPOINTMENT_MINUTES: u32 = 30;
const MINUTES_PER_DAY: u32 = 24 * 60;

pub fn raw_day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Monday => "segunda",
        Weekday::Tuesday => "terca",
        Weekday::Wednesday => "quarta",
        Weekday::Thursday => "quinta",
        Weekday::Friday => "sexta",
        Weekday::Saturday => "sabado",
        Weekday::Sunday => "domingo",
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Int(i64),
    Text(String),
}

impl RawId {
    fn into_id(self) -> Option<String> {
        match self {
            RawId::Int(id) => Some(id.to_string()),
            RawId::Text(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() || trimmed == ALL_LOCATIONS_PLACEHOLDER {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawFlag {
    Bool(bool),
    Number(i64),
    Text(String),
}

impl RawFlag {
    fn as_bool(&self) -> bool {
        match self {
            RawFlag::Bool(flag) => *flag,
            RawFlag::Number(n) => *n != 0,
            RawFlag::Text(text) => matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "sim"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

impl RawNumber {
    fn as_minutes(&self) -> Option<u32> {
        let value = match self {
            RawNumber::Number(n) => *n,
            RawNumber::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        if value.is_finite() && value >= 0.0 {
            Some(value.round() as u32)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTimeBlock {
    #[serde(default)]
    pub ativo: Option<RawFlag>,
    #[serde(default)]
    pub inicio: Option<String>,
    #[serde(default)]
    pub fim: Option<String>,
    #[serde(default)]
    pub local_id: Option<RawId>,
}

impl From<RawTimeBlock> for TimeBlock {
    fn from(raw: RawTimeBlock) -> Self {
        TimeBlock {
            active: raw.ativo.as_ref().map(RawFlag::as_bool).unwrap_or(false),
            start: raw.inicio.as_deref().map(normalize_time).unwrap_or_default(),
            end: raw.fim.as_deref().map(normalize_time).unwrap_or_default(),
            location_id: raw.local_id.and_then(RawId::into_id),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLocation {
    pub id: RawId,
    #[serde(default)]
    pub nome_local: Option<String>,
    #[serde(default)]
    pub ativo: Option<RawFlag>,
}

/// Inactive rows and rows without a usable id are dropped.
pub fn normalize_location(raw: RawLocation) -> Option<Location> {
    if let Some(flag) = &raw.ativo {
        if !flag.as_bool() {
            return None;
        }
    }

    let id = raw.id.into_id()?;
    let name = raw
        .nome_local
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNNAMED_LOCATION.to_string());

    Some(Location { id, name })
}

pub fn normalize_locations(rows: Vec<Value>) -> Vec<Location> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<RawLocation>(row) {
            Ok(raw) => normalize_location(raw),
            Err(e) => {
                warn!("Skipping malformed location row: {}", e);
                None
            }
        })
        .collect()
}

/// Pads `8:00` to `08:00` and drops seconds from `08:00:00` so that times keep
/// sorting correctly as text. Anything else is passed through trimmed.
pub fn normalize_time(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut parts = trimmed.split(':');

    match (parts.next(), parts.next()) {
        (Some(hours), Some(minutes))
            if (1..=2).contains(&hours.len())
                && minutes.len() == 2
                && hours.chars().all(|c| c.is_ascii_digit())
                && minutes.chars().all(|c| c.is_ascii_digit()) =>
        {
            format!("{:0>2}:{}", hours, minutes)
        }
        _ => trimmed.to_string(),
    }
}

pub fn normalize_day(raw: Option<&Value>) -> Vec<TimeBlock> {
    let Some(Value::Array(entries)) = raw else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RawTimeBlock>(entry.clone()) {
            Ok(raw_block) => Some(TimeBlock::from(raw_block)),
            Err(e) => {
                warn!("Skipping malformed time block: {}", e);
                None
            }
        })
        .collect()
}

pub fn normalize_week(raw: Option<&Value>) -> WeekSchedule {
    let mut week = WeekSchedule::empty();
    if let Some(Value::Object(days)) = raw {
        for day in Weekday::ALL {
            week.set_day(day, normalize_day(days.get(raw_day_key(day))));
        }
    }
    week
}

pub fn block_to_raw(block: &TimeBlock) -> Value {
    json!({
        "ativo": block.active,
        "inicio": block.start,
        "fim": block.end,
        "local_id": block.location_id,
    })
}

pub fn week_to_raw(week: &WeekSchedule) -> Value {
    let days: Map<String, Value> = week
        .iter()
        .map(|(day, blocks)| {
            (
                raw_day_key(day).to_string(),
                Value::Array(blocks.iter().map(block_to_raw).collect()),
            )
        })
        .collect();
    Value::Object(days)
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAppointment {
    pub data_consulta: String,
    #[serde(default)]
    pub duracao_minutos: Option<RawNumber>,
}

/// Booked appointment as a same-day interval in UTC minutes. Rows with an
/// unreadable timestamp are dropped.
pub fn normalize_booked_interval(raw: RawAppointment) -> Option<BookedInterval> {
    let timestamp = raw.data_consulta.trim();
    let start = DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S"));

    let start = match start {
        Ok(start) => start,
        Err(e) => {
            warn!("Skipping appointment with unreadable time {:?}: {}", timestamp, e);
            return None;
        }
    };

    let duration = raw
        .duracao_minutos
        .as_ref()
        .and_then(RawNumber::as_minutes)
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_APPOINTMENT_MINUTES);
    let start_minute = start.hour() * 60 + start.minute();

    Some(BookedInterval {
        start_minute,
        end_minute: (start_minute + duration).min(MINUTES_PER_DAY),
    })
}

pub fn normalize_booked_intervals(rows: Vec<Value>) -> Vec<BookedInterval> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<RawAppointment>(row) {
            Ok(raw) => normalize_booked_interval(raw),
            Err(e) => {
                warn!("Skipping malformed appointment row: {}", e);
                None
            }
        })
        .collect()
}

/// A doctor's `configuracoes` column, normalized. `raw` keeps every key the
/// agenda does not own so a save can write them back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct DoctorConfig {
    pub week: WeekSchedule,
    pub settings: ConsultationSettings,
    raw: Map<String, Value>,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            week: WeekSchedule::empty(),
            settings: ConsultationSettings::default(),
            raw: Map::new(),
        }
    }
}

impl DoctorConfig {
    /// Accepts the column as an object, a JSON-encoded string, or null.
    pub fn parse(column: &Value) -> Result<Self, AgendaError> {
        let object = match column {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map.clone(),
            Value::String(text) if text.trim().is_empty() => return Ok(Self::default()),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(other) => {
                    return Err(AgendaError::Normalization(format!(
                        "doctor configuration is not an object: {}",
                        other
                    )))
                }
                Err(e) => {
                    return Err(AgendaError::Normalization(format!(
                        "doctor configuration is not valid JSON: {}",
                        e
                    )))
                }
            },
            other => {
                return Err(AgendaError::Normalization(format!(
                    "unexpected doctor configuration type: {}",
                    other
                )))
            }
        };

        let defaults = ConsultationSettings::default();
        let minutes = |key: &str| {
            object
                .get(key)
                .cloned()
                .and_then(|value| serde_json::from_value::<RawNumber>(value).ok())
                .and_then(|raw| raw.as_minutes())
        };

        let settings = ConsultationSettings {
            duration_minutes: minutes(DURATION_KEY)
                .filter(|minutes| *minutes > 0)
                .unwrap_or(defaults.duration_minutes),
            buffer_minutes: minutes(BUFFER_KEY)
                .map(|minutes| minutes.min(MAX_BUFFER_MINUTES))
                .unwrap_or(defaults.buffer_minutes),
        };

        let week = normalize_week(object.get(WEEK_KEY));
        debug!("Normalized doctor config with {} active blocks", week.active_block_count());

        Ok(Self {
            week,
            settings,
            raw: object,
        })
    }

    /// The full column with only the weekly agenda replaced.
    pub fn merged_with_week(&self, week: &WeekSchedule) -> Value {
        let mut merged = self.raw.clone();
        merged.insert(WEEK_KEY.to_string(), week_to_raw(week));
        Value::Object(merged)
    }
}
