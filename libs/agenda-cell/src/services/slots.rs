use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, warn};

use crate::models::{BookedInterval, ConsultationSettings, TimeSlot, WeekSchedule, Weekday};
use crate::services::validation::is_valid_active_block;

fn minutes_of(raw: &str) -> Option<u32> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .ok()
        .map(|time| time.hour() * 60 + time.minute())
}

fn format_minutes(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Bookable start times on `date` derived from the weekly agenda.
///
/// Each active block is walked from its start in steps of consultation length
/// plus buffer; a slot is kept when it ends by the block's end and does not
/// overlap a booked appointment. With `location_id` only blocks at that
/// location are considered.
pub fn generate_time_slots(
    week: &WeekSchedule,
    settings: &ConsultationSettings,
    date: NaiveDate,
    booked: &[BookedInterval],
    location_id: Option<&str>,
) -> Vec<TimeSlot> {
    let day = Weekday::from_chrono(date.weekday());
    let duration = settings.duration_minutes;
    let step = settings.slot_interval_minutes();

    if duration == 0 {
        warn!("Consultation duration is zero, no slots generated");
        return Vec::new();
    }

    let mut slots = Vec::new();

    for block in week.day(day).iter().filter(|block| is_valid_active_block(block)) {
        if let Some(wanted) = location_id {
            if block.location_id.as_deref() != Some(wanted) {
                continue;
            }
        }

        let (Some(start), Some(end)) = (minutes_of(&block.start), minutes_of(&block.end)) else {
            warn!("Skipping block with unreadable times {}-{} on {}", block.start, block.end, day);
            continue;
        };

        let mut slot_start = start;
        while let Some(slot_end) = slot_start.checked_add(duration).filter(|slot_end| *slot_end <= end) {
            let taken = booked
                .iter()
                .any(|b| slot_start < b.end_minute && slot_end > b.start_minute);

            if !taken {
                slots.push(TimeSlot {
                    time: format_minutes(slot_start),
                    location_id: block.location_id.clone(),
                });
            }

            slot_start = match slot_start.checked_add(step) {
                Some(next) => next,
                None => break,
            };
        }
    }

    // Overlapping blocks at the same location offer the same start once.
    slots.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.location_id.cmp(&b.location_id)));
    slots.dedup();
    debug!("Generated {} slots for {} ({})", slots.len(), date, day);
    slots
}
