use serde::Serialize;

use crate::models::{TimeBlock, Weekday};
use crate::services::form::FormSnapshot;
use crate::services::validation::is_valid_active_block;

pub const SAVE_LABEL: &str = "Save agenda";
pub const SAVING_LABEL: &str = "Saving...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaHeader {
    pub days_with_availability: usize,
    pub active_blocks: usize,
    pub location_count: usize,
    pub needs_location: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionBar {
    pub save_enabled: bool,
    pub undo_enabled: bool,
    pub save_label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockMessage {
    pub index: usize,
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPanel {
    pub day: Weekday,
    pub label: &'static str,
    pub blocks: Vec<TimeBlock>,
    pub errors: Vec<BlockMessage>,
    pub can_add_block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaView {
    pub header: AgendaHeader,
    pub days: Vec<DayPanel>,
    pub actions: ActionBar,
    pub discard_prompt_open: bool,
    pub error: Option<String>,
}

pub fn header(snapshot: &FormSnapshot) -> AgendaHeader {
    AgendaHeader {
        days_with_availability: snapshot
            .values
            .iter()
            .filter(|(_, blocks)| blocks.iter().any(is_valid_active_block))
            .count(),
        active_blocks: snapshot.values.active_block_count(),
        location_count: snapshot.locations.len(),
        needs_location: snapshot.locations.is_empty(),
    }
}

pub fn action_bar(snapshot: &FormSnapshot) -> ActionBar {
    ActionBar {
        save_enabled: snapshot.dirty
            && snapshot.can_save
            && snapshot.issues.is_empty()
            && !snapshot.submitting
            && !snapshot.loading,
        undo_enabled: snapshot.dirty && !snapshot.submitting,
        save_label: if snapshot.submitting { SAVING_LABEL } else { SAVE_LABEL },
    }
}

pub fn day_panels(snapshot: &FormSnapshot) -> Vec<DayPanel> {
    let can_add_block = !snapshot.locations.is_empty() && !snapshot.submitting;

    snapshot
        .values
        .iter()
        .map(|(day, blocks)| DayPanel {
            day,
            label: day.label(),
            blocks: blocks.to_vec(),
            errors: snapshot
                .issues
                .iter()
                .filter(|issue| issue.day == day)
                .map(|issue| BlockMessage {
                    index: issue.index,
                    field: issue.failure.field,
                    message: issue.failure.message(),
                })
                .collect(),
            can_add_block,
        })
        .collect()
}

pub fn render(snapshot: &FormSnapshot) -> AgendaView {
    AgendaView {
        header: header(snapshot),
        days: day_panels(snapshot),
        actions: action_bar(snapshot),
        discard_prompt_open: snapshot.discard_prompt_open,
        error: snapshot.submit_error.clone().or_else(|| snapshot.load_error.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConsultationSettings, Location, WeekSchedule};
    use crate::services::validation::{can_save, week_issues};

    fn snapshot(values: WeekSchedule, dirty: bool, submitting: bool) -> FormSnapshot {
        FormSnapshot {
            doctor_id: "doctor-1".into(),
            can_save: can_save(&values),
            issues: week_issues(&values),
            values,
            locations: vec![Location { id: "loc-1".into(), name: "Clínica Centro".into() }],
            settings: ConsultationSettings::default(),
            loading: false,
            submitting,
            dirty,
            load_error: None,
            submit_error: None,
            discard_prompt_open: false,
        }
    }

    #[test]
    fn test_action_bar_follows_flags() {
        let week = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![TimeBlock::new("08:00", "12:00", Some("loc-1"))]);

        let clean = action_bar(&snapshot(week.clone(), false, false));
        assert!(!clean.save_enabled);
        assert!(!clean.undo_enabled);

        let dirty = action_bar(&snapshot(week.clone(), true, false));
        assert!(dirty.save_enabled);
        assert!(dirty.undo_enabled);
        assert_eq!(dirty.save_label, SAVE_LABEL);

        let saving = action_bar(&snapshot(week, true, true));
        assert!(!saving.save_enabled);
        assert!(!saving.undo_enabled);
        assert_eq!(saving.save_label, SAVING_LABEL);
    }

    #[test]
    fn test_invalid_week_disables_save() {
        let week = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![TimeBlock::new("14:00", "10:00", Some("loc-1"))]);

        let view = render(&snapshot(week, true, false));
        assert!(!view.actions.save_enabled);
        assert_eq!(view.header.days_with_availability, 0);
        assert_eq!(view.header.active_blocks, 1);

        let monday = &view.days[0];
        assert_eq!(monday.day, Weekday::Monday);
        assert_eq!(monday.errors.len(), 1);
        assert_eq!(monday.errors[0].field, "location_id");
    }

    #[test]
    fn test_any_broken_block_disables_save() {
        let week = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![TimeBlock::new("08:00", "12:00", Some("loc-1"))])
            .with_day(Weekday::Tuesday, vec![TimeBlock::new("14:00", "10:00", Some("loc-1"))]);

        let view = render(&snapshot(week, true, false));
        assert!(!view.actions.save_enabled);
        assert!(view.actions.undo_enabled);
        assert_eq!(view.days[1].errors.len(), 1);
    }

    #[test]
    fn test_no_locations_blocks_adding() {
        let mut snap = snapshot(WeekSchedule::empty(), false, false);
        snap.locations.clear();

        let view = render(&snap);
        assert!(view.header.needs_location);
        assert!(view.days.iter().all(|day| !day.can_add_block));
    }
}
