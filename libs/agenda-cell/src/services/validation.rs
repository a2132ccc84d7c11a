use serde::{Deserialize, Serialize};

use crate::models::{TimeBlock, WeekSchedule, Weekday};

/// Field every block failure is reported under. Start/end ordering problems
/// share it with the missing-location case.
pub const BLOCK_ERROR_FIELD: &str = "location_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockIssue {
    MissingLocation,
    MissingStart,
    MissingEnd,
    StartNotBeforeEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub field: &'static str,
    pub issue: BlockIssue,
}

impl ValidationFailure {
    fn new(issue: BlockIssue) -> Self {
        Self {
            field: BLOCK_ERROR_FIELD,
            issue,
        }
    }

    pub fn message(&self) -> &'static str {
        match self.issue {
            BlockIssue::MissingLocation => "Select a location for this block",
            BlockIssue::MissingStart => "Start time is required",
            BlockIssue::MissingEnd => "End time is required",
            BlockIssue::StartNotBeforeEnd => "Start time must be before end time",
        }
    }
}

/// A failing block located within the week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockError {
    pub day: Weekday,
    pub index: usize,
    pub failure: ValidationFailure,
}

impl BlockError {
    /// Human position of the block, e.g. `Monday - Block 1`.
    pub fn label(&self) -> String {
        format!("{} - Block {}", self.day.label(), self.index + 1)
    }
}

pub fn validate_block(block: &TimeBlock) -> Result<(), ValidationFailure> {
    if !block.active {
        return Ok(());
    }

    if block.location_id.is_none() {
        return Err(ValidationFailure::new(BlockIssue::MissingLocation));
    }
    if block.start.is_empty() {
        return Err(ValidationFailure::new(BlockIssue::MissingStart));
    }
    if block.end.is_empty() {
        return Err(ValidationFailure::new(BlockIssue::MissingEnd));
    }
    // Zero-padded HH:MM sorts correctly as text.
    if block.start >= block.end {
        return Err(ValidationFailure::new(BlockIssue::StartNotBeforeEnd));
    }

    Ok(())
}

pub fn is_valid_active_block(block: &TimeBlock) -> bool {
    block.active && validate_block(block).is_ok()
}

/// True when at least one day holds an active, well-formed block.
pub fn can_save(week: &WeekSchedule) -> bool {
    week.iter()
        .any(|(_, blocks)| blocks.iter().any(is_valid_active_block))
}

pub fn week_issues(week: &WeekSchedule) -> Vec<BlockError> {
    week.iter()
        .flat_map(|(day, blocks)| {
            blocks.iter().enumerate().filter_map(move |(index, block)| {
                validate_block(block)
                    .err()
                    .map(|failure| BlockError { day, index, failure })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn active(start: &str, end: &str, location: Option<&str>) -> TimeBlock {
        TimeBlock::new(start, end, location)
    }

    #[test]
    fn test_inactive_blocks_always_pass() {
        let blocks = [
            TimeBlock::inactive("", ""),
            TimeBlock::inactive("14:00", "10:00"),
            TimeBlock { active: false, start: "09:00".into(), end: "09:00".into(), location_id: Some("loc-1".into()) },
        ];

        for block in &blocks {
            assert_eq!(validate_block(block), Ok(()));
            assert!(!is_valid_active_block(block));
        }
    }

    #[test]
    fn test_active_block_rules() {
        assert_eq!(validate_block(&active("08:00", "12:00", Some("loc-1"))), Ok(()));

        assert_matches!(
            validate_block(&active("08:00", "12:00", None)),
            Err(ValidationFailure { issue: BlockIssue::MissingLocation, .. })
        );
        assert_matches!(
            validate_block(&active("", "12:00", Some("loc-1"))),
            Err(ValidationFailure { issue: BlockIssue::MissingStart, .. })
        );
        assert_matches!(
            validate_block(&active("08:00", "", Some("loc-1"))),
            Err(ValidationFailure { issue: BlockIssue::MissingEnd, .. })
        );
        assert_matches!(
            validate_block(&active("12:00", "12:00", Some("loc-1"))),
            Err(ValidationFailure { issue: BlockIssue::StartNotBeforeEnd, .. })
        );
    }

    #[test]
    fn test_every_failure_is_reported_under_location_field() {
        let ordering = validate_block(&active("14:00", "10:00", Some("loc-1"))).unwrap_err();
        let missing = validate_block(&active("08:00", "12:00", None)).unwrap_err();

        assert_eq!(ordering.field, "location_id");
        assert_eq!(missing.field, "location_id");
        assert_ne!(ordering.message(), missing.message());
    }

    #[test]
    fn test_can_save_scenarios() {
        let monday_morning = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![active("08:00", "12:00", Some("loc-1"))]);
        assert!(can_save(&monday_morning));

        assert!(!can_save(&WeekSchedule::empty()));

        let reversed = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![active("14:00", "10:00", Some("loc-1"))]);
        assert!(!can_save(&reversed));

        let only_inactive = WeekSchedule::empty()
            .with_day(Weekday::Tuesday, vec![TimeBlock::inactive("08:00", "12:00")]);
        assert!(!can_save(&only_inactive));
    }

    #[test]
    fn test_one_valid_block_is_enough_despite_invalid_siblings() {
        let week = WeekSchedule::empty()
            .with_day(Weekday::Monday, vec![active("14:00", "10:00", Some("loc-1"))])
            .with_day(Weekday::Friday, vec![active("08:00", "12:00", Some("loc-2"))]);

        assert!(can_save(&week));
        assert_eq!(week_issues(&week).len(), 1);
    }

    #[test]
    fn test_overlap_not_rejected() {
        let week = WeekSchedule::empty().with_day(
            Weekday::Monday,
            vec![
                active("08:00", "12:00", Some("loc-1")),
                active("10:00", "14:00", Some("loc-1")),
            ],
        );

        assert!(can_save(&week));
        assert!(week_issues(&week).is_empty());
    }

    #[test]
    fn test_issue_labels() {
        let week = WeekSchedule::empty().with_day(
            Weekday::Wednesday,
            vec![active("08:00", "12:00", Some("loc-1")), active("08:00", "12:00", None)],
        );

        let issues = week_issues(&week);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].label(), "Wednesday - Block 2");
    }
}
