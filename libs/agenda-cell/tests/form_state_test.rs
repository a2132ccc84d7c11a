use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use mockall::mock;
use tokio::sync::Notify;

use agenda_cell::models::{
    AgendaError, ConsultationSettings, Location, ScheduleSnapshot, TimeBlock, WeekSchedule, Weekday,
};
use agenda_cell::services::presentation::render;
use agenda_cell::services::validation::BlockIssue;
use agenda_cell::services::{AgendaForm, ScheduleStore, SubmitOutcome};

mock! {
    pub Store {}

    #[async_trait]
    impl ScheduleStore for Store {
        async fn fetch_schedule(&self, doctor_id: &str) -> Result<ScheduleSnapshot, AgendaError>;
        async fn replace_schedule(&self, doctor_id: &str, week: &WeekSchedule) -> Result<(), AgendaError>;
    }
}

const DOCTOR_ID: &str = "doctor-123";

fn monday_block() -> TimeBlock {
    TimeBlock::new("08:00", "12:00", Some("loc-1"))
}

// Scenario A: a single valid Monday block.
fn monday_week() -> WeekSchedule {
    WeekSchedule::empty().with_day(Weekday::Monday, vec![monday_block()])
}

fn saved_snapshot(week: WeekSchedule) -> ScheduleSnapshot {
    ScheduleSnapshot {
        locations: vec![Location { id: "loc-1".to_string(), name: "Clínica Centro".to_string() }],
        week,
        settings: ConsultationSettings::default(),
    }
}

fn store_returning(week: WeekSchedule) -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_fetch_schedule()
        .returning(move |_| Ok(saved_snapshot(week.clone())));
    store
}

async fn loaded_form(store: MockStore) -> AgendaForm {
    let form = AgendaForm::new(DOCTOR_ID, Arc::new(store));
    form.load().await.unwrap();
    form
}

/// Holds every replace call open until released.
struct GatedStore {
    calls: AtomicUsize,
    release: Notify,
}

impl GatedStore {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0), release: Notify::new() }
    }
}

#[async_trait]
impl ScheduleStore for GatedStore {
    async fn fetch_schedule(&self, _doctor_id: &str) -> Result<ScheduleSnapshot, AgendaError> {
        Ok(saved_snapshot(monday_week()))
    }

    async fn replace_schedule(&self, _doctor_id: &str, _week: &WeekSchedule) -> Result<(), AgendaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release.notified().await;
        Ok(())
    }
}

async fn wait_until_submitting(form: &AgendaForm) {
    while !form.is_submitting().await {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_loaded_week_is_clean_and_saveable() {
    let form = loaded_form(store_returning(monday_week())).await;

    assert!(form.can_save().await);
    assert!(!form.is_dirty().await);

    let snapshot = form.snapshot().await;
    assert!(!snapshot.loading);
    assert_eq!(snapshot.values, monday_week());
    assert_eq!(snapshot.locations.len(), 1);
}

#[tokio::test]
async fn test_removing_only_block_disables_submit() {
    // No replace expectation: any store write would panic the mock.
    let form = loaded_form(store_returning(monday_week())).await;

    form.set_day_blocks(Weekday::Monday, vec![]).await;

    assert!(form.is_dirty().await);
    assert!(!form.can_save().await);
    assert!(!render(&form.snapshot().await).actions.save_enabled);
    assert_matches!(form.submit().await, Ok(SubmitOutcome::Invalid));
}

#[tokio::test]
async fn test_removing_block_keeps_other_valid_day() {
    let week = monday_week()
        .with_day(Weekday::Tuesday, vec![TimeBlock::new("13:00", "17:00", Some("loc-1"))]);
    let form = loaded_form(store_returning(week)).await;

    let removed = form.remove_block(Weekday::Monday, 0).await.unwrap();

    assert_eq!(removed, monday_block());
    assert!(form.is_dirty().await);
    assert!(form.can_save().await);
}

#[tokio::test]
async fn test_end_before_start_is_flagged() {
    let form = loaded_form(store_returning(WeekSchedule::empty())).await;

    form.set_day_blocks(Weekday::Monday, vec![TimeBlock::new("14:00", "10:00", Some("loc-1"))])
        .await;

    let snapshot = form.snapshot().await;
    assert!(!snapshot.can_save);
    assert_eq!(snapshot.issues.len(), 1);
    assert_eq!(snapshot.issues[0].day, Weekday::Monday);
    assert_eq!(snapshot.issues[0].failure.issue, BlockIssue::StartNotBeforeEnd);
    assert_eq!(snapshot.issues[0].failure.field, "location_id");
}

#[tokio::test]
async fn test_undo_restores_exact_saved_week() {
    let form = loaded_form(store_returning(monday_week())).await;

    form.update_block(Weekday::Monday, 0, TimeBlock::new("09:00", "11:00", Some("loc-1")))
        .await
        .unwrap();
    form.add_block(Weekday::Wednesday).await.unwrap();
    assert!(form.is_dirty().await);

    assert!(form.undo().await);

    let snapshot = form.snapshot().await;
    assert_eq!(snapshot.values, monday_week());
    assert!(!snapshot.dirty);
    assert!(!form.undo().await);
}

#[tokio::test]
async fn test_second_submit_without_edits_is_a_no_op() {
    let mut store = store_returning(monday_week());
    store
        .expect_replace_schedule()
        .withf(|doctor_id, week| doctor_id.to_string() == DOCTOR_ID && week.day(Weekday::Friday).len() == 1)
        .times(1)
        .returning(|_, _| Ok(()));
    let form = loaded_form(store).await;

    form.set_day_blocks(Weekday::Friday, vec![TimeBlock::new("14:00", "18:00", Some("loc-1"))])
        .await;

    assert_matches!(form.submit().await, Ok(SubmitOutcome::Saved));
    assert!(!form.is_dirty().await);
    assert_matches!(form.submit().await, Ok(SubmitOutcome::Unchanged));
}

#[tokio::test]
async fn test_failed_submit_keeps_edits() {
    let mut store = store_returning(monday_week());
    store
        .expect_replace_schedule()
        .times(1)
        .returning(|_, _| Err(AgendaError::Store("connection reset".to_string())));
    let form = loaded_form(store).await;

    form.add_block(Weekday::Tuesday).await.unwrap();
    form.update_block(Weekday::Tuesday, 0, TimeBlock::new("08:00", "12:00", Some("loc-1")))
        .await
        .unwrap();

    assert_matches!(form.submit().await, Err(AgendaError::Submit(_)));

    let snapshot = form.snapshot().await;
    assert!(snapshot.dirty);
    assert!(!snapshot.submitting);
    assert!(snapshot.submit_error.is_some());
    assert_eq!(snapshot.values.day(Weekday::Tuesday).len(), 1);
}

#[tokio::test]
async fn test_load_failure_is_recorded() {
    let mut store = MockStore::new();
    store
        .expect_fetch_schedule()
        .times(1)
        .returning(|_| Err(AgendaError::Store("API error (500)".to_string())));
    let form = AgendaForm::new(DOCTOR_ID, Arc::new(store));

    assert_matches!(form.load().await, Err(AgendaError::Load(_)));

    let snapshot = form.snapshot().await;
    assert!(!snapshot.loading);
    assert!(snapshot.load_error.is_some());
    assert_eq!(snapshot.values, WeekSchedule::empty());
    assert!(!snapshot.dirty);
}

#[tokio::test]
async fn test_add_block_needs_a_location() {
    let mut store = MockStore::new();
    store.expect_fetch_schedule().returning(|_| {
        Ok(ScheduleSnapshot {
            locations: vec![],
            week: WeekSchedule::empty(),
            settings: ConsultationSettings::default(),
        })
    });
    let form = loaded_form(store).await;

    assert_matches!(form.add_block(Weekday::Monday).await, Err(AgendaError::Validation(_)));
    assert!(!form.is_dirty().await);
}

#[tokio::test]
async fn test_out_of_range_edit_changes_nothing() {
    let form = loaded_form(store_returning(monday_week())).await;

    assert_matches!(form.remove_block(Weekday::Monday, 3).await, Err(AgendaError::Validation(_)));
    assert_matches!(
        form.update_block(Weekday::Sunday, 0, monday_block()).await,
        Err(AgendaError::Validation(_))
    );
    assert!(!form.is_dirty().await);
}

#[tokio::test]
async fn test_discard_prompt_lifecycle() {
    let form = loaded_form(store_returning(monday_week())).await;

    assert!(!form.request_discard().await);

    form.add_block(Weekday::Tuesday).await.unwrap();
    assert!(form.request_discard().await);

    form.dismiss_discard().await;
    let snapshot = form.snapshot().await;
    assert!(!snapshot.discard_prompt_open);
    assert!(snapshot.dirty);

    assert!(form.request_discard().await);
    assert!(form.confirm_discard().await);
    let snapshot = form.snapshot().await;
    assert_eq!(snapshot.values, monday_week());
    assert!(!snapshot.discard_prompt_open);
    assert!(!form.confirm_discard().await);
}

#[tokio::test]
async fn test_discard_prompt_closes_when_form_becomes_clean() {
    let form = loaded_form(store_returning(monday_week())).await;

    form.set_day_blocks(Weekday::Monday, vec![]).await;
    assert!(form.request_discard().await);

    form.set_day_blocks(Weekday::Monday, vec![monday_block()]).await;

    let snapshot = form.snapshot().await;
    assert!(!snapshot.dirty);
    assert!(!snapshot.discard_prompt_open);
}

#[tokio::test]
async fn test_concurrent_submit_makes_one_call() {
    let store = Arc::new(GatedStore::new());
    let form = AgendaForm::new(DOCTOR_ID, store.clone());
    form.load().await.unwrap();
    form.add_block(Weekday::Thursday).await.unwrap();
    form.update_block(Weekday::Thursday, 0, TimeBlock::new("08:00", "10:00", Some("loc-1")))
        .await
        .unwrap();

    let first = tokio::spawn({
        let form = form.clone();
        async move { form.submit().await }
    });
    wait_until_submitting(&form).await;

    assert!(!form.request_discard().await);
    assert!(!form.undo().await);
    assert_matches!(form.submit().await, Ok(SubmitOutcome::AlreadySubmitting));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);

    let view = render(&form.snapshot().await);
    assert!(!view.actions.save_enabled);
    assert_eq!(view.actions.save_label, "Saving...");

    store.release.notify_one();
    assert_matches!(first.await.unwrap(), Ok(SubmitOutcome::Saved));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert!(!form.is_dirty().await);
}

#[tokio::test]
async fn test_edits_during_submit_stay_dirty() {
    let store = Arc::new(GatedStore::new());
    let form = AgendaForm::new(DOCTOR_ID, store.clone());
    form.load().await.unwrap();
    form.set_day_blocks(Weekday::Monday, vec![TimeBlock::new("07:00", "12:00", Some("loc-1"))])
        .await;

    let first = tokio::spawn({
        let form = form.clone();
        async move { form.submit().await }
    });
    wait_until_submitting(&form).await;

    form.set_day_blocks(Weekday::Saturday, vec![TimeBlock::new("09:00", "12:00", Some("loc-1"))])
        .await;

    store.release.notify_one();
    assert_matches!(first.await.unwrap(), Ok(SubmitOutcome::Saved));
    assert!(form.is_dirty().await);
    assert!(form.snapshot().await.submit_error.is_none());
}

#[tokio::test]
async fn test_broken_block_on_another_day_blocks_submit() {
    // No replace expectation: any store write would panic the mock.
    let form = loaded_form(store_returning(monday_week())).await;

    form.set_day_blocks(Weekday::Tuesday, vec![TimeBlock::new("14:00", "10:00", Some("loc-1"))])
        .await;

    let snapshot = form.snapshot().await;
    assert!(snapshot.can_save);
    assert!(snapshot.dirty);
    assert_eq!(snapshot.issues.len(), 1);
    assert_eq!(snapshot.issues[0].label(), "Tuesday - Block 1");

    assert_matches!(form.submit().await, Ok(SubmitOutcome::Invalid));
    assert!(!form.is_submitting().await);
    assert!(form.is_dirty().await);
    assert!(!render(&form.snapshot().await).actions.save_enabled);
}

#[tokio::test]
async fn test_load_is_refused_while_saving() {
    let store = Arc::new(GatedStore::new());
    let form = AgendaForm::new(DOCTOR_ID, store.clone());
    form.load().await.unwrap();
    let edited = monday_week()
        .with_day(Weekday::Friday, vec![TimeBlock::new("14:00", "18:00", Some("loc-1"))]);
    form.set_day_blocks(Weekday::Friday, edited.day(Weekday::Friday).to_vec()).await;

    let first = tokio::spawn({
        let form = form.clone();
        async move { form.submit().await }
    });
    wait_until_submitting(&form).await;

    assert_matches!(form.load().await, Err(AgendaError::Load(_)));
    let snapshot = form.snapshot().await;
    assert!(snapshot.submitting);
    assert!(!snapshot.loading);
    assert_eq!(snapshot.values, edited);

    store.release.notify_one();
    assert_matches!(first.await.unwrap(), Ok(SubmitOutcome::Saved));
    assert!(!form.is_dirty().await);
    assert_eq!(form.snapshot().await.values, edited);
}
