// =====================================================================================
// WEEKLY AGENDA FORM STATE
// =====================================================================================
//
// Owns the in-memory week being edited, the last-saved copy it is compared
// against, and the submission lifecycle (Idle -> Submitting -> Idle). Every
// operation takes the state lock once, so derived flags are never observed
// half-updated.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::models::{AgendaError, ConsultationSettings, Location, TimeBlock, WeekSchedule, Weekday};
use crate::services::confirmation::DiscardConfirmation;
use crate::services::store::ScheduleStore;
use crate::services::validation::{can_save, week_issues, BlockError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPhase {
    Idle,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Saved,
    /// Another submission is still in flight; nothing was sent.
    AlreadySubmitting,
    /// No day has a valid active block, or some block fails validation.
    Invalid,
    /// Values match the last save.
    Unchanged,
}

struct FormState {
    loading: bool,
    values: WeekSchedule,
    saved: WeekSchedule,
    locations: Vec<Location>,
    settings: ConsultationSettings,
    dirty: bool,
    can_save: bool,
    phase: SubmitPhase,
    load_error: Option<String>,
    submit_error: Option<String>,
    confirmation: DiscardConfirmation,
}

impl FormState {
    fn new() -> Self {
        Self {
            loading: true,
            values: WeekSchedule::empty(),
            saved: WeekSchedule::empty(),
            locations: Vec::new(),
            settings: ConsultationSettings::default(),
            dirty: false,
            can_save: false,
            phase: SubmitPhase::Idle,
            load_error: None,
            submit_error: None,
            confirmation: DiscardConfirmation::Closed,
        }
    }

    fn submitting(&self) -> bool {
        self.phase == SubmitPhase::Submitting
    }

    fn recompute(&mut self) {
        self.dirty = self.values != self.saved;
        self.can_save = can_save(&self.values);
        let submitting = self.submitting();
        self.confirmation.reconcile(self.dirty, submitting);
    }

    fn restore_saved(&mut self) {
        self.values = self.saved.clone();
        self.confirmation.close();
        self.recompute();
    }
}

/// Read-only copy of the form handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSnapshot {
    pub doctor_id: String,
    pub values: WeekSchedule,
    pub locations: Vec<Location>,
    pub settings: ConsultationSettings,
    pub loading: bool,
    pub submitting: bool,
    pub dirty: bool,
    pub can_save: bool,
    pub load_error: Option<String>,
    pub submit_error: Option<String>,
    pub discard_prompt_open: bool,
    pub issues: Vec<BlockError>,
}

/// Editing session for one doctor's weekly agenda. Cheap to clone; clones share
/// the same state.
#[derive(Clone)]
pub struct AgendaForm {
    doctor_id: String,
    store: Arc<dyn ScheduleStore>,
    state: Arc<RwLock<FormState>>,
}

impl AgendaForm {
    pub fn new(doctor_id: &str, store: Arc<dyn ScheduleStore>) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            store,
            state: Arc::new(RwLock::new(FormState::new())),
        }
    }

    pub fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    /// Fetch locations and the saved week. On failure the previous values are
    /// kept and the error is recorded for display; there is no retry. Refused
    /// while a submit is in flight.
    #[instrument(skip(self), fields(doctor_id = %self.doctor_id))]
    pub async fn load(&self) -> Result<(), AgendaError> {
        {
            let mut state = self.state.write().await;
            if state.submitting() {
                debug!("Load refused, a save is in flight");
                return Err(AgendaError::Load("A save is in progress".to_string()));
            }
            state.loading = true;
            state.load_error = None;
        }

        let result = self.store.fetch_schedule(&self.doctor_id).await;

        let mut state = self.state.write().await;
        state.loading = false;

        match result {
            Ok(snapshot) => {
                state.saved = snapshot.week.clone();
                state.values = snapshot.week;
                state.locations = snapshot.locations;
                state.settings = snapshot.settings;
                state.submit_error = None;
                state.recompute();
                debug!(
                    locations = state.locations.len(),
                    active_blocks = state.values.active_block_count(),
                    "Agenda loaded"
                );
                Ok(())
            }
            Err(e) => {
                error!("Failed to load agenda: {}", e);
                state.load_error = Some(e.to_string());
                Err(AgendaError::Load(e.to_string()))
            }
        }
    }

    pub async fn set_day_blocks(&self, day: Weekday, blocks: Vec<TimeBlock>) {
        let mut state = self.state.write().await;
        state.values.set_day(day, blocks);
        state.recompute();
    }

    /// Appends the day's template block and returns its index. Refused until
    /// the doctor has at least one location to attach it to.
    pub async fn add_block(&self, day: Weekday) -> Result<usize, AgendaError> {
        let mut state = self.state.write().await;
        if state.locations.is_empty() {
            return Err(AgendaError::Validation(
                "Register a location before adding time blocks".to_string(),
            ));
        }

        let mut blocks = state.values.day(day).to_vec();
        blocks.push(TimeBlock::template_for(day));
        let index = blocks.len() - 1;
        state.values.set_day(day, blocks);
        state.recompute();

        Ok(index)
    }

    pub async fn update_block(&self, day: Weekday, index: usize, block: TimeBlock) -> Result<(), AgendaError> {
        let mut state = self.state.write().await;
        let mut blocks = state.values.day(day).to_vec();
        let slot = blocks
            .get_mut(index)
            .ok_or_else(|| AgendaError::Validation(format!("{} has no block {}", day, index + 1)))?;
        *slot = block;
        state.values.set_day(day, blocks);
        state.recompute();

        Ok(())
    }

    pub async fn remove_block(&self, day: Weekday, index: usize) -> Result<TimeBlock, AgendaError> {
        let mut state = self.state.write().await;
        let mut blocks = state.values.day(day).to_vec();
        if index >= blocks.len() {
            return Err(AgendaError::Validation(format!("{} has no block {}", day, index + 1)));
        }
        let removed = blocks.remove(index);
        state.values.set_day(day, blocks);
        state.recompute();

        Ok(removed)
    }

    /// Persist the whole week. Single-flight: a call made while another is
    /// outstanding returns [`SubmitOutcome::AlreadySubmitting`] without
    /// touching the store.
    #[instrument(skip(self), fields(doctor_id = %self.doctor_id))]
    pub async fn submit(&self) -> Result<SubmitOutcome, AgendaError> {
        let week = {
            let mut state = self.state.write().await;
            if state.submitting() {
                debug!("Submit ignored, one is already in flight");
                return Ok(SubmitOutcome::AlreadySubmitting);
            }
            if !state.can_save {
                debug!("Submit refused, no valid active block");
                return Ok(SubmitOutcome::Invalid);
            }
            let issues = week_issues(&state.values);
            if !issues.is_empty() {
                let labels: Vec<String> = issues.iter().map(BlockError::label).collect();
                debug!("Submit refused, blocks need fixing: {}", labels.join(", "));
                return Ok(SubmitOutcome::Invalid);
            }
            if !state.dirty {
                return Ok(SubmitOutcome::Unchanged);
            }

            state.phase = SubmitPhase::Submitting;
            state.submit_error = None;
            state.recompute();
            state.values.clone()
        };

        let result = self.store.replace_schedule(&self.doctor_id, &week).await;

        let mut state = self.state.write().await;
        state.phase = SubmitPhase::Idle;

        match result {
            Ok(()) => {
                state.saved = week;
                state.recompute();
                if state.dirty {
                    warn!("Agenda edited while saving, changes remain unsaved");
                }
                info!(active_blocks = state.saved.active_block_count(), "Agenda saved");
                Ok(SubmitOutcome::Saved)
            }
            Err(e) => {
                error!("Failed to save agenda: {}", e);
                state.submit_error = Some(e.to_string());
                state.recompute();
                Err(AgendaError::Submit(e.to_string()))
            }
        }
    }

    /// Throw away edits and go back to the last saved week. Returns whether
    /// anything was restored.
    pub async fn undo(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.dirty || state.submitting() {
            return false;
        }
        state.restore_saved();
        debug!("Agenda edits discarded");
        true
    }

    pub async fn request_discard(&self) -> bool {
        let mut state = self.state.write().await;
        let (dirty, submitting) = (state.dirty, state.submitting());
        state.confirmation.request(dirty, submitting)
    }

    pub async fn confirm_discard(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.confirmation.is_open() {
            return false;
        }
        state.restore_saved();
        true
    }

    pub async fn dismiss_discard(&self) {
        self.state.write().await.confirmation.close();
    }

    pub async fn is_dirty(&self) -> bool {
        self.state.read().await.dirty
    }

    pub async fn can_save(&self) -> bool {
        self.state.read().await.can_save
    }

    pub async fn is_submitting(&self) -> bool {
        self.state.read().await.submitting()
    }

    pub async fn snapshot(&self) -> FormSnapshot {
        let state = self.state.read().await;
        FormSnapshot {
            doctor_id: self.doctor_id.clone(),
            values: state.values.clone(),
            locations: state.locations.clone(),
            settings: state.settings,
            loading: state.loading,
            submitting: state.submitting(),
            dirty: state.dirty,
            can_save: state.can_save,
            load_error: state.load_error.clone(),
            submit_error: state.submit_error.clone(),
            discard_prompt_open: state.confirmation.is_open(),
            issues: week_issues(&state.values),
        }
    }
}
