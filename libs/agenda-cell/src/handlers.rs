use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{AgendaError, AvailableSlotsQuery, ConsultationSettings, ReplaceAgendaRequest};
use crate::services::slots::generate_time_slots;
use crate::services::store::{LocationCache, ScheduleStore, SupabaseScheduleStore};
use crate::services::validation::{can_save, week_issues};

/// Router state: configuration plus the location cache shared by every request.
#[derive(Clone)]
pub struct AgendaState {
    pub config: Arc<AppConfig>,
    pub locations: Arc<LocationCache>,
}

impl AgendaState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let locations = Arc::new(LocationCache::new(config.reference_cache_ttl()));
        Self { config, locations }
    }

    fn store(&self) -> SupabaseScheduleStore {
        SupabaseScheduleStore::new(&self.config, self.locations.clone())
    }
}

impl From<AgendaError> for AppError {
    fn from(err: AgendaError) -> Self {
        match err {
            AgendaError::Validation(msg) => AppError::ValidationError(msg),
            AgendaError::NotFound(msg) => AppError::NotFound(msg),
            AgendaError::Unauthorized(msg) => AppError::Forbidden(msg),
            AgendaError::Normalization(msg) => AppError::Internal(msg),
            AgendaError::Load(msg) | AgendaError::Submit(msg) | AgendaError::Store(msg) => {
                AppError::Database(msg)
            }
        }
    }
}

fn ensure_can_manage(user: &User, doctor_id: &str) -> Result<(), AppError> {
    if user.can_manage_agenda_of(doctor_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not allowed to manage this agenda".to_string()))
    }
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<AgendaState>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let store = state.store();

    let config = store.fetch_config(&doctor_id).await?;
    let settings = match config.settings.validate() {
        Ok(()) => config.settings,
        Err(e) => {
            warn!("Doctor {} has unusable consultation settings ({}), using defaults", doctor_id, e);
            ConsultationSettings::default()
        }
    };

    let booked = store.booked_intervals(&doctor_id, query.date).await?;
    let slots = generate_time_slots(
        &config.week,
        &settings,
        query.date,
        &booked,
        query.location_id.as_deref(),
    );

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "slots": slots
    })))
}

// ==============================================================================
// PROTECTED HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_agenda(
    State(state): State<AgendaState>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, &doctor_id)?;

    let store = state.store().with_auth_token(auth.token());
    let snapshot = store.fetch_schedule(&doctor_id).await?;

    Ok(Json(json!({
        "locations": snapshot.locations,
        "can_save": can_save(&snapshot.week),
        "week": snapshot.week,
        "settings": snapshot.settings
    })))
}

#[axum::debug_handler]
pub async fn replace_agenda(
    State(state): State<AgendaState>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<ReplaceAgendaRequest>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, &doctor_id)?;

    let issues = week_issues(&request.week);
    if !issues.is_empty() {
        let labels: Vec<String> = issues.iter().map(|issue| issue.label()).collect();
        debug!("Rejected agenda for doctor {}: {}", doctor_id, labels.join(", "));
        return Err(AppError::ValidationError(format!(
            "Fix the highlighted time blocks before saving: {}",
            labels.join(", ")
        )));
    }
    if !can_save(&request.week) {
        return Err(AppError::ValidationError(
            "Add at least one active time block with a location before saving".to_string(),
        ));
    }

    let store = state.store().with_auth_token(auth.token());
    store.replace_schedule(&doctor_id, &request.week).await?;

    info!("Agenda replaced for doctor {} by user {}", doctor_id, user.id);

    Ok(Json(json!({
        "saved": true,
        "week": request.week
    })))
}

#[axum::debug_handler]
pub async fn refresh_locations(
    State(state): State<AgendaState>,
    Path(doctor_id): Path<String>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    ensure_can_manage(&user, &doctor_id)?;

    let invalidated = state.store().invalidate_locations(&doctor_id).await;
    debug!("Location cache refresh for doctor {} (had entry: {})", doctor_id, invalidated);

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "invalidated": invalidated
    })))
}
