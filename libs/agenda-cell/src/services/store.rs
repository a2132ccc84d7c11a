use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use shared_config::AppConfig;
use shared_database::SupabaseClient;

use crate::models::{AgendaError, BookedInterval, Location, ScheduleSnapshot, WeekSchedule};
use crate::services::cache::ReferenceCache;
use crate::services::normalize::{normalize_booked_intervals, normalize_locations, DoctorConfig};

pub type LocationCache = ReferenceCache<String, Vec<Location>>;

/// Doctor ids arrive decoded from the URL path; encode them again so `&` or
/// `,` cannot add PostgREST filters.
fn filter_value(doctor_id: &str) -> String {
    urlencoding::encode(doctor_id).into_owned()
}

/// Where a doctor's agenda lives. The editor only ever loads the whole week and
/// replaces the whole week.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn fetch_schedule(&self, doctor_id: &str) -> Result<ScheduleSnapshot, AgendaError>;

    async fn replace_schedule(&self, doctor_id: &str, week: &WeekSchedule) -> Result<(), AgendaError>;
}

pub struct SupabaseScheduleStore {
    supabase: SupabaseClient,
    locations: Arc<LocationCache>,
    auth_token: Option<String>,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig, locations: Arc<LocationCache>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            locations,
            auth_token: None,
        }
    }

    /// Run requests as the given user so row-level policies apply to them.
    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    pub async fn fetch_locations(&self, doctor_id: &str) -> Result<Vec<Location>, AgendaError> {
        let key = doctor_id.to_string();
        if let Some(cached) = self.locations.get(&key).await {
            return Ok(cached);
        }

        let path = format!(
            "/rest/v1/locais_atendimento?medico_id=eq.{}&ativo=eq.true&select=id,nome_local,ativo",
            filter_value(doctor_id)
        );
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| AgendaError::Store(e.to_string()))?;

        let locations = normalize_locations(rows);
        debug!("Loaded {} locations for doctor {}", locations.len(), doctor_id);
        self.locations.set(key, locations.clone()).await;

        Ok(locations)
    }

    pub async fn invalidate_locations(&self, doctor_id: &str) -> bool {
        self.locations.invalidate(&doctor_id.to_string()).await
    }

    /// The doctor's stored week and consultation settings, without locations.
    pub async fn fetch_config(&self, doctor_id: &str) -> Result<DoctorConfig, AgendaError> {
        let path = format!("/rest/v1/medicos?user_id=eq.{}&select=configuracoes", filter_value(doctor_id));
        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| AgendaError::Store(e.to_string()))?;

        match rows.first() {
            Some(row) => DoctorConfig::parse(row.get("configuracoes").unwrap_or(&Value::Null)),
            None => {
                debug!("No doctor row for {}, starting from an empty agenda", doctor_id);
                Ok(DoctorConfig::default())
            }
        }
    }

    /// Appointments already booked on `date`, cancelled ones excluded.
    #[instrument(skip(self))]
    pub async fn booked_intervals(&self, doctor_id: &str, date: NaiveDate) -> Result<Vec<BookedInterval>, AgendaError> {
        let next_day = date + Duration::days(1);
        let path = format!(
            "/rest/v1/consultas?medico_id=eq.{}&data_consulta=gte.{}T00:00:00&data_consulta=lt.{}T00:00:00&status=neq.cancelada&select=data_consulta,duracao_minutos",
            filter_value(doctor_id), date, next_day
        );

        let rows: Vec<Value> = self.supabase
            .request(Method::GET, &path, self.token(), None)
            .await
            .map_err(|e| AgendaError::Store(e.to_string()))?;

        Ok(normalize_booked_intervals(rows))
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    #[instrument(skip(self))]
    async fn fetch_schedule(&self, doctor_id: &str) -> Result<ScheduleSnapshot, AgendaError> {
        let locations = self.fetch_locations(doctor_id).await?;
        let config = self.fetch_config(doctor_id).await?;

        Ok(ScheduleSnapshot {
            locations,
            week: config.week,
            settings: config.settings,
        })
    }

    #[instrument(skip(self, week))]
    async fn replace_schedule(&self, doctor_id: &str, week: &WeekSchedule) -> Result<(), AgendaError> {
        // Re-read so keys the agenda does not own survive the write.
        let config = self.fetch_config(doctor_id).await?;
        let body = json!({ "configuracoes": config.merged_with_week(week) });

        let path = format!("/rest/v1/medicos?user_id=eq.{}", filter_value(doctor_id));
        self.supabase
            .execute(Method::PATCH, &path, self.token(), Some(body))
            .await
            .map_err(|e| {
                error!("Failed to replace agenda for doctor {}: {}", doctor_id, e);
                AgendaError::Store(e.to_string())
            })?;

        debug!("Agenda replaced for doctor {} ({} active blocks)", doctor_id, week.active_block_count());
        Ok(())
    }
}
