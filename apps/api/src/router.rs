use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use agenda_cell::handlers::AgendaState;
use agenda_cell::router::agenda_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Doctor Agenda API is running!" }))
        .nest("/doctors", agenda_routes(AgendaState::new(state)))
}
