use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/click", post(handlers::click))
        .route("/api/config", get(handlers::get_config))
        .route("/api/activities", get(handlers::get_activities))
        .route("/api/activities/toggle", post(handlers::toggle_activity))
        .route("/api/activities/select", post(handlers::select_option))
        .with_state(state)
}
