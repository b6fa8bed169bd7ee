use axum::{extract::State, routing::get, Json, Router};

use crate::models::HealthResponse;

#[derive(Clone)]
pub struct HealthState {
    pub renderer_available: bool,
    pub telegram_enabled: bool,
}

pub fn router(renderer_available: bool, telegram_enabled: bool) -> Router {
    let state = HealthState {
        renderer_available,
        telegram_enabled,
    };
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

/// Health check dell'API
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "API funzionante", body = HealthResponse),
    ),
    tag = "Sistema"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        renderer_available: state.renderer_available,
        telegram_enabled: state.telegram_enabled,
    })
}
