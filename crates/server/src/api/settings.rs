//! # Config API
//!
//! Read the effective settings and patch the persisted configuration.
//! Patched values take effect on the next start.

use axum::{extract::State, http::StatusCode, Json};

use super::agents::ApiError;
use super::AppState;
use crate::config::{PersistedConfig, Settings};

/// Effective settings of the running server
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Effective settings", body = Settings)
    )
)]
pub async fn get_config(State(state): State<AppState>) -> Json<Settings> {
    Json(state.settings.as_ref().clone())
}

/// Merge a partial configuration into `.waypoint/config.json`
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = PersistedConfig,
    responses(
        (status = 200, description = "Persisted configuration after the merge", body = PersistedConfig),
        (status = 400, description = "Configuration would not resolve", body = ApiError),
        (status = 500, description = "Configuration could not be written", body = ApiError)
    )
)]
pub async fn update_config(
    Json(updates): Json<PersistedConfig>,
) -> Result<Json<PersistedConfig>, (StatusCode, Json<ApiError>)> {
    let mut config = PersistedConfig::load().await;
    config.merge(updates);

    if let Err(e) = Settings::resolve(config.clone()) {
        return Err(ApiError::response(StatusCode::BAD_REQUEST, format!("{:#}", e)));
    }
    if let Err(e) = config.save().await {
        tracing::error!("Failed to save config: {:#}", e);
        return Err(ApiError::response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{:#}", e),
        ));
    }
    Ok(Json(config))
}
