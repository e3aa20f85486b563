//! Watchlist commands
//!
//! Owner commands for the watched set. Each accepts either a bare app id or
//! a full join URL.

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppJsonResult},
    model::app_status::AppStatusCtrl,
    testflight,
    ServerState,
};

#[derive(Debug, Deserialize)]
pub struct WatchRequest {
    pub app: String,
}

pub async fn add(
    State(state): State<ServerState>,
    Json(req): Json<WatchRequest>,
) -> AppJsonResult<serde_json::Value> {
    let app_id = testflight::parse_app_ref(&req.app)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if state.settings.is_watched(&app_id) {
        return Err(AppError::Conflict("App already being watched".to_string()));
    }

    // One validation fetch before the id is accepted; it also seeds the
    // stored status so the first poll of this app can detect a flip.
    let info = state.tf_client.fetch_status(&app_id).await.map_err(|e| {
        tracing::warn!("Validation fetch for app {} failed: {}", app_id, e);
        AppError::NotFound("App not found".to_string())
    })?;
    AppStatusCtrl::upsert(&state.conn, &app_id, info.is_full).await?;
    state.settings.add_watched(&app_id)?;

    Ok(Json(json!({
        "message": format!("Watching {}", info.name),
        "app_id": app_id,
        "name": info.name,
        "is_full": info.is_full
    })))
}

pub async fn remove(
    State(state): State<ServerState>,
    Json(req): Json<WatchRequest>,
) -> AppJsonResult<serde_json::Value> {
    let app_id = testflight::parse_app_ref(&req.app)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    if !state.settings.remove_watched(&app_id)? {
        return Err(AppError::NotFound("App not being watched".to_string()));
    }

    Ok(Json(json!({
        "message": "No longer watching app",
        "app_id": app_id
    })))
}

/// Best-effort live listing: apps whose fetch fails are skipped, everything
/// fetched is recorded.
pub async fn list(State(state): State<ServerState>) -> AppJsonResult<serde_json::Value> {
    let mut apps = Vec::new();
    for app_id in state.settings.watched_apps() {
        match state.tf_client.fetch_status(&app_id).await {
            Ok(info) => {
                AppStatusCtrl::upsert(&state.conn, &app_id, info.is_full).await?;
                apps.push(json!({
                    "app_id": info.app_id,
                    "name": info.name,
                    "is_full": info.is_full
                }));
            }
            Err(e) => {
                tracing::debug!("Skipping app {} in listing: {}", app_id, e);
            }
        }
    }

    Ok(Json(json!({ "apps": apps })))
}
