//! Settings commands

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppJsonResult},
    ServerState,
};

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub channel_id: u64,
}

/// Point notifications at a Discord channel. The channel is resolved through
/// the API first so a typo'd id fails here instead of silently dropping
/// notifications later.
pub async fn set_channel(
    State(state): State<ServerState>,
    Json(req): Json<ChannelRequest>,
) -> AppJsonResult<serde_json::Value> {
    let channel = state.discord.get_channel(req.channel_id).await.map_err(|e| {
        tracing::warn!("Channel {} could not be resolved: {}", req.channel_id, e);
        AppError::BadRequest("Channel not found".to_string())
    })?;
    state.settings.set_notification_channel_id(req.channel_id)?;

    let display = channel.name.unwrap_or_else(|| req.channel_id.to_string());
    Ok(Json(json!({
        "message": format!("Notification channel set to {display}"),
        "channel_id": req.channel_id
    })))
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub hours: f64,
}

/// Change the polling period. Applies to future ticks only; a cycle already
/// in flight finishes at its own pace.
pub async fn set_interval(
    State(state): State<ServerState>,
    Json(req): Json<IntervalRequest>,
) -> AppJsonResult<serde_json::Value> {
    if !req.hours.is_finite() || req.hours <= 0.0 {
        return Err(AppError::BadRequest(
            "Interval must be a positive number of hours".to_string(),
        ));
    }
    state.settings.set_check_interval(req.hours)?;

    Ok(Json(json!({
        "message": format!("Check interval set to {} hours", req.hours)
    })))
}
