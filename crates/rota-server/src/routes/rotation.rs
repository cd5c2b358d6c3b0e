use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// POST /api/reload: re-read the rotation file and re-resolve everything.
pub async fn reload(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let state = app.engine.load().await?;
    Ok(Json(serde_json::json!({
        "state": state,
        "summary": state.to_string(),
    })))
}

/// POST /api/rotate: hand the role to the next participant.
pub async fn rotate(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let outcome = app.engine.rotate().await?;
    Ok(Json(serde_json::to_value(outcome)?))
}

/// POST /api/clear: revoke the role from every roster participant.
pub async fn clear(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let failures = app.engine.clear_role().await?;
    Ok(Json(serde_json::json!({ "revoke_failures": failures })))
}

/// POST /api/refresh: re-resolve roster participants.
pub async fn refresh(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let unresolved = app.engine.refresh_members().await?;
    Ok(Json(serde_json::json!({
        "unresolved": unresolved,
        "state": app.engine.state(),
    })))
}

#[derive(Debug, Deserialize)]
pub struct IndexBody {
    pub index: usize,
    #[serde(default)]
    pub force: bool,
}

/// PUT /api/index: jump the duty to a roster position.
pub async fn set_index(
    State(app): State<AppState>,
    Json(body): Json<IndexBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let update = app.engine.set_index(body.index, body.force).await?;
    Ok(Json(serde_json::to_value(update)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleBody {
    pub day: Option<u8>,
    pub hour: Option<u8>,
    pub minute: Option<u8>,
}

/// PUT /api/schedule: change any of day, hour and minute.
pub async fn set_schedule(
    State(app): State<AppState>,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let schedule = app
        .engine
        .set_schedule(body.day, body.hour, body.minute)
        .await?;
    Ok(Json(serde_json::json!({
        "schedule": schedule,
        "summary": schedule.to_string(),
        "next_rotation": app.engine.status().next_rotation,
    })))
}
