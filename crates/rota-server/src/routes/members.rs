use axum::extract::{Path, State};
use axum::Json;
use rota_core::ParticipantId;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddMemberBody {
    pub id: ParticipantId,
    pub position: Option<usize>,
}

/// POST /api/members: insert a participant, at the end unless a position is given.
pub async fn add_member(
    State(app): State<AppState>,
    Json(body): Json<AddMemberBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let position = app
        .engine
        .add_member(body.id.clone(), body.position)
        .await?;
    Ok(Json(serde_json::json!({
        "id": body.id,
        "position": position,
    })))
}

/// DELETE /api/members/{id}: remove a participant who is not on duty.
pub async fn remove_member(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = app.engine.remove_member(&ParticipantId::new(id)).await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[derive(Debug, Deserialize)]
pub struct MoveMemberBody {
    pub position: usize,
}

/// PUT /api/members/{id}/position: move a participant within the roster.
pub async fn move_member(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MoveMemberBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = ParticipantId::new(id);
    app.engine.move_member(&id, body.position).await?;
    Ok(Json(serde_json::json!({
        "id": id,
        "position": body.position,
        "index": app.engine.status().index,
    })))
}
