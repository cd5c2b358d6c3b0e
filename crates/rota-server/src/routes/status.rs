use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/status: engine snapshot plus a human-readable summary.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let status = app.engine.status();
    let summary = status.to_string();
    let mut body = serde_json::to_value(status)?;
    body["summary"] = serde_json::Value::String(summary);
    Ok(Json(body))
}
