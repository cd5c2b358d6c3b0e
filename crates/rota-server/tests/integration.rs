use std::sync::Arc;

use axum::http::StatusCode;
use http_body_util::BodyExt;
use rota_core::adapter::memory::{AdapterCall, MemoryRoleAdapter};
use rota_core::{ConfigStore, ParticipantId, RotationConfig, RotationEngine, Schedule};
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const ROLE: &str = "900";

fn adapter() -> Arc<MemoryRoleAdapter> {
    Arc::new(
        MemoryRoleAdapter::new()
            .with_role(ROLE, "On Call")
            .with_participant("11", "Alice")
            .with_participant("12", "Bob")
            .with_participant("13", "Carol")
            .with_participant("14", "Dave"),
    )
}

/// Write a rotation file inside the given temp directory.
fn write_config(dir: &TempDir, roster: &[&str], index: usize) -> ConfigStore {
    let store = ConfigStore::at_root(dir.path());
    store
        .save(&RotationConfig {
            role_id: ROLE.into(),
            roster: roster.iter().map(|id| ParticipantId::from(*id)).collect(),
            index,
            schedule: Schedule::new(1, 9, 0).unwrap(),
        })
        .unwrap();
    store
}

async fn loaded_app(
    dir: &TempDir,
    roster: &[&str],
    index: usize,
) -> (axum::Router, Arc<RotationEngine>, Arc<MemoryRoleAdapter>) {
    let store = write_config(dir, roster, index);
    let adapter = adapter();
    let engine = RotationEngine::new(store, adapter.clone());
    engine.load().await.unwrap();
    (rota_server::build_router(engine.clone()), engine, adapter)
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "GET", uri, None).await
}

async fn post(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    send(app, "POST", uri, None).await
}

fn stored_roster(engine: &RotationEngine) -> Vec<String> {
    engine
        .store()
        .load()
        .unwrap()
        .roster
        .iter()
        .map(|p| p.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_before_load_is_unloaded() {
    let dir = TempDir::new().unwrap();
    let engine = RotationEngine::new(ConfigStore::at_root(dir.path()), adapter());
    let app = rota_server::build_router(engine);

    let (status, json) = get(app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["state"], "unloaded");
    assert!(json["summary"].as_str().unwrap().contains("unloaded"));
}

#[tokio::test]
async fn status_reports_on_duty_and_roster() {
    let dir = TempDir::new().unwrap();
    let (app, _, _) = loaded_app(&dir, &["11", "12", "13"], 1).await;

    let (status, json) = get(app, "/api/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"]["state"], "configured");
    assert_eq!(json["index"], 1);
    assert_eq!(json["on_duty"]["display_name"], "Bob");
    assert_eq!(json["role"]["name"], "On Call");
    assert_eq!(json["roster"].as_array().unwrap().len(), 3);
    assert!(json["next_rotation"].is_string());
}

#[tokio::test]
async fn reload_with_missing_file_writes_default_and_404s() {
    let dir = TempDir::new().unwrap();
    let engine = RotationEngine::new(ConfigStore::at_root(dir.path()), adapter());
    let app = rota_server::build_router(engine.clone());

    let (status, json) = post(app, "/api/reload").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("role_id"));
    assert!(engine.store().exists());
}

#[tokio::test]
async fn rotate_hands_role_to_next_participant() {
    let dir = TempDir::new().unwrap();
    let (app, engine, adapter) = loaded_app(&dir, &["11", "12", "13"], 0).await;
    adapter.set_holding(&ROLE.into(), &"11".into());
    adapter.clear_calls();

    let (status, json) = post(app, "/api/rotate").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["previous_index"], 0);
    assert_eq!(json["index"], 1);
    assert_eq!(json["on_duty"], "12");
    assert_eq!(
        adapter.calls(),
        vec![
            AdapterCall::Revoke("11".into()),
            AdapterCall::Grant("12".into())
        ]
    );
    assert_eq!(engine.store().load().unwrap().index, 1);
}

#[tokio::test]
async fn rotate_before_load_conflicts() {
    let dir = TempDir::new().unwrap();
    let engine = RotationEngine::new(ConfigStore::at_root(dir.path()), adapter());
    let app = rota_server::build_router(engine);

    let (status, json) = post(app, "/api/rotate").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("not configured"));
}

#[tokio::test]
async fn clear_revokes_every_holder() {
    let dir = TempDir::new().unwrap();
    let (app, engine, adapter) = loaded_app(&dir, &["11", "12"], 0).await;
    adapter.set_holding(&ROLE.into(), &"11".into());
    adapter.set_holding(&ROLE.into(), &"12".into());

    let (status, json) = post(app, "/api/clear").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["revoke_failures"].as_array().unwrap().len(), 0);
    assert!(adapter.holders(&ROLE.into()).is_empty());
    assert_eq!(engine.status().index, Some(0));
}

#[tokio::test]
async fn add_member_inserts_and_rejects_duplicates() {
    let dir = TempDir::new().unwrap();
    let (app, engine, _) = loaded_app(&dir, &["11", "12"], 0).await;

    let (status, json) = send(
        app.clone(),
        "POST",
        "/api/members",
        Some(serde_json::json!({ "id": 13, "position": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["position"], 1);
    assert_eq!(stored_roster(&engine), vec!["11", "13", "12"]);

    let (status, _) = send(
        app,
        "POST",
        "/api/members",
        Some(serde_json::json!({ "id": "13" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn add_unknown_member_is_404() {
    let dir = TempDir::new().unwrap();
    let (app, engine, _) = loaded_app(&dir, &["11"], 0).await;

    let (status, _) = send(
        app,
        "POST",
        "/api/members",
        Some(serde_json::json!({ "id": "99" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stored_roster(&engine), vec!["11"]);
}

#[tokio::test]
async fn remove_member_guards_on_duty() {
    let dir = TempDir::new().unwrap();
    let (app, engine, _) = loaded_app(&dir, &["11", "12", "13"], 1).await;

    let (status, _) = send(app.clone(), "DELETE", "/api/members/12", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, json) = send(app.clone(), "DELETE", "/api/members/11", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], "11");
    assert_eq!(engine.status().index, Some(0));

    let (status, _) = send(app, "DELETE", "/api/members/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn move_member_keeps_on_duty_identity() {
    let dir = TempDir::new().unwrap();
    let (app, engine, _) = loaded_app(&dir, &["11", "12", "13", "14"], 1).await;

    let (status, json) = send(
        app,
        "PUT",
        "/api/members/12/position",
        Some(serde_json::json!({ "position": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["index"], 3);
    assert_eq!(stored_roster(&engine), vec!["11", "13", "14", "12"]);
    assert_eq!(engine.current_holder().unwrap().display_name, "Bob");
}

#[tokio::test]
async fn set_index_assigns_and_force_only_writes() {
    let dir = TempDir::new().unwrap();
    let (app, engine, adapter) = loaded_app(&dir, &["11", "12", "13"], 0).await;

    let (status, json) = send(
        app.clone(),
        "PUT",
        "/api/index",
        Some(serde_json::json!({ "index": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "assigned");
    assert_eq!(json["on_duty"], "13");
    assert_eq!(adapter.holders(&ROLE.into()), vec![ParticipantId::from("13")]);

    adapter.clear_calls();
    let (status, json) = send(
        app.clone(),
        "PUT",
        "/api/index",
        Some(serde_json::json!({ "index": 1, "force": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "forced");
    assert!(adapter.calls().is_empty());
    assert_eq!(engine.store().load().unwrap().index, 1);
    assert_eq!(engine.status().index, Some(2));

    let (status, _) = send(
        app,
        "PUT",
        "/api/index",
        Some(serde_json::json!({ "index": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn set_schedule_merges_fields() {
    let dir = TempDir::new().unwrap();
    let (app, engine, _) = loaded_app(&dir, &["11"], 0).await;

    let (status, json) = send(
        app.clone(),
        "PUT",
        "/api/schedule",
        Some(serde_json::json!({ "hour": 17 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"], "Monday 17:00");
    assert_eq!(engine.store().load().unwrap().schedule.hour, 17);

    let (status, _) = send(
        app,
        "PUT",
        "/api/schedule",
        Some(serde_json::json!({ "minute": 75 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn refresh_reports_departed_members() {
    let dir = TempDir::new().unwrap();
    let (app, _, adapter) = loaded_app(&dir, &["11", "12"], 0).await;
    adapter.remove_participant(&"12".into());

    let (status, json) = post(app, "/api/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["unresolved"], serde_json::json!(["12"]));
    assert_eq!(json["state"]["state"], "invalid");
}
