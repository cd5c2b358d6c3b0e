//! `rota-server`: JSON control surface over a shared [`RotationEngine`].
//!
//! Every mutating route goes through the engine, so requests and scheduled
//! rotations are serialized by the engine's own lock.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;
use rota_core::RotationEngine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(engine: Arc<RotationEngine>) -> Router {
    let app_state = state::AppState::new(engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status
        .route("/api/status", get(routes::status::get_status))
        .route("/api/events", get(routes::events::sse_events))
        // Rotation
        .route("/api/reload", post(routes::rotation::reload))
        .route("/api/rotate", post(routes::rotation::rotate))
        .route("/api/clear", post(routes::rotation::clear))
        .route("/api/refresh", post(routes::rotation::refresh))
        .route("/api/index", put(routes::rotation::set_index))
        .route("/api/schedule", put(routes::rotation::set_schedule))
        // Roster
        .route("/api/members", post(routes::members::add_member))
        .route("/api/members/{id}", delete(routes::members::remove_member))
        .route(
            "/api/members/{id}/position",
            put(routes::members::move_member),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve the API on a pre-bound listener until `shutdown` resolves.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// first (useful when binding port 0).
pub async fn serve_on<F>(
    listener: tokio::net::TcpListener,
    engine: Arc<RotationEngine>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let actual_port = listener.local_addr()?.port();
    let app = build_router(engine);

    tracing::info!("rota server listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
