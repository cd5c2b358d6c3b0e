use std::sync::Arc;

use rota_core::RotationEngine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RotationEngine>,
}

impl AppState {
    pub fn new(engine: Arc<RotationEngine>) -> Self {
        Self { engine }
    }
}
