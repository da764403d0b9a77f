//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use cadence_core::Orchestrator;

use crate::config::Config;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Job orchestrator; owns the process-wide job registry.
    pub jobs: Orchestrator,
}
