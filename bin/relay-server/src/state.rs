//! Shared application state injected into every Axum handler.

use std::sync::Arc;
use std::time::Instant;

use relay_core::{Gateway, StagingArea};

use crate::config::Config;

/// Immutable state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Provider client plus upload strategy.
    pub gateway: Gateway,
    /// Where in-flight uploads are written.
    pub staging: StagingArea,
    /// Process start, for the health endpoint's uptime.
    pub started_at: Instant,
}
