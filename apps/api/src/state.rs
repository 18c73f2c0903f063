use std::sync::Arc;

use crate::config::Config;
use crate::matching::store::MatchStore;
use crate::matching::triggers::MatchTriggers;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Postgres in production; the read views query it directly.
    pub store: Arc<dyn MatchStore>,
    /// Event policy plus the executor deferred recomputes run on.
    pub triggers: MatchTriggers,
    pub config: Config,
}
