use std::sync::Arc;
use std::time::Duration;

use crate::analysis::analyzer::Analyzer;
use crate::store::Store;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Persistence handle. `PgStore` in production.
    pub store: Arc<dyn Store>,
    /// Pluggable analyzer. Default: GeminiAnalyzer.
    pub analyzer: Arc<dyn Analyzer>,
    /// Upper bound on one analysis call, retries included.
    pub analysis_deadline: Duration,
}
