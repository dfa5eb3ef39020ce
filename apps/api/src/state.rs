use crate::config::Config;
use crate::extraction::CvAnalyzer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Fully wired pipeline: both recognition backends, poller, optional enricher.
    pub analyzer: CvAnalyzer,
    pub config: Config,
}
