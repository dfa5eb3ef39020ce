//! Semantic enrichment: advisory language, key-phrase and entity analysis.
//!
//! Nothing in here can fail an analysis. Each of the three sub-analyses runs
//! independently; whichever one errors or times out is simply left out of the
//! `SemanticProfile`, and field extraction falls back to its regex rules.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Entity, SemanticProfile};
use crate::service_client::ServiceError;

pub mod language;

pub use language::LanguageServiceClient;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("Semantic analysis unavailable: {0}")]
    Unavailable(String),
}

impl From<ServiceError> for EnrichmentError {
    fn from(err: ServiceError) -> Self {
        EnrichmentError::Unavailable(err.to_string())
    }
}

/// The external semantic-analysis service. Stateless and idempotent per call.
#[async_trait]
pub trait SemanticAnalyzer: Send + Sync {
    async fn detect_language(&self, text: &str) -> Result<String, EnrichmentError>;

    async fn key_phrases(&self, text: &str) -> Result<Vec<String>, EnrichmentError>;

    async fn entities(&self, text: &str) -> Result<Vec<Entity>, EnrichmentError>;
}

#[derive(Clone)]
pub struct SemanticEnricher {
    analyzer: Arc<dyn SemanticAnalyzer>,
    call_timeout: Duration,
}

impl SemanticEnricher {
    pub fn new(analyzer: Arc<dyn SemanticAnalyzer>, call_timeout: Duration) -> Self {
        Self {
            analyzer,
            call_timeout,
        }
    }

    /// Runs the three analyses concurrently. Returns `None` for empty text or
    /// when every analysis was unavailable.
    pub async fn enrich(&self, text: &str) -> Option<SemanticProfile> {
        if text.trim().is_empty() {
            debug!("Skipping enrichment: no text");
            return None;
        }

        let (language, key_phrases, entities) = tokio::join!(
            self.bounded("language detection", self.analyzer.detect_language(text)),
            self.bounded("key phrase extraction", self.analyzer.key_phrases(text)),
            self.bounded("entity recognition", self.analyzer.entities(text)),
        );

        let profile = SemanticProfile {
            language,
            key_phrases,
            entities,
        };

        if profile.is_empty() {
            warn!("Enrichment unavailable; continuing with regex-only extraction");
            return None;
        }

        debug!(
            "Enrichment: language={:?}, {} key phrases, {} entities",
            profile.language,
            profile.key_phrases().len(),
            profile.entities().len()
        );
        Some(profile)
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl std::future::Future<Output = Result<T, EnrichmentError>>,
    ) -> Option<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!("{what} skipped: {e}");
                None
            }
            Err(_) => {
                warn!("{what} skipped: no answer within {:?}", self.call_timeout);
                None
            }
        }
    }
}
