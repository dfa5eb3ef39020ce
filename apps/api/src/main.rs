mod config;
mod enrichment;
mod errors;
mod extraction;
mod models;
mod recognition;
mod routes;
mod service_client;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::enrichment::{LanguageServiceClient, SemanticEnricher};
use crate::extraction::CvAnalyzer;
use crate::recognition::{JobPoller, LayoutBackend, VisionReadBackend};
use crate::routes::build_router;
use crate::service_client::ServiceClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cvscan v{}", env!("CARGO_PKG_VERSION"));

    // Recognition backends, one authenticated client each
    let vision = VisionReadBackend::new(
        ServiceClient::new(config.vision_key.clone(), config.http_max_retries)?,
        config.vision_endpoint.clone(),
    );
    let layout = LayoutBackend::new(
        ServiceClient::new(config.layout_key.clone(), config.http_max_retries)?,
        config.layout_endpoint.clone(),
    );
    info!(
        "Recognition backends initialized (poll every {:?}, at most {} polls)",
        config.poll_policy.interval, config.poll_policy.max_attempts
    );

    // Semantic enrichment is optional
    let enricher = match config.language_service() {
        Some((endpoint, key)) => {
            let client = ServiceClient::new(key.to_string(), config.http_max_retries)?;
            let language = LanguageServiceClient::new(client, endpoint);
            info!("Semantic enrichment enabled ({endpoint})");
            Some(SemanticEnricher::new(
                Arc::new(language),
                config.enrichment_timeout,
            ))
        }
        None => {
            warn!("LANGUAGE_ENDPOINT/LANGUAGE_KEY not set; semantic enrichment disabled");
            None
        }
    };

    let analyzer = CvAnalyzer::new(
        Arc::new(vision),
        Arc::new(layout),
        JobPoller::new(config.poll_policy),
        enricher,
        config.analysis_timeout,
    );

    // Build app state
    let state = AppState {
        analyzer,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
