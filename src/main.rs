use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use site_inspection::cache::ReportCache;
use site_inspection::{
    web, Config, FallbackDispatcher, GeminiClient, InspectionService, ModelCandidates,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("site_inspection=info,tower_http=info")),
        )
        .init();

    let config = Config::parse();
    info!("Starting with {:?}", config);

    let client = GeminiClient::new(config.client_config())
        .context("failed to initialize the Gemini client")?;
    let candidates = ModelCandidates::default();
    info!(
        "Model fallback order: {}",
        candidates.iter().collect::<Vec<_>>().join(" -> ")
    );

    let service = InspectionService::new(
        FallbackDispatcher::new(Arc::new(client), candidates),
        ReportCache::new(config.cache_capacity),
    );
    let app = web::router(Arc::new(service));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!("🏗️ Civil Engineering Insight Studio running on http://{}", config.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
