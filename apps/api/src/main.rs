mod config;
mod errors;
mod extraction;
mod generation;
mod llm_client;
mod models;
mod routes;
mod settings;
mod state;
mod transport;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::extraction::field_extractor::FieldExtractor;
use crate::extraction::loader::redirect_policy;
use crate::generation::service::GenerationService;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::settings::store::JsonFileSettings;
use crate::state::AppState;

const PAGE_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparsable env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Outreacher API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    if config.google_api_key.is_empty() {
        warn!("GOOGLE_API_KEY is not set; every generation will use the fallback message");
    }
    let mut llm = LlmClient::new(config.google_api_key.clone())?;
    if let Some(base) = &config.gemini_api_base {
        info!("Using upstream API root {base}");
        llm = llm.with_base_url(base.as_str());
    }
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let generation = GenerationService::new(Arc::new(llm), config.idle_timeout());
    info!(
        "Generation idle timeout: {}s",
        config.generation_idle_timeout_secs
    );

    let retry = config.retry_policy();
    info!(
        "Extraction retry policy: {} retries, {:?} apart",
        retry.max_attempts, retry.delay
    );

    // Page fetches for extraction requests without inline markup
    let http = reqwest::Client::builder()
        .timeout(PAGE_FETCH_TIMEOUT)
        .redirect(redirect_policy())
        .build()?;

    let settings = JsonFileSettings::new(config.settings_path.clone());
    info!("Settings stored at {}", settings.path().display());

    // Build app state
    let state = AppState {
        config: config.clone(),
        generation,
        extractor: Arc::new(FieldExtractor::default()),
        http,
        settings: Arc::new(settings),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // browser extension origins vary per install

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
