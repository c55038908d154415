use finbrief::{
    agent::Orchestrator, api::start_server, config::Settings, state::build_checkpoint_store,
    tools::create_default_collaborators,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;

    if settings.gemini_api_key.is_empty() {
        warn!("⚠️  GEMINI_API_KEY not set, generated answers will report errors");
        warn!("📌 See .env.example for setup instructions");
    }

    info!("🚀 FinBrief - API Server");
    info!("📍 Port: {}", settings.api_port);

    let collaborators = create_default_collaborators(&settings);
    let store = build_checkpoint_store(settings.database_url.as_deref());
    let orchestrator = Arc::new(Orchestrator::with_defaults(collaborators, store));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, settings.api_port).await?;

    Ok(())
}
