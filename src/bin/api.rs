use finops_agent_router::{
    api::{start_server, ApiState},
    build_components, AppConfig,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (respects RUST_LOG, defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);

    info!("🚀 FinOps Query Router - API Server");
    info!("📍 Address: {}", config.bind_address());

    let components = build_components(&config)?;

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    let state = ApiState {
        orchestrator: components.orchestrator,
        data: components.data,
        request_timeout: config.request_timeout,
    };
    start_server(state, &config.bind_address()).await?;

    Ok(())
}
