//! FinOps Query Router
//!
//! Routes a natural-language financial question to one or more specialist
//! responders (fraud detection, compliance, risk analysis), runs them
//! concurrently under a single scoped credential lease, and merges their
//! answers into one report.
//!
//! FLOW:
//! VALIDATE → CLASSIFY → ACQUIRE → FAN OUT → RELEASE → AGGREGATE

pub mod agent;
pub mod api;
pub mod classifier;
pub mod config;
pub mod credentials;
pub mod data;
pub mod error;
pub mod models;
pub mod responder;

use std::sync::Arc;
use tracing::info;

pub use error::Result;

// Re-export common types
pub use agent::Orchestrator;
pub use classifier::QueryClassifier;
pub use config::AppConfig;
pub use models::*;

use config::{CredentialMode, MarketDataMode, ResponderMode};
use credentials::{CommandCredentialProvider, CredentialProvider, CredentialScope, StaticCredentialProvider};
use data::{DataSource, MarketDataService, StaticDataSource};
use responder::{DemoResponder, HttpResponder, RemoteResponder, ResponderAdapter};

/// Wired components shared by the server and the CLI.
pub struct Components {
    pub orchestrator: Arc<Orchestrator>,
    pub data: Arc<dyn DataSource>,
}

/// Build every collaborator from configuration.
pub fn build_components(config: &AppConfig) -> Result<Components> {
    let data: Arc<dyn DataSource> = match config.market_data.mode {
        MarketDataMode::Live => Arc::new(MarketDataService::new(&config.market_data.base_url)?),
        MarketDataMode::Offline => Arc::new(StaticDataSource::new()),
    };

    let remote: Arc<dyn RemoteResponder> = match config.responders.mode {
        ResponderMode::Demo => Arc::new(DemoResponder::new(config.responders.fraud_threshold)),
        ResponderMode::Http => Arc::new(HttpResponder::new(config.responders.timeout)?),
    };

    let provider: Arc<dyn CredentialProvider> = match config.credentials.mode {
        CredentialMode::Static => Arc::new(StaticCredentialProvider::new()),
        CredentialMode::Command => Arc::new(CommandCredentialProvider::new(
            config.credentials.command.clone(),
            config.credentials.command_timeout,
        )),
    };

    info!(
        responders = ?config.responders.mode,
        credentials = ?config.credentials.mode,
        market_data = ?config.market_data.mode,
        fallback = %config.routing.fallback,
        "Components configured"
    );

    let adapter = ResponderAdapter::new(config.responders.clone(), Arc::clone(&data), remote);
    let orchestrator = Orchestrator::new(
        QueryClassifier::new(config.routing.clone()),
        CredentialScope::new(
            provider,
            config.credentials.profile.clone(),
            config.credentials.tenant.clone(),
        ),
        Arc::new(adapter),
    );

    Ok(Components {
        orchestrator: Arc::new(orchestrator),
        data,
    })
}
