use axum::Router;
use storefront_agent::{Orchestrator, RuntimeError};
use storefront_core::config::{AppConfig, ConfigError, LoadOptions};
use thiserror::Error;
use tracing::info;

use crate::health::HealthState;
use crate::routes;

pub struct Application {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("agent runtime initialization failed: {0}")]
    Runtime(#[source] RuntimeError),
}

/// Loads and validates configuration. Runs before logging is installed, so failures
/// are only reported through the returned error.
pub fn load_config(options: LoadOptions) -> Result<AppConfig, BootstrapError> {
    AppConfig::load(options).map_err(BootstrapError::Config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        agent_name = %config.agent.name,
        "starting application bootstrap"
    );

    let orchestrator = Orchestrator::from_config(&config).map_err(BootstrapError::Runtime)?;
    info!(
        event_name = "system.bootstrap.agent_ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        llm_base_url = %config.llm_base_url(),
        tool_connector = %config.catalogue_url(),
        "agent orchestrator initialized"
    );

    Ok(Application { config, orchestrator })
}

impl Application {
    pub fn router(&self) -> Router {
        routes::app_router(self.orchestrator.clone(), HealthState::from_config(&self.config))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.config.server.bind_address, self.config.server.port)
    }
}
