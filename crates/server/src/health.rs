use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use storefront_core::config::AppConfig;

/// Configuration snapshot reported by `/health`. Never calls the backends.
#[derive(Clone, Debug)]
pub struct HealthState {
    service: String,
    model: String,
    tool_connector: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: String,
    pub model: String,
    pub tool_connector: String,
    pub checked_at: String,
}

impl HealthState {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            service: config.telemetry.service_name.clone(),
            model: config.llm.model.clone(),
            tool_connector: config.catalogue_url(),
        }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: state.service,
        model: state.model,
        tool_connector: state.tool_connector,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use storefront_core::config::AppConfig;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_configured_backends() {
        let config = AppConfig::default();

        let (status, Json(payload)) = health(State(HealthState::from_config(&config))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.service, "volcano-sandbox");
        assert_eq!(payload.model, "gpt-4o-mini");
        assert_eq!(payload.tool_connector, "http://localhost:8000/mcp/catalogue");
        assert!(!payload.checked_at.is_empty());
    }
}
