use std::sync::Arc;
use std::time::Duration;

use storefront_core::config::TelemetryConfig;
use tracing::{info, info_span, Span};

/// Read-only telemetry handle shared by every runtime session.
///
/// Emission goes through `tracing`, so it can never fail a request; exporting spans and
/// metric events to a collector is the subscriber's concern.
#[derive(Clone, Debug)]
pub struct Telemetry {
    service_name: Arc<str>,
    traces: bool,
    metrics: bool,
}

impl Telemetry {
    pub fn new(service_name: impl Into<Arc<str>>, traces: bool, metrics: bool) -> Self {
        Self { service_name: service_name.into(), traces, metrics }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(config.service_name.as_str(), config.traces, config.metrics)
    }

    pub fn disabled() -> Self {
        Self::new("disabled", false, false)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn invocation_span(&self, agent_name: &str, model: &str) -> Span {
        if !self.traces {
            return Span::none();
        }
        info_span!(
            "agent.invoke",
            service_name = %self.service_name,
            agent_name = %agent_name,
            model = %model,
        )
    }

    pub fn record_invocation(
        &self,
        agent_name: &str,
        outcome: &'static str,
        steps: usize,
        elapsed: Duration,
    ) {
        if !self.metrics {
            return;
        }
        info!(
            event_name = "metric.agent.invocation",
            service_name = %self.service_name,
            agent_name = %agent_name,
            outcome,
            steps,
            duration_ms = elapsed.as_millis() as u64,
            "agent invocation finished"
        );
    }

    pub fn record_tool_call(&self, connector: &str, tool: &str, is_error: bool, elapsed: Duration) {
        if !self.metrics {
            return;
        }
        info!(
            event_name = "metric.agent.tool_call",
            service_name = %self.service_name,
            connector = %connector,
            tool = %tool,
            is_error,
            duration_ms = elapsed.as_millis() as u64,
            "tool call finished"
        );
    }
}
