use storefront_core::FailureKind;
use tracing::{error, warn};

use crate::error::RuntimeError;

/// Maps a runtime failure onto the closed `FailureKind` set and logs the cause.
///
/// Detail stays in the log; callers only ever see the kind.
pub fn classify(failure: &RuntimeError) -> FailureKind {
    match failure {
        RuntimeError::ToolConnection { connector, reason } => {
            warn!(
                event_name = "agent.failure.tool_connectivity",
                connector = %connector,
                reason = %reason,
                "tool connector unreachable"
            );
            FailureKind::ToolConnectivityFailure
        }
        other => {
            error!(
                event_name = "agent.failure.unexpected",
                error = %other,
                "agent invocation failed"
            );
            FailureKind::UnexpectedFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use storefront_core::FailureKind;

    use super::classify;
    use crate::error::RuntimeError;

    #[test]
    fn unreachable_connector_is_a_connectivity_failure() {
        let failure = RuntimeError::tool_connection("catalogue", "connection refused");

        assert_eq!(classify(&failure), FailureKind::ToolConnectivityFailure);
    }

    #[test]
    fn everything_else_is_unexpected() {
        let failures = [
            RuntimeError::ToolCall { tool: "search".to_string(), reason: "bad args".to_string() },
            RuntimeError::LlmTransport("timed out".to_string()),
            RuntimeError::LlmStatus { status: 401, body: "invalid key".to_string() },
            RuntimeError::MalformedResponse("no choices".to_string()),
            RuntimeError::ClientInit("tls".to_string()),
        ];

        for failure in &failures {
            assert_eq!(classify(failure), FailureKind::UnexpectedFailure, "{failure}");
        }
    }
}
