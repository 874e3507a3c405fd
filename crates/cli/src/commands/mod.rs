pub mod ask;
pub mod config;
pub mod doctor;

use serde::Serialize;
use storefront_core::FailureKind;

/// Rendered command output plus the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Failure classes reported in the JSON envelope; each maps to a fixed exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    ConfigValidation,
    AgentInit,
    RuntimeInit,
    InvalidInput,
    ToolConnectivity,
    Unexpected,
}

impl ErrorClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::AgentInit | Self::RuntimeInit => 3,
            Self::InvalidInput => 4,
            Self::ToolConnectivity | Self::Unexpected => 5,
        }
    }
}

impl From<FailureKind> for ErrorClass {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::ToolConnectivityFailure => Self::ToolConnectivity,
            FailureKind::UnexpectedFailure => Self::Unexpected,
        }
    }
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<ErrorClass>,
    message: &'a str,
}

impl CommandResult {
    pub fn success(command: &str, message: &str) -> Self {
        let envelope = Envelope { command, status: "ok", error_class: None, message };
        Self { exit_code: 0, output: render(&envelope) }
    }

    pub fn failure(command: &str, error_class: ErrorClass, message: &str) -> Self {
        let envelope =
            Envelope { command, status: "error", error_class: Some(error_class), message };
        Self { exit_code: error_class.exit_code(), output: render(&envelope) }
    }
}

fn render(envelope: &Envelope<'_>) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|error| {
        serde_json::json!({
            "command": envelope.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use storefront_core::FailureKind;

    use super::{CommandResult, ErrorClass};

    #[test]
    fn failure_envelope_carries_class_and_exit_code() {
        let result = CommandResult::failure("ask", ErrorClass::InvalidInput, "prompt \"\" is empty");
        assert_eq!(result.exit_code, 4);

        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_input");
        assert_eq!(payload["message"], "prompt \"\" is empty");
    }

    #[test]
    fn success_envelope_omits_error_class() {
        let result = CommandResult::success("ask", "We sell chips.");
        assert_eq!(result.exit_code, 0);

        let payload: Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["status"], "ok");
        assert!(payload.get("error_class").is_none());
    }

    #[test]
    fn classified_agent_failures_share_one_exit_code() {
        let connectivity = ErrorClass::from(FailureKind::ToolConnectivityFailure);
        let unexpected = ErrorClass::from(FailureKind::UnexpectedFailure);

        assert_eq!(connectivity, ErrorClass::ToolConnectivity);
        assert_eq!(unexpected, ErrorClass::Unexpected);
        assert_eq!(connectivity.exit_code(), unexpected.exit_code());
        assert_ne!(ErrorClass::ConfigValidation.exit_code(), ErrorClass::InvalidInput.exit_code());
    }
}
