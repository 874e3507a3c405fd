use thiserror::Error;

/// Failures surfaced while running an agent invocation.
///
/// Only `ToolConnection` is treated as an operational condition; everything else is
/// reported to clients as an unexpected failure.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("tool connector `{connector}` is unreachable: {reason}")]
    ToolConnection { connector: String, reason: String },
    #[error("tool `{tool}` call failed: {reason}")]
    ToolCall { tool: String, reason: String },
    #[error("llm backend request failed: {0}")]
    LlmTransport(String),
    #[error("llm backend returned status {status}: {body}")]
    LlmStatus { status: u16, body: String },
    #[error("malformed runtime response: {0}")]
    MalformedResponse(String),
    #[error("http client initialization failed: {0}")]
    ClientInit(String),
}

impl RuntimeError {
    pub fn tool_connection(connector: impl Into<String>, reason: impl ToString) -> Self {
        Self::ToolConnection { connector: connector.into(), reason: reason.to_string() }
    }
}
