use thiserror::Error;

use crate::conversation::InputError;

/// Closed classification of everything that can go wrong during an agent invocation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FailureKind {
    #[error("tool connector is unreachable")]
    ToolConnectivityFailure,
    #[error("unexpected agent failure")]
    UnexpectedFailure,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable")]
    ServiceUnavailable { correlation_id: String },
    #[error("internal error")]
    Internal { correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: "unassigned".to_owned() }
    }

    /// Client-facing text. Only validation failures carry request-specific detail.
    pub fn user_message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } => message,
            Self::ServiceUnavailable { .. } => {
                "MCP server is unavailable. Please check Kong Gateway is running."
            }
            Self::Internal { .. } => "Unexpected error occured.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id }
            | Self::Internal { correlation_id } => correlation_id,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        match &mut self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id }
            | Self::Internal { correlation_id } => *correlation_id = id.into(),
        }
        self
    }
}

impl FailureKind {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        InterfaceError::from(self).with_correlation_id(correlation_id)
    }
}

impl From<FailureKind> for InterfaceError {
    fn from(value: FailureKind) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            FailureKind::ToolConnectivityFailure => Self::ServiceUnavailable { correlation_id },
            FailureKind::UnexpectedFailure => Self::Internal { correlation_id },
        }
    }
}

impl From<InputError> for InterfaceError {
    fn from(value: InputError) -> Self {
        Self::bad_request(value.to_string())
    }
}
