//! Error type returned by remote clients

use thiserror::Error;

/// A failed remote call.
///
/// The orchestrator never interprets `code`; it only surfaces `message` and
/// `request_id` next to the function or trigger the call was made for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ClientError {
    /// Human-readable message
    pub message: String,
    /// Platform error code, e.g. `ResourceInUse.Function`
    pub code: Option<String>,
    /// Remote request-correlation id
    pub request_id: Option<String>,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            request_id: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Whether the platform reported that the target already exists
    pub fn is_resource_in_use(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.starts_with("ResourceInUse"))
    }
}
