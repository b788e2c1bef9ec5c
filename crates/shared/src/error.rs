use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Error body returned by the events API on non-2xx responses.
///
/// The server is inconsistent about the field name, so both `error` and
/// `message` are accepted; `error` wins when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            message: None,
        }
    }

    pub fn message(&self) -> &str {
        self.error
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.message.as_deref().filter(|m| !m.is_empty()))
            .unwrap_or(GENERIC_ERROR_MESSAGE)
    }
}

#[derive(Debug, Error)]
#[error("{status}: {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, body: &ErrorBody) -> Self {
        Self {
            status,
            message: body.message().to_string(),
        }
    }
}
