use shared::error::ApiException;
use thiserror::Error;

/// Failures surfaced by the events client.
///
/// `Clone` because a single in-flight GET can be awaited by several callers
/// through the fetch cache, and each of them receives the same outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("network response was not ok (status {status})")]
    Http { status: u16 },
    #[error("redirect response (status {status}) did not carry a redirect target")]
    MalformedRedirect { status: u16 },
    #[error("{message}")]
    Application { status: u16, message: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    #[error("no event is selected for comments")]
    NoSelection,
    #[error("invalid input: {0}")]
    Validation(&'static str),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status }
            | Self::MalformedRedirect { status }
            | Self::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}

impl From<ApiException> for ClientError {
    fn from(value: ApiException) -> Self {
        Self::Application {
            status: value.status,
            message: value.message,
        }
    }
}
