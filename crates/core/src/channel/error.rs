use thiserror::Error;

/// Errors from messaging and publishing backends.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{method} failed: {description}")]
    Api { method: String, description: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0} is not configured")]
    NotConfigured(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Http(err.to_string())
    }
}
