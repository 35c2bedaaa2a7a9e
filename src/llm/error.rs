//! Error types for the upstream completion client.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Raw response body, possibly empty.
        body: String,
    },

    /// The service reported an error inside the event stream.
    #[error("upstream error: {0}")]
    Api(String),

    /// A stream event could not be decoded.
    #[error("malformed upstream response: {0}")]
    Malformed(String),

    /// The call did not finish in time.
    #[error("upstream call timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Convenience result alias for completion operations.
pub type LlmResult<T> = Result<T, LlmError>;
