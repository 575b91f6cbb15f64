//! NDFC client errors

use thiserror::Error;

/// Errors that can occur when talking to the NDFC/DCNM controller
#[derive(Debug, Error)]
pub enum NdfcError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Connection-level failure with no HTTP reply
    #[error("Transport error: {0}")]
    Transport(String),

    /// Controller returned an error the caller cannot recover from
    #[error("NDFC API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// `commit()` was called before a required parameter was set
    #[error("Missing parameter: {0} must be set before calling commit()")]
    MissingParameter(&'static str),

    /// Unknown or unsupported HTTP verb
    #[error("Invalid verb: {0}")]
    InvalidVerb(String),

    /// Retry budget exhausted without a successful response
    #[error("Request {verb} {path} did not succeed within {timeout}s: {message}")]
    Timeout {
        /// Verb of the failed request
        verb: String,
        /// Request path
        path: String,
        /// Timeout budget in seconds
        timeout: u64,
        /// Last controller message observed
        message: String,
    },
}
