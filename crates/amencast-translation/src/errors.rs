//! Translation error types.

use thiserror::Error;

/// Errors from a translation request.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body or description.
        message: String,
    },

    /// No API key was configured.
    #[error("missing API key for the translation provider")]
    MissingApiKey,
}

impl TranslationError {
    /// Whether a retry could plausibly succeed.
    ///
    /// The stage never retries a segment, but callers use this to pick a log
    /// level.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| {
                        s == reqwest::StatusCode::TOO_MANY_REQUESTS || s.is_server_error()
                    })
            }
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Json(_) | Self::MissingApiKey => false,
        }
    }
}
