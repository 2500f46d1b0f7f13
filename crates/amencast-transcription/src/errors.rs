//! Transcription error types.

use thiserror::Error;

/// Errors from establishing or driving an upstream speech-to-text session.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The connect attempt did not finish in time.
    #[error("connect timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },
    /// A request header or URL could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The provider sent something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TranscriptionError {
    /// Whether the failure should be fed into the reconnect policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout { .. })
    }
}
