//! Synthesis and media-room error types.

use thiserror::Error;

use amencast_bus::BusError;

/// Errors from synthesizing or decoding one sentence.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body or description.
        message: String,
    },

    /// No API key was configured.
    #[error("missing API key for the speech provider")]
    MissingApiKey,

    /// The configured output format cannot be decoded.
    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// Compressed audio could not be decoded.
    #[error("audio decode failed: {0}")]
    Decode(String),

    /// Sample-rate conversion failed.
    #[error("resample failed: {0}")]
    Resample(String),
}

impl SynthesisError {
    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::MissingApiKey
            | Self::UnsupportedFormat(_)
            | Self::Decode(_)
            | Self::Resample(_) => false,
        }
    }
}

/// Errors from the media room a stream's audio is published into.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Joining the room failed.
    #[error("room connect failed: {0}")]
    Connect(String),

    /// A join token could not be minted.
    #[error("room token failed: {0}")]
    Token(String),

    /// Publishing or unpublishing the track failed.
    #[error("track publish failed: {0}")]
    Publish(String),

    /// Submitting a frame failed; the room is considered lost.
    #[error("frame capture failed: {0}")]
    Capture(String),

    /// Bus-backed room transport failed.
    #[error(transparent)]
    Bus(#[from] BusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_are_not_retried() {
        assert!(!SynthesisError::Decode("bad frame".into()).is_retryable());
        assert!(
            SynthesisError::Api {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn room_error_display() {
        let err = RoomError::Capture("queue closed".into());
        assert_eq!(err.to_string(), "frame capture failed: queue closed");
    }
}
