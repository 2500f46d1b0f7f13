//! Pipeline error types.

use thiserror::Error;

use amencast_bus::BusError;
use amencast_core::MessageError;
use amencast_synthesis::RoomError;

/// Errors that end a stage or a stream.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bus transport failure.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// A payload could not be encoded.
    #[error("message error: {0}")]
    Message(#[from] MessageError),

    /// The media room was lost mid-stream.
    #[error("room error: {0}")]
    Room(#[from] RoomError),

    /// The stage's subscription ended underneath it.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// `run` was called on a stage that already ran.
    #[error("stage {0} is already running")]
    AlreadyRunning(&'static str),
}

impl PipelineError {
    /// Whether restarting the stage could help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Bus(e) => e.is_retryable(),
            Self::SubscriptionClosed => true,
            Self::Message(_) | Self::Room(_) | Self::AlreadyRunning(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(PipelineError::SubscriptionClosed.is_retryable());
        assert!(!PipelineError::AlreadyRunning("translation").is_retryable());
        assert!(!PipelineError::Room(RoomError::Capture("gone".into())).is_retryable());
    }

    #[test]
    fn display_names_the_stage() {
        assert_eq!(
            PipelineError::AlreadyRunning("synthesis").to_string(),
            "stage synthesis is already running"
        );
    }
}
