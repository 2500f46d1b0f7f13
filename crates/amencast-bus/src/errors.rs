//! Bus error types.

use thiserror::Error;

/// Errors raised by a [`MessageBus`](crate::MessageBus) implementation.
#[derive(Debug, Error)]
pub enum BusError {
    /// A subscription pattern could not be compiled.
    #[error("invalid subscription pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        message: String,
    },
    /// A message could not be encoded for publishing.
    #[error("failed to encode message: {0}")]
    Encode(#[from] amencast_core::MessageError),
    /// The underlying transport failed.
    #[error("bus transport error: {0}")]
    Transport(String),
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for BusError {
    fn from(err: redis::RedisError) -> Self {
        Self::Transport(err.to_string())
    }
}

impl BusError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
