//! Wire message errors.

use thiserror::Error;

/// A bus payload could not be interpreted.
///
/// Always non-fatal: stages log and discard the offending message.
#[derive(Debug, Error)]
pub enum MessageError {
    /// Payload was not valid JSON for the expected shape.
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload was not UTF-8 where text was expected.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// A required field was present but empty.
    #[error("empty field: {field}")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Raw PCM payload had an odd byte length.
    #[error("PCM payload has odd length {len}")]
    OddPcmLength {
        /// Byte length received.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_display() {
        let err: MessageError = serde_json::from_str::<serde_json::Value>("{bad")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("malformed message"));
    }

    #[test]
    fn empty_field_display() {
        let err = MessageError::EmptyField { field: "streamId" };
        assert_eq!(err.to_string(), "empty field: streamId");
    }

    #[test]
    fn odd_pcm_display() {
        let err = MessageError::OddPcmLength { len: 3 };
        assert_eq!(err.to_string(), "PCM payload has odd length 3");
    }
}
