//! The speech provider seam.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::SynthesisError;

/// How a provider's audio bytes are encoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioEncoding {
    /// Raw signed 16-bit little-endian mono PCM.
    Pcm {
        /// Sample rate in Hz.
        sample_rate: u32,
    },
    /// A container or codec probed by file extension (`mp3`, `wav`).
    Compressed {
        /// Probe hint.
        extension: String,
    },
}

impl AudioEncoding {
    /// Parse a provider output format such as `mp3_44100_128` or `pcm_16000`.
    pub fn from_output_format(format: &str) -> Result<Self, SynthesisError> {
        let mut parts = format.split('_');
        match parts.next() {
            Some("pcm") => parts
                .next()
                .and_then(|rate| rate.parse::<u32>().ok())
                .filter(|rate| *rate > 0)
                .map(|sample_rate| Self::Pcm { sample_rate })
                .ok_or_else(|| SynthesisError::UnsupportedFormat(format.to_string())),
            Some(codec @ ("mp3" | "wav")) => Ok(Self::Compressed {
                extension: codec.to_string(),
            }),
            _ => Err(SynthesisError::UnsupportedFormat(format.to_string())),
        }
    }
}

/// Audio returned for one sentence.
#[derive(Clone, Debug)]
pub struct SynthesizedAudio {
    /// Encoded bytes.
    pub data: Bytes,
    /// Encoding of `data`.
    pub encoding: AudioEncoding,
}

/// A text-to-speech provider.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` with `voice_id`.
    async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<SynthesizedAudio, SynthesisError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_output_formats() {
        assert_eq!(
            AudioEncoding::from_output_format("mp3_44100_128").unwrap(),
            AudioEncoding::Compressed {
                extension: "mp3".into()
            }
        );
        assert_eq!(
            AudioEncoding::from_output_format("pcm_16000").unwrap(),
            AudioEncoding::Pcm { sample_rate: 16_000 }
        );
    }

    #[test]
    fn rejects_unknown_formats() {
        assert_matches!(
            AudioEncoding::from_output_format("ulaw_8000"),
            Err(SynthesisError::UnsupportedFormat(_))
        );
        assert_matches!(
            AudioEncoding::from_output_format("pcm_fast"),
            Err(SynthesisError::UnsupportedFormat(_))
        );
    }
}
