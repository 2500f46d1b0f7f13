//! Canonical PCM format shared by ingestion, transcription and publishing.
//!
//! Everything on the wire is signed 16-bit little-endian mono at 16 kHz. A
//! frame is 20 ms, i.e. 320 samples.

use bytes::Bytes;

use crate::errors::MessageError;

/// Pipeline sample rate in Hz.
pub const SAMPLE_RATE: u32 = 16_000;
/// Pipeline channel count.
pub const CHANNELS: u32 = 1;
/// Canonical frame duration in milliseconds.
pub const FRAME_DURATION_MS: u32 = 20;
/// Samples per channel in one canonical frame.
pub const SAMPLES_PER_FRAME: usize = (SAMPLE_RATE * FRAME_DURATION_MS / 1000) as usize;
/// Bytes per sample (s16).
pub const BYTES_PER_SAMPLE: usize = 2;

/// A block of PCM destined for a published track.
///
/// Frames produced by the reframer are exactly [`SAMPLES_PER_FRAME`] long
/// except for the last frame of a sentence, which may be shorter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFrame {
    /// Interleaved samples (mono, so one per tick).
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u32,
}

impl AudioFrame {
    /// A mono frame at the pipeline rate.
    #[must_use]
    pub fn mono(samples: Vec<i16>) -> Self {
        Self {
            samples,
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }

    /// Samples per channel.
    #[must_use]
    pub fn samples_per_channel(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Whether the frame has the canonical length.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples_per_channel() == SAMPLES_PER_FRAME
    }

    /// Little-endian byte encoding of the samples.
    #[must_use]
    pub fn to_le_bytes(&self) -> Bytes {
        samples_to_le_bytes(&self.samples)
    }
}

/// Interpret little-endian s16 bytes as samples.
pub fn le_bytes_to_samples(bytes: &[u8]) -> Result<Vec<i16>, MessageError> {
    if bytes.len() % BYTES_PER_SAMPLE != 0 {
        return Err(MessageError::OddPcmLength { len: bytes.len() });
    }
    Ok(bytes
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

/// Encode samples as little-endian s16 bytes.
#[must_use]
pub fn samples_to_le_bytes(samples: &[i16]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    Bytes::from(out)
}

/// Zeroed PCM covering `duration_ms` at the pipeline format.
#[must_use]
pub fn silence(duration_ms: u32) -> Bytes {
    let samples = (SAMPLE_RATE / 1000 * duration_ms) as usize * CHANNELS as usize;
    Bytes::from(vec![0u8; samples * BYTES_PER_SAMPLE])
}
