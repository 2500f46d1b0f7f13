//! Per-stream synthesis state: the lazily published track and counters.

use std::time::Instant;

use tracing::{debug, info, warn};

use amencast_core::StreamId;

use crate::decode::decode_to_pcm;
use crate::errors::{RoomError, SynthesisError};
use crate::reframe::reframe;
use crate::room::{PublishedTrack, RoomConnector};
use crate::synthesizer::SpeechSynthesizer;

/// Result of speaking one sentence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Spoken {
    /// Every frame was captured.
    Played {
        /// Frames submitted.
        frames: usize,
    },
    /// Synthesis or decoding failed; the sentence was skipped.
    Dropped,
}

/// One stream's speaker: track lifecycle plus statistics.
///
/// The track is published on the first sentence and unpublished by
/// [`SynthesisSession::close`], at most once.
pub struct SynthesisSession {
    stream_id: StreamId,
    voice_id: String,
    track: Option<Box<dyn PublishedTrack>>,
    closed: bool,
    sentences: u64,
    started: Instant,
}

impl SynthesisSession {
    /// New session speaking with `voice_id`. Nothing is published yet.
    pub fn new(stream_id: StreamId, voice_id: impl Into<String>) -> Self {
        Self {
            stream_id,
            voice_id: voice_id.into(),
            track: None,
            closed: false,
            sentences: 0,
            started: Instant::now(),
        }
    }

    /// Voice in use.
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    /// Whether a track is currently published.
    pub fn is_published(&self) -> bool {
        self.track.is_some()
    }

    /// Sentences played so far.
    pub fn sentences(&self) -> u64 {
        self.sentences
    }

    /// Milliseconds since the session was created.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Synthesize `text` and play it into the stream's track.
    ///
    /// Provider and decode failures drop the sentence. Room failures are
    /// returned: the stream cannot continue without its track.
    pub async fn speak(
        &mut self,
        synthesizer: &dyn SpeechSynthesizer,
        room: &dyn RoomConnector,
        text: &str,
    ) -> Result<Spoken, RoomError> {
        if self.closed {
            return Ok(Spoken::Dropped);
        }
        let text = text.trim();
        if text.is_empty() {
            return Ok(Spoken::Dropped);
        }

        let samples = match render(synthesizer, text, &self.voice_id).await {
            Ok(samples) => samples,
            Err(e) => {
                warn!(
                    stream_id = %self.stream_id,
                    error = %e,
                    retryable = e.is_retryable(),
                    "synthesis failed, sentence dropped"
                );
                return Ok(Spoken::Dropped);
            }
        };

        if self.track.is_none() {
            let track = room.join(&self.stream_id).await?;
            info!(stream_id = %self.stream_id, voice_id = %self.voice_id, "audio track published");
            self.track = Some(track);
        }
        let Some(track) = self.track.as_mut() else {
            return Ok(Spoken::Dropped);
        };

        let frames = reframe(&samples);
        for frame in &frames {
            track.capture_frame(frame).await?;
        }
        self.sentences += 1;
        debug!(
            stream_id = %self.stream_id,
            frames = frames.len(),
            samples = samples.len(),
            "sentence played"
        );
        Ok(Spoken::Played {
            frames: frames.len(),
        })
    }

    /// Unpublish the track and leave the room. Idempotent.
    ///
    /// Returns whether a track was actually unpublished.
    pub async fn close(&mut self) -> bool {
        self.closed = true;
        let Some(mut track) = self.track.take() else {
            return false;
        };
        if let Err(e) = track.close().await {
            warn!(stream_id = %self.stream_id, error = %e, "track teardown failed");
        }
        true
    }
}

async fn render(
    synthesizer: &dyn SpeechSynthesizer,
    text: &str,
    voice_id: &str,
) -> Result<Vec<i16>, SynthesisError> {
    let audio = synthesizer.synthesize(text, voice_id).await?;
    decode_to_pcm(&audio)
}
