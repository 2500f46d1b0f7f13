//! The seam between the session driver and a speech-to-text provider.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use amencast_core::StreamId;

use crate::errors::TranscriptionError;

/// Instruction from the session driver to an open upstream connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamCommand {
    /// Forward PCM audio.
    Audio(Bytes),
    /// Flush pending transcripts, then close.
    Close,
    /// Close immediately, discarding anything pending.
    Abort,
}

/// Notification from an open upstream connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// A finalized transcript segment.
    Transcript(String),
    /// A non-fatal provider error.
    Error(String),
    /// The connection closed. No further events follow.
    Closed {
        /// WebSocket close code (1005 when none was sent).
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Driver-side handles of an open upstream connection.
#[derive(Debug)]
pub struct UpstreamSession {
    /// Commands into the connection.
    pub commands: mpsc::UnboundedSender<UpstreamCommand>,
    /// Events out of the connection.
    pub events: mpsc::UnboundedReceiver<UpstreamEvent>,
}

/// Provider-side handles of an open upstream connection.
#[derive(Debug)]
pub struct UpstreamPeer {
    /// Commands from the driver.
    pub commands: mpsc::UnboundedReceiver<UpstreamCommand>,
    /// Events to the driver.
    pub events: mpsc::UnboundedSender<UpstreamEvent>,
}

impl UpstreamSession {
    /// Create a connected session/peer pair.
    pub fn pair() -> (Self, UpstreamPeer) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: cmd_tx,
                events: evt_rx,
            },
            UpstreamPeer {
                commands: cmd_rx,
                events: evt_tx,
            },
        )
    }
}

/// A streaming speech-to-text provider.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Open a new session for `stream_id`.
    ///
    /// Resolves once the provider is ready to accept audio.
    async fn connect(&self, stream_id: &StreamId) -> Result<UpstreamSession, TranscriptionError>;
}
