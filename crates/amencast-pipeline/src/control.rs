//! The stream control plane.
//!
//! [`ControlPlane`] publishes lifecycle intents on `stream:control`;
//! [`StageCommand::from_message`] turns a received control message into the
//! command a stage acts on. No stream state lives here.

use std::sync::Arc;

use tracing::{debug, warn};

use amencast_bus::{BusMessage, MessageBus, publish_message};
use amencast_core::channels::Channel;
use amencast_core::{
    ControlAction, ControlMessage, ServiceTag, StatusKind, StatusMessage, StreamId,
};

use crate::errors::PipelineError;

/// A lifecycle command, as seen by a stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageCommand {
    /// Create per-stream state.
    Start {
        /// Stream.
        stream_id: StreamId,
        /// Target language (defaulted).
        language: String,
    },
    /// Forced teardown.
    Stop {
        /// Stream.
        stream_id: StreamId,
    },
    /// The ingestion adapter has no more audio.
    IngestionComplete {
        /// Stream.
        stream_id: StreamId,
    },
    /// Transcription finished; translation may drain.
    TranscriptionComplete {
        /// Stream.
        stream_id: StreamId,
        /// Forwarded terminal failure.
        error: Option<String>,
    },
    /// Translation finished; synthesis may drain.
    TranslationComplete {
        /// Stream.
        stream_id: StreamId,
        /// Forwarded terminal failure.
        error: Option<String>,
    },
}

impl StageCommand {
    /// Interpret a control message. Unknown actions yield `None`.
    pub fn from_message(msg: ControlMessage) -> Option<Self> {
        let stream_id = msg.stream_id.clone();
        match msg.action {
            ControlAction::Start => Some(Self::Start {
                language: msg.language_or_default(),
                stream_id,
            }),
            ControlAction::Stop | ControlAction::ForceStop => Some(Self::Stop { stream_id }),
            ControlAction::IngestionComplete => Some(Self::IngestionComplete { stream_id }),
            ControlAction::TranscriptionComplete => Some(Self::TranscriptionComplete {
                stream_id,
                error: msg.error,
            }),
            ControlAction::TranslationComplete => Some(Self::TranslationComplete {
                stream_id,
                error: msg.error,
            }),
            ControlAction::Unknown => {
                warn!(stream_id = %stream_id, "unknown control action ignored");
                None
            }
        }
    }

    /// Decode and interpret a bus message from the control channel.
    ///
    /// Malformed payloads are logged and dropped.
    pub fn from_bus(msg: &BusMessage) -> Option<Self> {
        match msg.decode::<ControlMessage>() {
            Ok(control) => {
                debug!(action = ?control.action, stream_id = %control.stream_id, "control message");
                Self::from_message(control)
            }
            Err(e) => {
                warn!(error = %e, "malformed control message dropped");
                None
            }
        }
    }

    /// The stream this command targets.
    pub fn stream_id(&self) -> &StreamId {
        match self {
            Self::Start { stream_id, .. }
            | Self::Stop { stream_id }
            | Self::IngestionComplete { stream_id }
            | Self::TranscriptionComplete { stream_id, .. }
            | Self::TranslationComplete { stream_id, .. } => stream_id,
        }
    }
}

/// Publisher for control and status messages.
#[derive(Clone)]
pub struct ControlPlane {
    bus: Arc<dyn MessageBus>,
}

impl ControlPlane {
    /// Publish through `bus`.
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// The underlying bus.
    pub fn bus(&self) -> &Arc<dyn MessageBus> {
        &self.bus
    }

    /// Publish any control message.
    pub async fn send(&self, msg: &ControlMessage) -> Result<(), PipelineError> {
        publish_message(self.bus.as_ref(), &Channel::Control, msg).await?;
        Ok(())
    }

    /// Start `stream_id` translating into `language`.
    pub async fn start(&self, stream_id: &StreamId, language: &str) -> Result<(), PipelineError> {
        self.send(&ControlMessage::start(stream_id.clone(), language))
            .await
    }

    /// Forced stop.
    pub async fn stop(&self, stream_id: &StreamId) -> Result<(), PipelineError> {
        self.send(&ControlMessage::stop(stream_id.clone())).await
    }

    /// Graceful end of audio.
    pub async fn ingestion_complete(&self, stream_id: &StreamId) -> Result<(), PipelineError> {
        self.send(&ControlMessage::ingestion_complete(stream_id.clone()))
            .await
    }

    /// Publish a status update on `stream:status:{id}`.
    pub async fn status(&self, status: &StatusMessage) -> Result<(), PipelineError> {
        let channel = Channel::Status(status.stream_id.clone());
        publish_message(self.bus.as_ref(), &channel, status).await?;
        Ok(())
    }

    /// Publish a status update, logging instead of failing.
    pub async fn report(&self, kind: StatusKind, service: ServiceTag, stream_id: &StreamId) {
        self.report_message(StatusMessage::new(kind, service, stream_id.clone()))
            .await;
    }

    /// Publish a prepared status update, logging instead of failing.
    pub async fn report_message(&self, status: StatusMessage) {
        if let Err(e) = self.status(&status).await {
            warn!(stream_id = %status.stream_id, error = %e, "status publish failed");
        }
    }

    /// Publish a control message, logging instead of failing.
    pub async fn signal(&self, msg: ControlMessage) {
        if let Err(e) = self.send(&msg).await {
            warn!(stream_id = %msg.stream_id, action = ?msg.action, error = %e, "control publish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amencast_bus::MemoryBus;
    use bytes::Bytes;

    #[test]
    fn start_defaults_language() {
        let mut msg = ControlMessage::start(StreamId::from("s1"), "de");
        msg.target_language = None;
        assert_eq!(
            StageCommand::from_message(msg),
            Some(StageCommand::Start {
                stream_id: StreamId::from("s1"),
                language: "es".into()
            })
        );
    }

    #[test]
    fn force_stop_is_stop() {
        let payload = br#"{"action":"force_stop","streamId":"s1"}"#;
        let msg = BusMessage {
            channel: "stream:control".into(),
            payload: Bytes::from_static(payload),
        };
        assert_eq!(
            StageCommand::from_bus(&msg),
            Some(StageCommand::Stop {
                stream_id: StreamId::from("s1")
            })
        );
    }

    #[test]
    fn completion_forwards_error() {
        let msg = ControlMessage::transcription_complete(StreamId::from("s1"), Some("boom".into()));
        assert_eq!(
            StageCommand::from_message(msg),
            Some(StageCommand::TranscriptionComplete {
                stream_id: StreamId::from("s1"),
                error: Some("boom".into())
            })
        );
    }

    #[test]
    fn malformed_and_unknown_are_dropped() {
        let garbage = BusMessage {
            channel: "stream:control".into(),
            payload: Bytes::from_static(b"{not json"),
        };
        assert_eq!(StageCommand::from_bus(&garbage), None);

        let unknown = BusMessage {
            channel: "stream:control".into(),
            payload: Bytes::from_static(br#"{"action":"rewind","streamId":"s1"}"#),
        };
        assert_eq!(StageCommand::from_bus(&unknown), None);
    }

    #[tokio::test]
    async fn control_plane_publishes_on_shared_channel() {
        let bus = Arc::new(MemoryBus::new());
        let mut sub = bus.subscribe(&["stream:control"]).await.unwrap();
        let plane = ControlPlane::new(bus);
        plane.start(&StreamId::from("s1"), "it").await.unwrap();

        let msg = sub.recv().await.unwrap();
        let cmd = StageCommand::from_bus(&msg).unwrap();
        assert_eq!(
            cmd,
            StageCommand::Start {
                stream_id: StreamId::from("s1"),
                language: "it".into()
            }
        );
    }
}
