//! Raw audio in, finalized transcript segments out.
//!
//! Listens on `audio:raw:*` and `stream:control`. Each started stream gets
//! one upstream session; its finalized segments are published on
//! `text:transcribed:{id}` and its natural end is announced with
//! `transcription_complete`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use amencast_bus::{BusMessage, MessageBus, publish_message};
use amencast_core::channels::{Channel, patterns};
use amencast_core::{ControlMessage, ServiceTag, StatusKind, StatusMessage, TranscriptMessage};
use amencast_transcription::{
    SessionConfig, SpeechToText, TranscriptionEvent, TranscriptionManager,
};

use crate::control::{ControlPlane, StageCommand};
use crate::errors::PipelineError;
use crate::stage::{Stage, TakeOnce, next_message};

const NAME: &str = "transcription";

/// The speech-to-text stage.
pub struct TranscriptionStage {
    manager: TranscriptionManager,
    events: TakeOnce<TranscriptionEvent>,
    control: ControlPlane,
}

impl TranscriptionStage {
    /// Stage publishing through `bus` and transcribing with `stt`.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        stt: Arc<dyn SpeechToText>,
        config: SessionConfig,
    ) -> Self {
        let (manager, events) = TranscriptionManager::new(stt, config);
        Self {
            manager,
            events: TakeOnce::new(events),
            control: ControlPlane::new(bus),
        }
    }

    async fn on_message(&self, msg: BusMessage) {
        match msg.typed_channel() {
            Some(Channel::AudioRaw(stream_id)) => {
                if !self.manager.send_audio(&stream_id, msg.payload) {
                    trace!(stream_id = %stream_id, "audio for inactive stream dropped");
                }
            }
            Some(Channel::Control) => {
                if let Some(command) = StageCommand::from_bus(&msg) {
                    self.on_command(command).await;
                }
            }
            _ => debug!(channel = %msg.channel, "unexpected channel ignored"),
        }
    }

    async fn on_command(&self, command: StageCommand) {
        match command {
            StageCommand::Start { stream_id, .. } => {
                if self.manager.start_stream(&stream_id) {
                    self.control
                        .report(StatusKind::Starting, ServiceTag::Stt, &stream_id)
                        .await;
                }
            }
            StageCommand::Stop { stream_id } => {
                let _ = self.manager.stop_stream(&stream_id);
            }
            StageCommand::IngestionComplete { stream_id } => {
                let _ = self.manager.signal_audio_end(&stream_id);
            }
            StageCommand::TranscriptionComplete { .. }
            | StageCommand::TranslationComplete { .. } => {}
        }
    }

    async fn on_event(&self, event: TranscriptionEvent) {
        match event {
            TranscriptionEvent::Transcript { stream_id, text } => {
                let channel = Channel::TextTranscribed(stream_id.clone());
                let segment = TranscriptMessage::new(stream_id, text);
                if let Err(e) =
                    publish_message(self.control.bus().as_ref(), &channel, &segment).await
                {
                    warn!(stream_id = %segment.stream_id, error = %e, "transcript publish failed");
                }
            }
            TranscriptionEvent::Completed {
                stream_id,
                session,
                error,
            } => {
                if !self.manager.release(&stream_id, session) {
                    debug!(stream_id = %stream_id, session, "completion for replaced session ignored");
                    return;
                }
                if let Some(error) = &error {
                    self.control
                        .report_message(
                            StatusMessage::new(StatusKind::Error, ServiceTag::Stt, stream_id.clone())
                                .with_error(error.clone()),
                        )
                        .await;
                }
                info!(stream_id = %stream_id, failed = error.is_some(), "transcription complete");
                self.control
                    .signal(ControlMessage::transcription_complete(stream_id, error))
                    .await;
            }
        }
    }
}

#[async_trait]
impl Stage for TranscriptionStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn active_streams(&self) -> usize {
        self.manager.active_count()
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let mut events = self.events.take(NAME)?;
        let mut sub = self
            .control
            .bus()
            .subscribe(&[patterns::AUDIO_RAW, patterns::STREAM_CONTROL])
            .await?;
        info!(stage = NAME, "stage running");

        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break Ok(()),
                Some(event) = events.recv() => self.on_event(event).await,
                msg = next_message(&mut sub) => match msg {
                    Ok(msg) => self.on_message(msg).await,
                    Err(e) => break Err(e),
                },
            }
        };

        self.manager.stop_all();
        info!(stage = NAME, "stage stopped");
        result
    }
}
