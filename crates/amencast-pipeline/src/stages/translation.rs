//! Transcript segments in, translated sentences out.
//!
//! Each started stream gets one ordered worker holding its target language
//! and rolling context. Segments are translated strictly one at a time so
//! results leave in the order their sources arrived, whatever the provider
//! latency. `transcription_complete` drains the queue and is answered with
//! `translation_complete`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amencast_bus::{BusMessage, MessageBus, publish_message};
use amencast_core::channels::{Channel, patterns};
use amencast_core::{ControlMessage, StreamId, TranscriptMessage, TranslationResult, now_millis};
use amencast_translation::{TranslationSession, Translator};

use crate::control::{ControlPlane, StageCommand};
use crate::errors::PipelineError;
use crate::sequencer::{StreamProcessor, StreamWorkers, WorkerExit, WorkerOutcome};
use crate::stage::{Stage, TakeOnce, join_all, next_message};

const NAME: &str = "translation";

struct TranslationProcessor {
    stream_id: StreamId,
    session: TranslationSession,
    translator: Arc<dyn Translator>,
    control: ControlPlane,
}

#[async_trait]
impl StreamProcessor for TranslationProcessor {
    type Item = TranscriptMessage;

    async fn process(&mut self, segment: TranscriptMessage) -> Result<(), PipelineError> {
        let Some(translated) = self
            .session
            .translate(self.translator.as_ref(), &segment.text)
            .await
        else {
            return Ok(());
        };
        let result = TranslationResult {
            stream_id: self.stream_id.clone(),
            chunk_id: segment.chunk_id,
            source_text: segment.text,
            translated_text: translated,
            timestamp: now_millis(),
            language_target: self.session.language().to_owned(),
        };
        let channel = Channel::TextTranslated(self.stream_id.clone());
        if let Err(e) = publish_message(self.control.bus().as_ref(), &channel, &result).await {
            warn!(stream_id = %self.stream_id, error = %e, "translation publish failed");
        }
        Ok(())
    }

    async fn finish(&mut self, outcome: &WorkerOutcome) {
        if let WorkerOutcome::Drained { error } = outcome {
            info!(
                stream_id = %self.stream_id,
                sentences = self.session.context().sentence_count(),
                "translation complete"
            );
            self.control
                .signal(ControlMessage::translation_complete(
                    self.stream_id.clone(),
                    error.clone(),
                ))
                .await;
        }
    }
}

/// The translation stage.
pub struct TranslationStage {
    workers: StreamWorkers<TranscriptMessage>,
    exits: TakeOnce<WorkerExit>,
    translator: Arc<dyn Translator>,
    context_window: usize,
    control: ControlPlane,
}

impl TranslationStage {
    /// Stage publishing through `bus`, keeping `context_window` source
    /// sentences per stream.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        translator: Arc<dyn Translator>,
        context_window: usize,
    ) -> Self {
        let (workers, exits) = StreamWorkers::new(NAME);
        Self {
            workers,
            exits: TakeOnce::new(exits),
            translator,
            context_window,
            control: ControlPlane::new(bus),
        }
    }

    fn on_message(&self, msg: &BusMessage) {
        match msg.typed_channel() {
            Some(Channel::TextTranscribed(stream_id)) => match msg.decode::<TranscriptMessage>() {
                Ok(segment) => {
                    let _ = self.workers.enqueue(&stream_id, segment);
                }
                Err(e) => warn!(stream_id = %stream_id, error = %e, "malformed transcript dropped"),
            },
            Some(Channel::Control) => {
                if let Some(command) = StageCommand::from_bus(msg) {
                    self.on_command(command);
                }
            }
            _ => debug!(channel = %msg.channel, "unexpected channel ignored"),
        }
    }

    fn on_command(&self, command: StageCommand) {
        match command {
            StageCommand::Start {
                stream_id,
                language,
            } => {
                let _ = self.workers.start(&stream_id, || TranslationProcessor {
                    session: TranslationSession::new(
                        stream_id.clone(),
                        language,
                        self.context_window,
                    ),
                    stream_id: stream_id.clone(),
                    translator: Arc::clone(&self.translator),
                    control: self.control.clone(),
                });
            }
            StageCommand::TranscriptionComplete { stream_id, error } => {
                let _ = self.workers.finish(&stream_id, error);
            }
            StageCommand::Stop { stream_id } => {
                let _ = self.workers.stop(&stream_id);
            }
            StageCommand::IngestionComplete { .. } | StageCommand::TranslationComplete { .. } => {}
        }
    }
}

#[async_trait]
impl Stage for TranslationStage {
    fn name(&self) -> &'static str {
        NAME
    }

    fn active_streams(&self) -> usize {
        self.workers.len()
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), PipelineError> {
        let mut exits = self.exits.take(NAME)?;
        let mut sub = self
            .control
            .bus()
            .subscribe(&[patterns::TEXT_TRANSCRIBED, patterns::STREAM_CONTROL])
            .await?;
        info!(stage = NAME, "stage running");

        let result = loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break Ok(()),
                Some(exit) = exits.recv() => {
                    let _ = self.workers.release(&exit);
                }
                msg = next_message(&mut sub) => match msg {
                    Ok(msg) => self.on_message(&msg),
                    Err(e) => break Err(e),
                },
            }
        };

        join_all(self.workers.stop_all()).await;
        info!(stage = NAME, "stage stopped");
        result
    }
}
