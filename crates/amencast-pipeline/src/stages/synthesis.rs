//! Translated sentences in, audible frames in the stream's room out.
//!
//! This stage owns the end of a stream: it is the only one that declares a
//! stream `completed` or `error`, and the only one that touches the media
//! room. The track is published lazily on the first playable sentence and
//! unpublished exactly once when the worker ends, however it ends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amencast_bus::{BusMessage, MessageBus};
use amencast_core::channels::{Channel, patterns};
use amencast_core::{
    ControlMessage, ServiceTag, StatusKind, StatusMessage, StreamId, TranslationResult,
};
use amencast_synthesis::{
    RoomConnector, SpeechSynthesizer, Spoken, SynthesisSession, VoiceMap,
};

use crate::control::{ControlPlane, StageCommand};
use crate::errors::PipelineError;
use crate::sequencer::{StreamProcessor, StreamWorkers, WorkerExit, WorkerOutcome};
use crate::stage::{Stage, TakeOnce, join_all, next_message};

const NAME: &str = "synthesis";

struct SynthesisProcessor {
    stream_id: StreamId,
    session: SynthesisSession,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    room: Arc<dyn RoomConnector>,
    control: ControlPlane,
    announced: bool,
}

#[async_trait]
impl StreamProcessor for SynthesisProcessor {
    type Item = TranslationResult;

    async fn process(&mut self, result: TranslationResult) -> Result<(), PipelineError> {
        let spoken = self
            .session
            .speak(
                self.synthesizer.as_ref(),
                self.room.as_ref(),
                &result.translated_text,
            )
            .await?;
        if let Spoken::Played { frames } = spoken {
            debug!(stream_id = %self.stream_id, chunk_id = %result.chunk_id, frames, "sentence spoken");
        }
        if !self.announced && self.session.is_published() {
            self.announced = true;
            self.control
                .report(StatusKind::Running, ServiceTag::Tts, &self.stream_id)
                .await;
        }
        Ok(())
    }

    async fn finish(&mut self, outcome: &WorkerOutcome) {
        let unpublished = self.session.close().await;
        let status = match outcome {
            WorkerOutcome::Drained { error: None } => {
                StatusMessage::new(StatusKind::Completed, ServiceTag::Tts, self.stream_id.clone())
            }
            WorkerOutcome::Drained { error: Some(e) } | WorkerOutcome::Failed(e) => {
                StatusMessage::new(StatusKind::Error, ServiceTag::Tts, self.stream_id.clone())
                    .with_error(e.clone())
            }
            WorkerOutcome::Stopped => {
                StatusMessage::new(StatusKind::Stopped, ServiceTag::Tts, self.stream_id.clone())
            }
        }
        .with_metadata("chunkCount", json!(self.session.sentences()))
        .with_metadata("durationMs", json!(self.session.elapsed_ms()));

        info!(
            stream_id = %self.stream_id,
            status = ?status.status,
            sentences = self.session.sentences(),
            unpublished,
            "stream finished"
        );
        self.control.report_message(status).await;

        if let WorkerOutcome::Failed(_) = outcome {
            // Release the stream everywhere upstream of the lost room.
            self.control
                .signal(ControlMessage::stop(self.stream_id.clone()))
                .await;
        }
    }
}

/// The speech synthesis and playback stage.
pub struct SynthesisStage {
    workers: StreamWorkers<TranslationResult>,
    exits: TakeOnce<WorkerExit>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    room: Arc<dyn RoomConnector>,
    voices: VoiceMap,
    control: ControlPlane,
}

impl SynthesisStage {
    /// Stage publishing status through `bus` and playing into `room`.
    pub fn new(
        bus: Arc<dyn MessageBus>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        room: Arc<dyn RoomConnector>,
        voices: VoiceMap,
    ) -> Self {
        let (workers, exits) = StreamWorkers::new(NAME);
        Self {
            workers,
            exits: TakeOnce::new(exits),
            synthesizer,
            room,
            voices,
            control: ControlPlane::new(bus),
        }
    }

    fn on_message(&self, msg: &BusMessage) {
        match msg.typed_channel() {
            Some(Channel::TextTranslated(stream_id)) => match msg.decode::<TranslationResult>() {
                Ok(result) => {
                    let _ = self.workers.enqueue(&stream_id, result);
                }
                Err(e) => warn!(stream_id = %stream_id, error = %e, "malformed translation dropped"),
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
                let voice = self.voices.voice_for(&language).to_owned();
                let _ = self.workers.start(&stream_id, || SynthesisProcessor {
                    session: SynthesisSession::new(stream_id.clone(), voice),
                    stream_id: stream_id.clone(),
                    synthesizer: Arc::clone(&self.synthesizer),
                    room: Arc::clone(&self.room),
                    control: self.control.clone(),
                    announced: false,
                });
            }
            StageCommand::TranslationComplete { stream_id, error } => {
                let _ = self.workers.finish(&stream_id, error);
            }
            StageCommand::Stop { stream_id } => {
                let _ = self.workers.stop(&stream_id);
            }
            StageCommand::IngestionComplete { .. }
            | StageCommand::TranscriptionComplete { .. } => {}
        }
    }
}

#[async_trait]
impl Stage for SynthesisStage {
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
            .subscribe(&[patterns::TEXT_TRANSLATED, patterns::STREAM_CONTROL])
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

        // Every stopped worker still unpublishes its track before exiting.
        join_all(self.workers.stop_all()).await;
        info!(stage = NAME, "stage stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use amencast_bus::{MemoryBus, Subscription, publish_message};
    use amencast_core::audio::samples_to_le_bytes;
    use amencast_core::{AudioFrame, ChunkId, now_millis};
    use amencast_synthesis::{
        AudioEncoding, PublishedTrack, RoomError, SynthesisError, SynthesizedAudio,
    };

    use super::*;

    struct Tone;

    #[async_trait]
    impl SpeechSynthesizer for Tone {
        async fn synthesize(
            &self,
            text: &str,
            _voice_id: &str,
        ) -> Result<SynthesizedAudio, SynthesisError> {
            if text == "unsayable" {
                return Err(SynthesisError::Api {
                    status: 422,
                    message: "bad text".into(),
                });
            }
            Ok(SynthesizedAudio {
                data: samples_to_le_bytes(&[1i16; 640]),
                encoding: AudioEncoding::Pcm { sample_rate: 16_000 },
            })
        }
    }

    #[derive(Default)]
    struct Counts {
        joins: AtomicUsize,
        frames: AtomicUsize,
        closes: AtomicUsize,
    }

    struct FakeRoom {
        counts: Arc<Counts>,
        fail_capture: bool,
    }

    struct FakeTrack {
        counts: Arc<Counts>,
        fail_capture: bool,
    }

    #[async_trait]
    impl RoomConnector for FakeRoom {
        async fn join(&self, _stream_id: &StreamId) -> Result<Box<dyn PublishedTrack>, RoomError> {
            let _ = self.counts.joins.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeTrack {
                counts: Arc::clone(&self.counts),
                fail_capture: self.fail_capture,
            }))
        }
    }

    #[async_trait]
    impl PublishedTrack for FakeTrack {
        async fn capture_frame(&mut self, _frame: &AudioFrame) -> Result<(), RoomError> {
            if self.fail_capture {
                return Err(RoomError::Capture("room gone".into()));
            }
            let _ = self.counts.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), RoomError> {
            let _ = self.counts.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        bus: Arc<MemoryBus>,
        counts: Arc<Counts>,
        shutdown: CancellationToken,
        task: tokio::task::JoinHandle<Result<(), PipelineError>>,
    }

    async fn harness(fail_capture: bool) -> Harness {
        let bus = Arc::new(MemoryBus::new());
        let counts = Arc::new(Counts::default());
        let stage = SynthesisStage::new(
            bus.clone(),
            Arc::new(Tone),
            Arc::new(FakeRoom {
                counts: Arc::clone(&counts),
                fail_capture,
            }),
            VoiceMap::new("default-voice", std::iter::empty()),
        );
        let shutdown = CancellationToken::new();
        let task = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { stage.run(shutdown).await })
        };
        while bus.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        Harness {
            bus,
            counts,
            shutdown,
            task,
        }
    }

    async fn translated(bus: &MemoryBus, id: &StreamId, text: &str) {
        let result = TranslationResult {
            stream_id: id.clone(),
            chunk_id: ChunkId::new(),
            source_text: String::new(),
            translated_text: text.into(),
            timestamp: now_millis(),
            language_target: "es".into(),
        };
        publish_message(bus, &Channel::TextTranslated(id.clone()), &result)
            .await
            .unwrap();
    }

    async fn next_status(sub: &mut Subscription) -> StatusMessage {
        tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap()
    }

    #[tokio::test]
    async fn drained_stream_completes_once_and_unpublishes() {
        let h = harness(false).await;
        let mut status = h.bus.subscribe(&[patterns::STREAM_STATUS]).await.unwrap();
        let plane = ControlPlane::new(h.bus.clone());
        let id = StreamId::from("s1");

        plane.start(&id, "es").await.unwrap();
        translated(&h.bus, &id, "Hola.").await;
        translated(&h.bus, &id, "unsayable").await;
        translated(&h.bus, &id, "Adiós.").await;
        plane
            .send(&ControlMessage::translation_complete(id.clone(), None))
            .await
            .unwrap();

        assert_eq!(next_status(&mut status).await.status, StatusKind::Running);
        let done = next_status(&mut status).await;
        assert_eq!(done.status, StatusKind::Completed);
        assert_eq!(done.service, ServiceTag::Tts);
        let metadata = done.metadata.unwrap();
        assert_eq!(metadata["chunkCount"], json!(2));
        assert!(metadata.contains_key("durationMs"));

        assert_eq!(h.counts.joins.load(Ordering::SeqCst), 1);
        assert_eq!(h.counts.frames.load(Ordering::SeqCst), 4);
        assert_eq!(h.counts.closes.load(Ordering::SeqCst), 1);

        // A repeated completion finds nothing to finish.
        plane
            .send(&ControlMessage::translation_complete(id.clone(), None))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(status.try_recv().is_none());

        h.shutdown.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn forwarded_error_is_reported() {
        let h = harness(false).await;
        let mut status = h.bus.subscribe(&[patterns::STREAM_STATUS]).await.unwrap();
        let plane = ControlPlane::new(h.bus.clone());
        let id = StreamId::from("s1");

        plane.start(&id, "es").await.unwrap();
        plane
            .send(&ControlMessage::translation_complete(
                id.clone(),
                Some("upstream lost".into()),
            ))
            .await
            .unwrap();

        let done = next_status(&mut status).await;
        assert_eq!(done.status, StatusKind::Error);
        assert_eq!(done.error.as_deref(), Some("upstream lost"));
        // Nothing was ever published, so nothing to unpublish.
        assert_eq!(h.counts.closes.load(Ordering::SeqCst), 0);

        h.shutdown.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn lost_room_reports_error_and_stops_the_stream() {
        let h = harness(true).await;
        let mut out = h
            .bus
            .subscribe(&[patterns::STREAM_STATUS, patterns::STREAM_CONTROL])
            .await
            .unwrap();
        let plane = ControlPlane::new(h.bus.clone());
        let id = StreamId::from("s1");

        plane.start(&id, "es").await.unwrap();
        translated(&h.bus, &id, "Hola.").await;

        let mut saw_error = false;
        let mut saw_stop = false;
        while !(saw_error && saw_stop) {
            let msg = tokio::time::timeout(Duration::from_secs(5), out.recv())
                .await
                .unwrap()
                .unwrap();
            match msg.typed_channel() {
                Some(Channel::Status(_)) => {
                    let s: StatusMessage = msg.decode().unwrap();
                    assert_eq!(s.status, StatusKind::Error);
                    saw_error = true;
                }
                Some(Channel::Control) => {
                    let c: ControlMessage = msg.decode().unwrap();
                    saw_stop |= c.action.is_stop();
                }
                _ => {}
            }
        }
        assert_eq!(h.counts.closes.load(Ordering::SeqCst), 1);

        h.shutdown.cancel();
        h.task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn shutdown_unpublishes_live_tracks() {
        let h = harness(false).await;
        let mut status = h.bus.subscribe(&[patterns::STREAM_STATUS]).await.unwrap();
        let plane = ControlPlane::new(h.bus.clone());
        let id = StreamId::from("s1");

        plane.start(&id, "es").await.unwrap();
        translated(&h.bus, &id, "Hola.").await;
        assert_eq!(next_status(&mut status).await.status, StatusKind::Running);

        h.shutdown.cancel();
        h.task.await.unwrap().unwrap();
        assert_eq!(h.counts.closes.load(Ordering::SeqCst), 1);
        assert_eq!(next_status(&mut status).await.status, StatusKind::Stopped);
    }
}
