//! Registry of live transcription sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use amencast_core::{SessionRegistry, StreamId};

use crate::session::{SessionCommand, SessionConfig, SessionTask, TranscriptionEvent};
use crate::upstream::SpeechToText;

struct SessionHandle {
    generation: u64,
    commands: mpsc::UnboundedSender<SessionCommand>,
    task: JoinHandle<()>,
}

/// Owns at most one upstream session per stream.
///
/// Output (transcripts and completions) arrives on the receiver returned by
/// [`TranscriptionManager::new`]. A completed session stays registered until
/// the owner calls [`TranscriptionManager::release`] with its generation.
pub struct TranscriptionManager {
    connector: Arc<dyn SpeechToText>,
    config: SessionConfig,
    sessions: SessionRegistry<SessionHandle>,
    next_generation: AtomicU64,
    events: mpsc::UnboundedSender<TranscriptionEvent>,
}

impl TranscriptionManager {
    /// Create a manager and the receiver its sessions report on.
    pub fn new(
        connector: Arc<dyn SpeechToText>,
        config: SessionConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TranscriptionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                connector,
                config,
                sessions: SessionRegistry::new(),
                next_generation: AtomicU64::new(1),
                events,
            },
            rx,
        )
    }

    /// Start a session for `stream_id`.
    ///
    /// Returns `false` (and does nothing) if one already exists.
    pub fn start_stream(&self, stream_id: &StreamId) -> bool {
        if self.sessions.contains(stream_id) {
            warn!(stream_id = %stream_id, "stream already active, ignoring start");
            return false;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let task = SessionTask::new(
            stream_id.clone(),
            generation,
            self.config.clone(),
            Arc::clone(&self.connector),
            rx,
            self.events.clone(),
        );
        let handle = SessionHandle {
            generation,
            commands: tx,
            task: tokio::spawn(task.run()),
        };
        if let Err(rejected) = self.sessions.insert_new(stream_id.clone(), handle) {
            rejected.task.abort();
            warn!(stream_id = %stream_id, "stream already active, ignoring start");
            return false;
        }
        info!(stream_id = %stream_id, session = generation, "transcription session started");
        true
    }

    /// Forward a raw audio chunk. Dropped unless the session is connected.
    pub fn send_audio(&self, stream_id: &StreamId, chunk: Bytes) -> bool {
        self.sessions
            .with(stream_id, |h| h.commands.send(SessionCommand::Audio(chunk)).is_ok())
            .unwrap_or(false)
    }

    /// Graceful end: flush upstream, then complete once it closes.
    pub fn signal_audio_end(&self, stream_id: &StreamId) -> bool {
        let sent = self
            .sessions
            .with(stream_id, |h| h.commands.send(SessionCommand::AudioEnded).is_ok())
            .unwrap_or(false);
        if sent {
            info!(stream_id = %stream_id, "audio ended, waiting for final transcripts");
        } else {
            warn!(stream_id = %stream_id, "audio end for inactive stream");
        }
        sent
    }

    /// Forced stop: abort upstream and release immediately. Never completes.
    pub fn stop_stream(&self, stream_id: &StreamId) -> bool {
        let Some(handle) = self.sessions.remove(stream_id) else {
            debug!(stream_id = %stream_id, "stop for inactive stream");
            return false;
        };
        if handle.commands.send(SessionCommand::Stop).is_err() {
            // Task already gone; nothing upstream to tear down.
            handle.task.abort();
        }
        info!(stream_id = %stream_id, session = handle.generation, "transcription session stopped");
        true
    }

    /// Drop the registry entry for a session that reported completion.
    ///
    /// A newer session for the same stream is left alone.
    pub fn release(&self, stream_id: &StreamId, session: u64) -> bool {
        self.sessions
            .remove_if(stream_id, |h| h.generation == session)
            .is_some()
    }

    /// Whether `stream_id` has a registered session.
    pub fn is_active(&self, stream_id: &StreamId) -> bool {
        self.sessions.contains(stream_id)
    }

    /// Number of registered sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    /// Stop every session.
    pub fn stop_all(&self) {
        for (stream_id, handle) in self.sessions.drain() {
            let _ = handle.commands.send(SessionCommand::Stop);
            debug!(stream_id = %stream_id, "session stopped on shutdown");
        }
    }
}
