//! Per-stream session driver.
//!
//! One task per stream owns the [`SessionMachine`], the upstream handles and
//! every timer. Dropping the task (or reaching a terminal state) drops the
//! keep-alive interval with it, so no timer outlives its session.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use amencast_core::{ReconnectPolicy, StreamId};
use amencast_settings::TranscriptionSettings;

use crate::errors::TranscriptionError;
use crate::machine::{SessionAction, SessionEvent, SessionMachine};
use crate::upstream::{SpeechToText, UpstreamCommand, UpstreamEvent, UpstreamSession};

type ConnectFuture =
    Pin<Box<dyn Future<Output = Result<UpstreamSession, TranscriptionError>> + Send>>;

/// Timing and retry parameters for a session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Keep-alive check period; also the idle threshold for injecting silence.
    pub keep_alive_interval: Duration,
    /// Silence block sent by the keep-alive.
    pub silence: Bytes,
    /// Reconnect policy for abnormal closes.
    pub reconnect: ReconnectPolicy,
}

impl SessionConfig {
    /// Derive the session parameters from settings.
    pub fn from_settings(settings: &TranscriptionSettings) -> Self {
        Self {
            keep_alive_interval: Duration::from_millis(settings.keep_alive_interval_ms),
            silence: amencast_core::audio::silence(settings.keep_alive_silence_ms),
            reconnect: settings.reconnect.clone(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&TranscriptionSettings::default())
    }
}

/// Input from the manager to a session task.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Audio(Bytes),
    AudioEnded,
    Stop,
}

/// Output from a session task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptionEvent {
    /// A finalized, non-empty transcript segment.
    Transcript {
        /// Owning stream.
        stream_id: StreamId,
        /// Segment text.
        text: String,
    },
    /// The session ended on its own (graceful close or reconnect exhaustion).
    ///
    /// Never emitted for a forced stop.
    Completed {
        /// Owning stream.
        stream_id: StreamId,
        /// Session generation, for releasing the right registry entry.
        session: u64,
        /// Terminal error, if any.
        error: Option<String>,
    },
}

pub(crate) struct SessionTask {
    stream_id: StreamId,
    generation: u64,
    machine: SessionMachine,
    config: SessionConfig,
    connector: Arc<dyn SpeechToText>,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<TranscriptionEvent>,

    upstream: Option<UpstreamSession>,
    pending_connect: Option<ConnectFuture>,
    reconnect_at: Option<Instant>,
    keep_alive: Option<Interval>,
    last_activity: Instant,
}

impl SessionTask {
    pub(crate) fn new(
        stream_id: StreamId,
        generation: u64,
        config: SessionConfig,
        connector: Arc<dyn SpeechToText>,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        events: mpsc::UnboundedSender<TranscriptionEvent>,
    ) -> Self {
        Self {
            stream_id,
            generation,
            machine: SessionMachine::new(config.reconnect.clone()),
            config,
            connector,
            commands,
            events,
            upstream: None,
            pending_connect: None,
            reconnect_at: None,
            keep_alive: None,
            last_activity: Instant::now(),
        }
    }

    pub(crate) async fn run(mut self) {
        self.apply(SessionEvent::Start);

        while !self.machine.is_terminal() {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::Audio(chunk)) => self.forward_audio(chunk),
                    Some(SessionCommand::AudioEnded) => self.apply(SessionEvent::AudioEnded),
                    Some(SessionCommand::Stop) | None => self.apply(SessionEvent::StopRequested),
                },
                result = next_connect(&mut self.pending_connect) => {
                    self.pending_connect = None;
                    match result {
                        Ok(session) => {
                            self.upstream = Some(session);
                            self.apply(SessionEvent::Connected);
                        }
                        Err(e) => {
                            warn!(stream_id = %self.stream_id, error = %e, "upstream connect failed");
                            self.apply(SessionEvent::ConnectFailed);
                        }
                    }
                }
                event = next_upstream_event(&mut self.upstream) => self.on_upstream(event),
                () = sleep_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.apply(SessionEvent::ReconnectDue);
                }
                () = next_tick(&mut self.keep_alive) => self.keep_alive_tick(),
            }
        }

        debug!(stream_id = %self.stream_id, status = ?self.machine.status(), "session task finished");
    }

    fn apply(&mut self, event: SessionEvent) {
        let before = self.machine.status();
        let actions = self.machine.handle(event.clone());
        trace!(
            stream_id = %self.stream_id,
            ?event,
            from = ?before,
            to = ?self.machine.status(),
            "session transition"
        );
        for action in actions {
            self.execute(action);
        }
    }

    fn execute(&mut self, action: SessionAction) {
        match action {
            SessionAction::Connect => {
                let connector = Arc::clone(&self.connector);
                let stream_id = self.stream_id.clone();
                self.pending_connect =
                    Some(Box::pin(async move { connector.connect(&stream_id).await }));
            }
            SessionAction::ScheduleReconnect { attempt, delay } => {
                info!(
                    stream_id = %self.stream_id,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "abnormal disconnect, reconnect scheduled"
                );
                self.upstream = None;
                self.reconnect_at = Some(Instant::now() + delay);
            }
            SessionAction::CancelPending => {
                self.pending_connect = None;
                self.reconnect_at = None;
            }
            SessionAction::StartKeepAlive => {
                let period = self.config.keep_alive_interval;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.keep_alive = Some(interval);
                self.last_activity = Instant::now();
                info!(stream_id = %self.stream_id, "upstream connected");
            }
            SessionAction::StopKeepAlive => self.keep_alive = None,
            SessionAction::CloseGracefully => {
                if let Some(up) = &self.upstream {
                    let _ = up.commands.send(UpstreamCommand::Close);
                }
            }
            SessionAction::Abort => {
                if let Some(up) = self.upstream.take() {
                    let _ = up.commands.send(UpstreamCommand::Abort);
                }
            }
            SessionAction::Complete { error } => {
                match &error {
                    Some(e) => warn!(stream_id = %self.stream_id, error = %e, "session failed"),
                    None => info!(stream_id = %self.stream_id, "session completed"),
                }
                let _ = self.events.send(TranscriptionEvent::Completed {
                    stream_id: self.stream_id.clone(),
                    session: self.generation,
                    error,
                });
            }
            SessionAction::Release => {
                self.keep_alive = None;
                self.pending_connect = None;
                self.reconnect_at = None;
                self.upstream = None;
            }
        }
    }

    fn forward_audio(&mut self, chunk: Bytes) {
        if !self.machine.accepts_audio() {
            trace!(stream_id = %self.stream_id, status = ?self.machine.status(), "audio dropped");
            return;
        }
        if let Some(up) = &self.upstream {
            let _ = up.commands.send(UpstreamCommand::Audio(chunk));
            self.last_activity = Instant::now();
        }
    }

    fn keep_alive_tick(&mut self) {
        if !self.machine.accepts_audio() {
            return;
        }
        if self.last_activity.elapsed() >= self.config.keep_alive_interval {
            if let Some(up) = &self.upstream {
                debug!(stream_id = %self.stream_id, "idle upstream, sending keep-alive silence");
                let _ = up.commands.send(UpstreamCommand::Audio(self.config.silence.clone()));
            }
        }
    }

    fn on_upstream(&mut self, event: Option<UpstreamEvent>) {
        match event {
            Some(UpstreamEvent::Transcript(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return;
                }
                debug!(stream_id = %self.stream_id, chars = trimmed.len(), "final transcript");
                let _ = self.events.send(TranscriptionEvent::Transcript {
                    stream_id: self.stream_id.clone(),
                    text: trimmed.to_owned(),
                });
            }
            Some(UpstreamEvent::Error(message)) => {
                warn!(stream_id = %self.stream_id, error = %message, "upstream reported an error");
            }
            Some(UpstreamEvent::Closed { code, reason }) => {
                info!(stream_id = %self.stream_id, code, reason = %reason, "upstream closed");
                self.upstream = None;
                self.apply(SessionEvent::Closed { code });
            }
            None => {
                self.upstream = None;
                self.apply(SessionEvent::Closed { code: 1006 });
            }
        }
    }
}

// ── Optional-source helpers for select! ─────────────────────────────────────

async fn next_connect(
    pending: &mut Option<ConnectFuture>,
) -> Result<UpstreamSession, TranscriptionError> {
    match pending {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_upstream_event(upstream: &mut Option<UpstreamSession>) -> Option<UpstreamEvent> {
    match upstream {
        Some(up) => up.events.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            let _ = i.tick().await;
        }
        None => std::future::pending().await,
    }
}
