//! Per-stream session state machine.
//!
//! A pure transition function: feed a [`SessionEvent`], get back the
//! [`SessionAction`]s the driver must perform. No I/O or timers live here.

use std::time::Duration;

use amencast_core::ReconnectPolicy;

/// Close codes that end a session without reconnecting.
pub const NORMAL_CLOSE_CODES: [u16; 2] = [1000, 1005];
/// Close code recorded for a connect attempt that failed outright.
pub const CONNECT_FAILED_CODE: u16 = 4000;

/// Lifecycle status of one stream's upstream session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Created, not yet connecting.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Upstream is open and accepting audio.
    Connected,
    /// Waiting out the reconnect delay.
    Reconnecting,
    /// End of audio signalled, waiting for upstream to close.
    Stopping,
    /// Finished (gracefully or by forced stop).
    Completed,
    /// Finished after the reconnect cap was exceeded.
    Error,
}

/// Inputs to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Begin the first connect.
    Start,
    /// The pending connect succeeded.
    Connected,
    /// The pending connect failed.
    ConnectFailed,
    /// Upstream closed with `code`.
    Closed {
        /// WebSocket close code.
        code: u16,
    },
    /// The reconnect delay elapsed.
    ReconnectDue,
    /// No more audio will arrive (graceful).
    AudioEnded,
    /// Forced stop.
    StopRequested,
}

/// Side effects requested by the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Start a connect attempt.
    Connect,
    /// Arm the reconnect timer.
    ScheduleReconnect {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before connecting.
        delay: Duration,
    },
    /// Drop any in-flight connect and disarm the reconnect timer.
    CancelPending,
    /// Start the keep-alive timer.
    StartKeepAlive,
    /// Stop the keep-alive timer.
    StopKeepAlive,
    /// Ask upstream to flush and close.
    CloseGracefully,
    /// Tear upstream down immediately.
    Abort,
    /// Fire the completion callback.
    Complete {
        /// Terminal error, if the session failed.
        error: Option<String>,
    },
    /// Drop the session from the registry.
    Release,
}

/// Transition state for one stream.
#[derive(Clone, Debug)]
pub struct SessionMachine {
    status: SessionStatus,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl SessionMachine {
    /// New idle machine.
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            status: SessionStatus::Idle,
            attempts: 0,
            policy,
        }
    }

    /// Current status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Reconnect attempts since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether audio should be forwarded upstream.
    pub fn accepts_audio(&self) -> bool {
        self.status == SessionStatus::Connected
    }

    /// Whether the session has finished.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Completed | SessionStatus::Error)
    }

    /// Apply `event` and return the actions to perform, in order.
    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        use SessionAction as A;
        use SessionEvent as E;
        use SessionStatus as S;

        match (self.status, event) {
            (S::Completed | S::Error, _) => Vec::new(),

            (S::Idle, E::Start) | (S::Reconnecting, E::ReconnectDue) => {
                self.status = S::Connecting;
                vec![A::Connect]
            }

            (S::Connecting, E::Connected) => {
                self.status = S::Connected;
                self.attempts = 0;
                vec![A::StartKeepAlive]
            }
            (S::Connecting, E::ConnectFailed) => self.disconnected(CONNECT_FAILED_CODE),
            (S::Connecting, E::Closed { code }) => self.disconnected(code),

            (S::Connected, E::Closed { code }) => {
                let mut actions = vec![A::StopKeepAlive];
                actions.extend(self.disconnected(code));
                actions
            }
            (S::Connected, E::AudioEnded) => {
                self.status = S::Stopping;
                vec![A::StopKeepAlive, A::CloseGracefully]
            }

            // Upstream finished flushing; any close code is final here.
            (S::Stopping, E::Closed { .. } | E::ConnectFailed) => self.finish(None),

            // Nothing is open, so there is nothing left to flush.
            (S::Idle, E::AudioEnded) => self.finish(None),
            (S::Connecting | S::Reconnecting, E::AudioEnded) => {
                let mut actions = vec![A::CancelPending];
                actions.extend(self.finish(None));
                actions
            }

            (status, E::StopRequested) => {
                let mut actions = match status {
                    S::Connected => vec![A::StopKeepAlive, A::Abort],
                    S::Stopping => vec![A::Abort],
                    S::Connecting | S::Reconnecting => vec![A::CancelPending],
                    _ => Vec::new(),
                };
                actions.push(A::Release);
                self.status = S::Completed;
                actions
            }

            _ => Vec::new(),
        }
    }

    fn disconnected(&mut self, code: u16) -> Vec<SessionAction> {
        if NORMAL_CLOSE_CODES.contains(&code) {
            return self.finish(None);
        }
        if self.policy.allows(self.attempts) {
            self.attempts += 1;
            self.status = SessionStatus::Reconnecting;
            return vec![SessionAction::ScheduleReconnect {
                attempt: self.attempts,
                delay: self.policy.delay(),
            }];
        }
        self.status = SessionStatus::Error;
        vec![
            SessionAction::Complete {
                error: Some(self.policy.exhausted_message()),
            },
            SessionAction::Release,
        ]
    }

    fn finish(&mut self, error: Option<String>) -> Vec<SessionAction> {
        self.status = SessionStatus::Completed;
        vec![SessionAction::Complete { error }, SessionAction::Release]
    }
}
