//! # amencast-transcription
//!
//! Streaming speech-to-text session management.
//!
//! - [`machine`]: the pure per-stream state machine (connect, keep-alive,
//!   bounded reconnect, graceful vs. forced stop)
//! - [`session`]: the task that drives one machine against an upstream
//! - [`manager`]: [`TranscriptionManager`], at most one session per stream
//! - [`upstream`]: the [`SpeechToText`] provider seam
//! - [`assemblyai`]: the AssemblyAI v3 WebSocket provider

#![deny(unsafe_code)]

pub mod assemblyai;
pub mod errors;
pub mod machine;
pub mod manager;
pub mod session;
pub mod upstream;

pub use assemblyai::AssemblyAi;
pub use errors::TranscriptionError;
pub use machine::{SessionAction, SessionEvent, SessionMachine, SessionStatus};
pub use manager::TranscriptionManager;
pub use session::{SessionConfig, TranscriptionEvent};
pub use upstream::{SpeechToText, UpstreamCommand, UpstreamEvent, UpstreamPeer, UpstreamSession};
