//! # amencast-core
//!
//! Shared vocabulary for every AmenCast pipeline stage.
//!
//! - **IDs**: [`StreamId`] and [`ChunkId`] newtypes
//! - **Channels**: parametric bus channel names and subscription patterns
//! - **Messages**: control, status, transcript and translation payloads
//! - **Audio**: the canonical 16 kHz mono 20 ms frame and PCM helpers
//! - **Registry**: [`SessionRegistry`], the per-stage map of live streams
//! - **Retry**: the fixed-delay reconnect policy used by upstream sessions
//! - **Logging**: [`logging::init_subscriber`]

#![deny(unsafe_code)]

pub mod audio;
pub mod channels;
pub mod errors;
pub mod ids;
pub mod logging;
pub mod messages;
pub mod registry;
pub mod retry;

pub use audio::{AudioFrame, CHANNELS, FRAME_DURATION_MS, SAMPLE_RATE, SAMPLES_PER_FRAME};
pub use errors::MessageError;
pub use ids::{ChunkId, StreamId};
pub use messages::{
    ControlAction, ControlMessage, ServiceTag, StatusKind, StatusMessage, TranscriptMessage,
    TranslationResult, WireMessage, now_millis,
};
pub use registry::SessionRegistry;
pub use retry::ReconnectPolicy;
