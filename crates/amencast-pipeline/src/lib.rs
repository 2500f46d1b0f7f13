//! # amencast-pipeline
//!
//! The bus-connected stages of the translation pipeline and the plumbing
//! they share.
//!
//! - [`control`]: the control plane and [`StageCommand`] interpretation
//! - [`sequencer`]: per-stream ordered workers ([`StreamWorkers`])
//! - [`stage`]: the [`Stage`] contract
//! - [`stages`]: transcription, translation and synthesis
//!
//! Stages share nothing but the bus; any subset can run in one process.

#![deny(unsafe_code)]

pub mod control;
pub mod errors;
pub mod sequencer;
pub mod stage;
pub mod stages;

pub use control::{ControlPlane, StageCommand};
pub use errors::PipelineError;
pub use sequencer::{StreamProcessor, StreamWorker, StreamWorkers, WorkerExit, WorkerOutcome};
pub use stage::Stage;
pub use stages::{SynthesisStage, TranscriptionStage, TranslationStage};
