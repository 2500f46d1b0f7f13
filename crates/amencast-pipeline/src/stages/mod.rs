//! The three bus-connected stages.

pub mod synthesis;
pub mod transcription;
pub mod translation;

pub use synthesis::SynthesisStage;
pub use transcription::TranscriptionStage;
pub use translation::TranslationStage;
