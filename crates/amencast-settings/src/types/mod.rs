//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. `#[serde(default)]` allows partial
//! JSON: missing fields get their default during deserialization.

mod runtime;
mod stages;

pub use runtime::*;
pub use stages::*;

use serde::{Deserialize, Serialize};

/// Root settings for an AmenCast worker process.
///
/// Loaded from `~/.amencast/settings.json` with defaults applied for
/// missing fields. Environment variables override specific values.
///
/// ```json
/// {
///   "translation": { "contextWindow": 5 },
///   "room": { "kind": "livekit", "url": "wss://example.livekit.cloud" }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AmencastSettings {
    /// Settings schema version.
    pub version: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Message bus transport.
    pub bus: BusSettings,
    /// Health server and shutdown.
    pub server: ServerSettings,
    /// Speech-to-text sessions.
    pub transcription: TranscriptionSettings,
    /// Translation service and context window.
    pub translation: TranslationSettings,
    /// Speech synthesis service.
    pub synthesis: SynthesisSettings,
    /// Media room publishing.
    pub room: RoomSettings,
}

impl Default for AmencastSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            logging: LoggingSettings::default(),
            bus: BusSettings::default(),
            server: ServerSettings::default(),
            transcription: TranscriptionSettings::default(),
            translation: TranslationSettings::default(),
            synthesis: SynthesisSettings::default(),
            room: RoomSettings::default(),
        }
    }
}
