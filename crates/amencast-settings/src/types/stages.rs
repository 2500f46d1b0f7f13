//! Per-stage provider settings.
//!
//! API keys are never serialized back out; they come from the settings file
//! or, more usually, from the environment.

use std::collections::BTreeMap;

use amencast_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

/// A pipeline stage that can be enabled in a worker process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    /// Speech-to-text session manager.
    Transcription,
    /// Sequenced translation.
    Translation,
    /// Speech synthesis and room publishing.
    Synthesis,
}

impl StageKind {
    /// All stages in pipeline order.
    pub const ALL: [Self; 3] = [Self::Transcription, Self::Translation, Self::Synthesis];

    /// Lowercase stage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transcription => "transcription",
            Self::Translation => "translation",
            Self::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transcription" | "stt" => Ok(Self::Transcription),
            "translation" => Ok(Self::Translation),
            "synthesis" | "tts" => Ok(Self::Synthesis),
            other => Err(format!("unknown stage: {other}")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transcription
// ─────────────────────────────────────────────────────────────────────────────

/// Streaming speech-to-text settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionSettings {
    /// Provider API key (`ASSEMBLYAI_API_KEY`).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// WebSocket endpoint, without query string.
    pub base_url: String,
    /// Sample rate announced to the provider.
    pub sample_rate: u32,
    /// Keep-alive check interval in milliseconds.
    pub keep_alive_interval_ms: u64,
    /// Duration of the injected silence block in milliseconds.
    pub keep_alive_silence_ms: u32,
    /// Reconnect policy for abnormal closes.
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single connect attempt.
    pub connect_timeout_ms: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "wss://streaming.assemblyai.com/v3/ws".to_string(),
            sample_rate: amencast_core::SAMPLE_RATE,
            keep_alive_interval_ms: 5000,
            keep_alive_silence_ms: 100,
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: 10_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation
// ─────────────────────────────────────────────────────────────────────────────

/// Chat-completions translation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranslationSettings {
    /// Provider API key (`OPENAI_API_KEY`).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL including the version segment.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of prior source sentences kept as context.
    pub context_window: usize,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.3,
            context_window: 3,
            timeout_ms: 30_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthesis
// ─────────────────────────────────────────────────────────────────────────────

/// Text-to-speech settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesisSettings {
    /// Provider API key (`ELEVENLABS_API_KEY`).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Synthesis model.
    pub model_id: String,
    /// Voice used when no per-language voice is configured.
    pub default_voice_id: String,
    /// Per-language voice overrides keyed by language code.
    pub voices: BTreeMap<String, String>,
    /// Requested output format (`mp3_44100_128`, `pcm_16000`, ...).
    pub output_format: String,
    /// Voice stability.
    pub stability: f32,
    /// Voice similarity boost.
    pub similarity_boost: f32,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.elevenlabs.io".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            default_voice_id: "JBFqnCBsd6RMkjVDRZzb".to_string(),
            voices: BTreeMap::new(),
            output_format: "mp3_44100_128".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
            timeout_ms: 30_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Room
// ─────────────────────────────────────────────────────────────────────────────

/// Media room backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    /// Frames are published on `audio:synthesized:{streamId}`.
    #[default]
    Bus,
    /// LiveKit room (requires the `livekit` feature).
    Livekit,
}

/// Media room settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Backend kind.
    pub kind: RoomKind,
    /// Room server URL.
    pub url: String,
    /// Room API key (`LIVEKIT_API_KEY`).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Room API secret (`LIVEKIT_API_SECRET`).
    #[serde(skip_serializing)]
    pub api_secret: Option<String>,
    /// Published track name.
    pub track_name: String,
    /// Participant identity prefix; the stream id is appended.
    pub identity_prefix: String,
    /// Participant display name.
    pub participant_name: String,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            kind: RoomKind::default(),
            url: "ws://127.0.0.1:7880".to_string(),
            api_key: None,
            api_secret: None,
            track_name: "translated-audio".to_string(),
            identity_prefix: "tts-bot-".to_string(),
            participant_name: "Amencast TTS Bot".to_string(),
        }
    }
}
