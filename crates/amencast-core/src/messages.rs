//! JSON payloads carried on the bus.
//!
//! Field names are camelCase on the wire to stay compatible with the
//! ingestion adapter and the web front end.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::MessageError;
use crate::ids::{ChunkId, StreamId};

/// Target language used when a `start` omits one.
pub const DEFAULT_TARGET_LANGUAGE: &str = "es";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// JSON encode/decode for bus payloads.
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Semantic checks applied after a successful parse.
    fn validate(&self) -> Result<(), MessageError> {
        Ok(())
    }

    /// Parse and validate a payload.
    fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let msg: Self = serde_json::from_slice(payload)?;
        msg.validate()?;
        Ok(msg)
    }

    /// Serialize to a bus payload.
    fn encode(&self) -> Result<Bytes, MessageError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

fn require_stream_id(id: &StreamId) -> Result<(), MessageError> {
    if id.trim().is_empty() {
        return Err(MessageError::EmptyField { field: "streamId" });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Control
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle action on the shared control channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    /// Create per-stream state in every stage.
    Start,
    /// Forced, immediate teardown.
    Stop,
    /// Legacy alias of [`ControlAction::Stop`].
    ForceStop,
    /// No more audio will arrive for the stream.
    IngestionComplete,
    /// The transcription stage has flushed its last segment.
    TranscriptionComplete,
    /// The translation stage has drained its queue.
    TranslationComplete,
    /// Any action this build does not understand.
    #[serde(other)]
    Unknown,
}

impl ControlAction {
    /// Whether this action forces an immediate teardown.
    #[must_use]
    pub fn is_stop(self) -> bool {
        matches!(self, Self::Stop | Self::ForceStop)
    }
}

/// Tagged command on `stream:control`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlMessage {
    /// What to do.
    pub action: ControlAction,
    /// Which stream.
    pub stream_id: StreamId,
    /// Target language, meaningful on `start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,
    /// Publish time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Terminal upstream failure carried by a completion signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlMessage {
    fn new(action: ControlAction, stream_id: StreamId) -> Self {
        Self {
            action,
            stream_id,
            target_language: None,
            timestamp: Some(now_millis()),
            error: None,
        }
    }

    /// `start` for a stream and language.
    #[must_use]
    pub fn start(stream_id: StreamId, target_language: impl Into<String>) -> Self {
        Self {
            target_language: Some(target_language.into()),
            ..Self::new(ControlAction::Start, stream_id)
        }
    }

    /// Forced `stop`.
    #[must_use]
    pub fn stop(stream_id: StreamId) -> Self {
        Self::new(ControlAction::Stop, stream_id)
    }

    /// `ingestion_complete`.
    #[must_use]
    pub fn ingestion_complete(stream_id: StreamId) -> Self {
        Self::new(ControlAction::IngestionComplete, stream_id)
    }

    /// `transcription_complete`, optionally carrying a terminal error.
    #[must_use]
    pub fn transcription_complete(stream_id: StreamId, error: Option<String>) -> Self {
        Self {
            error,
            ..Self::new(ControlAction::TranscriptionComplete, stream_id)
        }
    }

    /// `translation_complete`, optionally forwarding an upstream error.
    #[must_use]
    pub fn translation_complete(stream_id: StreamId, error: Option<String>) -> Self {
        Self {
            error,
            ..Self::new(ControlAction::TranslationComplete, stream_id)
        }
    }

    /// The requested language, or [`DEFAULT_TARGET_LANGUAGE`].
    #[must_use]
    pub fn language_or_default(&self) -> String {
        self.target_language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_TARGET_LANGUAGE)
            .to_owned()
    }
}

impl WireMessage for ControlMessage {
    fn validate(&self) -> Result<(), MessageError> {
        require_stream_id(&self.stream_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Public stream status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// Stream is being set up.
    Starting,
    /// Stream is live.
    Running,
    /// Stream finished normally.
    Completed,
    /// Stream failed.
    Error,
    /// Stream was stopped by request.
    Stopped,
}

/// Which service emitted a status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTag {
    /// Ingestion adapter.
    Ingestion,
    /// Speech-to-text.
    Stt,
    /// Translation.
    Translation,
    /// Speech synthesis and publishing.
    Tts,
}

/// Status update on `stream:status:{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMessage {
    /// New status.
    pub status: StatusKind,
    /// Emitting service.
    pub service: ServiceTag,
    /// Which stream.
    pub stream_id: StreamId,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Failure description when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form extra data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl StatusMessage {
    /// Build a status update stamped with the current time.
    #[must_use]
    pub fn new(status: StatusKind, service: ServiceTag, stream_id: StreamId) -> Self {
        Self {
            status,
            service,
            stream_id,
            timestamp: now_millis(),
            error: None,
            metadata: None,
        }
    }

    /// Attach an error description.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        let _ = self
            .metadata
            .get_or_insert_with(serde_json::Map::new)
            .insert(key.to_owned(), value);
        self
    }
}

impl WireMessage for StatusMessage {
    fn validate(&self) -> Result<(), MessageError> {
        require_stream_id(&self.stream_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Text payloads
// ─────────────────────────────────────────────────────────────────────────────

/// One finalized source-language segment on `text:transcribed:{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptMessage {
    /// Which stream.
    pub stream_id: StreamId,
    /// Segment identifier.
    pub chunk_id: ChunkId,
    /// Finalized text.
    pub text: String,
    /// Epoch milliseconds at finalization.
    pub timestamp: i64,
    /// Recognizer confidence, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl TranscriptMessage {
    /// New segment with a fresh chunk ID.
    #[must_use]
    pub fn new(stream_id: StreamId, text: impl Into<String>) -> Self {
        Self {
            stream_id,
            chunk_id: ChunkId::new(),
            text: text.into(),
            timestamp: now_millis(),
            confidence: None,
        }
    }
}

impl WireMessage for TranscriptMessage {
    fn validate(&self) -> Result<(), MessageError> {
        require_stream_id(&self.stream_id)
    }
}

/// One translated sentence on `text:translated:{id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    /// Which stream.
    pub stream_id: StreamId,
    /// Source segment identifier.
    pub chunk_id: ChunkId,
    /// Source-language text.
    pub source_text: String,
    /// Target-language text.
    pub translated_text: String,
    /// Epoch milliseconds at publication.
    pub timestamp: i64,
    /// Target language code.
    pub language_target: String,
}

impl WireMessage for TranslationResult {
    fn validate(&self) -> Result<(), MessageError> {
        require_stream_id(&self.stream_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn control_parses_original_shape() {
        let raw = br#"{"action":"start","streamId":"s1","targetLanguage":"it"}"#;
        let msg = ControlMessage::decode(raw).unwrap();
        assert_eq!(msg.action, ControlAction::Start);
        assert_eq!(msg.stream_id.as_str(), "s1");
        assert_eq!(msg.target_language.as_deref(), Some("it"));
        assert!(msg.timestamp.is_none());
    }

    #[test]
    fn control_unknown_action_is_tolerated() {
        let raw = br#"{"action":"pause","streamId":"s1"}"#;
        let msg = ControlMessage::decode(raw).unwrap();
        assert_eq!(msg.action, ControlAction::Unknown);
    }

    #[test]
    fn control_force_stop_is_stop() {
        let raw = br#"{"action":"force_stop","streamId":"s1"}"#;
        let msg = ControlMessage::decode(raw).unwrap();
        assert!(msg.action.is_stop());
        assert!(ControlAction::Stop.is_stop());
        assert!(!ControlAction::IngestionComplete.is_stop());
    }

    #[test]
    fn control_rejects_empty_stream_id() {
        let raw = br#"{"action":"stop","streamId":"  "}"#;
        assert_matches!(
            ControlMessage::decode(raw),
            Err(MessageError::EmptyField { field: "streamId" })
        );
    }

    #[test]
    fn control_rejects_garbage() {
        assert_matches!(ControlMessage::decode(b"nope"), Err(MessageError::Json(_)));
        assert_matches!(
            ControlMessage::decode(br#"{"streamId":"s1"}"#),
            Err(MessageError::Json(_))
        );
    }

    #[test]
    fn control_completion_wire_names() {
        let msg = ControlMessage::transcription_complete(StreamId::from("s1"), None);
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["action"], "transcription_complete");
        assert_eq!(json["streamId"], "s1");
        assert!(json.get("error").is_none());
        assert!(json.get("targetLanguage").is_none());

        let msg = ControlMessage::translation_complete(StreamId::from("s1"), Some("boom".into()));
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["action"], "translation_complete");
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn language_defaults_to_spanish() {
        let mut msg = ControlMessage::start(StreamId::from("s1"), "de");
        assert_eq!(msg.language_or_default(), "de");
        msg.target_language = None;
        assert_eq!(msg.language_or_default(), "es");
        msg.target_language = Some(" ".into());
        assert_eq!(msg.language_or_default(), "es");
    }

    #[test]
    fn status_wire_shape() {
        let msg = StatusMessage::new(StatusKind::Completed, ServiceTag::Tts, StreamId::from("s1"))
            .with_metadata("framesPublished", serde_json::json!(50));
        let json: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["service"], "tts");
        assert_eq!(json["streamId"], "s1");
        assert_eq!(json["metadata"]["framesPublished"], 50);
        assert!(json["timestamp"].is_i64());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn status_with_error() {
        let msg = StatusMessage::new(StatusKind::Error, ServiceTag::Stt, StreamId::from("s1"))
            .with_error("Failed to reconnect after 5 attempts.");
        let back = StatusMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(back.status, StatusKind::Error);
        assert_eq!(back.error.as_deref(), Some("Failed to reconnect after 5 attempts."));
    }

    #[test]
    fn transcript_parses_original_shape() {
        let raw = br#"{"streamId":"s1","chunkId":"c1","text":"Hello","timestamp":1700000000000}"#;
        let msg = TranscriptMessage::decode(raw).unwrap();
        assert_eq!(msg.text, "Hello");
        assert_eq!(msg.chunk_id.as_str(), "c1");
        assert!(msg.confidence.is_none());
    }

    #[test]
    fn translation_result_wire_names() {
        let result = TranslationResult {
            stream_id: StreamId::from("s1"),
            chunk_id: ChunkId::from("c1"),
            source_text: "Hello".into(),
            translated_text: "Hola".into(),
            timestamp: 1,
            language_target: "es".into(),
        };
        let json: serde_json::Value = serde_json::from_slice(&result.encode().unwrap()).unwrap();
        assert_eq!(json["sourceText"], "Hello");
        assert_eq!(json["translatedText"], "Hola");
        assert_eq!(json["languageTarget"], "es");
        assert_eq!(json["chunkId"], "c1");
    }
}
