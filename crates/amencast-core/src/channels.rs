//! Message bus channel names.
//!
//! Every per-stream channel is `{prefix}{streamId}`; the control channel is
//! shared. Consumers subscribe with the `*` patterns in [`patterns`] and
//! recover the stream from the concrete channel name via [`Channel::parse`].

use crate::ids::StreamId;

/// Prefix of the raw PCM audio channel.
pub const AUDIO_RAW_PREFIX: &str = "audio:raw:";
/// Prefix of the synthesized audio channel.
pub const AUDIO_SYNTHESIZED_PREFIX: &str = "audio:synthesized:";
/// Prefix of the finalized transcript channel.
pub const TEXT_TRANSCRIBED_PREFIX: &str = "text:transcribed:";
/// Prefix of the translated text channel.
pub const TEXT_TRANSLATED_PREFIX: &str = "text:translated:";
/// Prefix of the per-stream status channel.
pub const STREAM_STATUS_PREFIX: &str = "stream:status:";
/// The shared lifecycle control channel.
pub const STREAM_CONTROL: &str = "stream:control";

/// Subscription patterns matching every stream.
pub mod patterns {
    /// All raw audio channels.
    pub const AUDIO_RAW: &str = "audio:raw:*";
    /// All synthesized audio channels.
    pub const AUDIO_SYNTHESIZED: &str = "audio:synthesized:*";
    /// All finalized transcript channels.
    pub const TEXT_TRANSCRIBED: &str = "text:transcribed:*";
    /// All translated text channels.
    pub const TEXT_TRANSLATED: &str = "text:translated:*";
    /// All status channels.
    pub const STREAM_STATUS: &str = "stream:status:*";
    /// The control channel (an exact name is a valid pattern).
    pub const STREAM_CONTROL: &str = super::STREAM_CONTROL;
}

/// A concrete, typed bus channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Raw PCM from the ingestion adapter.
    AudioRaw(StreamId),
    /// Synthesized PCM frames.
    AudioSynthesized(StreamId),
    /// Finalized source-language transcript segments.
    TextTranscribed(StreamId),
    /// Translation results.
    TextTranslated(StreamId),
    /// Stream status updates.
    Status(StreamId),
    /// Shared lifecycle control channel.
    Control,
}

impl Channel {
    /// Render the wire channel name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::AudioRaw(id) => format!("{AUDIO_RAW_PREFIX}{id}"),
            Self::AudioSynthesized(id) => format!("{AUDIO_SYNTHESIZED_PREFIX}{id}"),
            Self::TextTranscribed(id) => format!("{TEXT_TRANSCRIBED_PREFIX}{id}"),
            Self::TextTranslated(id) => format!("{TEXT_TRANSLATED_PREFIX}{id}"),
            Self::Status(id) => format!("{STREAM_STATUS_PREFIX}{id}"),
            Self::Control => STREAM_CONTROL.to_owned(),
        }
    }

    /// Parse a wire channel name.
    ///
    /// Returns `None` for unknown prefixes and for per-stream channels with
    /// an empty stream ID.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == STREAM_CONTROL {
            return Some(Self::Control);
        }
        let table: [(&str, fn(StreamId) -> Self); 5] = [
            (AUDIO_RAW_PREFIX, Self::AudioRaw),
            (AUDIO_SYNTHESIZED_PREFIX, Self::AudioSynthesized),
            (TEXT_TRANSCRIBED_PREFIX, Self::TextTranscribed),
            (TEXT_TRANSLATED_PREFIX, Self::TextTranslated),
            (STREAM_STATUS_PREFIX, Self::Status),
        ];
        table.iter().find_map(|(prefix, make)| {
            name.strip_prefix(prefix)
                .filter(|rest| !rest.is_empty())
                .map(|rest| make(StreamId::from(rest)))
        })
    }

    /// The stream this channel belongs to, if any.
    #[must_use]
    pub fn stream_id(&self) -> Option<&StreamId> {
        match self {
            Self::AudioRaw(id)
            | Self::AudioSynthesized(id)
            | Self::TextTranscribed(id)
            | Self::TextTranslated(id)
            | Self::Status(id) => Some(id),
            Self::Control => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}
