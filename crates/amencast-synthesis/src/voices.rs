//! Per-language voice selection.

use std::collections::BTreeMap;

use amencast_settings::SynthesisSettings;

/// Maps a target language to a synthesis voice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceMap {
    default_voice: String,
    by_language: BTreeMap<String, String>,
}

impl VoiceMap {
    /// Build from settings. Language keys are lowercased.
    pub fn from_settings(settings: &SynthesisSettings) -> Self {
        Self::new(
            settings.default_voice_id.clone(),
            settings
                .voices
                .iter()
                .map(|(lang, voice)| (lang.clone(), voice.clone())),
        )
    }

    /// Build from a default voice and `(language, voice)` overrides.
    pub fn new(
        default_voice: impl Into<String>,
        voices: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let by_language = voices
            .into_iter()
            .filter(|(_, voice)| !voice.is_empty())
            .map(|(lang, voice)| (lang.to_ascii_lowercase(), voice))
            .collect();
        Self {
            default_voice: default_voice.into(),
            by_language,
        }
    }

    /// Voice for `language`, falling back to the default.
    pub fn voice_for(&self, language: &str) -> &str {
        self.by_language
            .get(&language.to_ascii_lowercase())
            .unwrap_or(&self.default_voice)
    }
}
