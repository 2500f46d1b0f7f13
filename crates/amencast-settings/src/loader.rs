//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`AmencastSettings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{AmencastSettings, RoomKind, StageKind};

/// Resolve the path to the settings file (`~/.amencast/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".amencast").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<AmencastSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<AmencastSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<AmencastSettings> {
    let defaults = serde_json::to_value(AmencastSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
///
/// Invalid values are logged and ignored (file/default value is kept).
pub fn apply_env_overrides(settings: &mut AmencastSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides_from<F>(settings: &mut AmencastSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Credentials ─────────────────────────────────────────────────
    if let Some(v) = env.string("ASSEMBLYAI_API_KEY") {
        settings.transcription.api_key = Some(v);
    }
    if let Some(v) = env.string("OPENAI_API_KEY") {
        settings.translation.api_key = Some(v);
    }
    if let Some(v) = env.string("ELEVENLABS_API_KEY") {
        settings.synthesis.api_key = Some(v);
    }
    if let Some(v) = env.string("LIVEKIT_API_KEY") {
        settings.room.api_key = Some(v);
    }
    if let Some(v) = env.string("LIVEKIT_API_SECRET") {
        settings.room.api_secret = Some(v);
    }

    // ── Transport and server ────────────────────────────────────────
    if let Some(v) = env.string("REDIS_URL") {
        settings.bus.redis_url = v;
    }
    if let Some(v) = env.u16("HEALTH_PORT", 1, 65535) {
        settings.server.health_port = v;
    }
    if let Some(v) = env.string("AMENCAST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("AMENCAST_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Translation ─────────────────────────────────────────────────
    if let Some(v) = env.string("OPENAI_MODEL") {
        settings.translation.model = v;
    }
    if let Some(v) = env.usize("TRANSLATION_CONTEXT_SIZE", 0, 50) {
        settings.translation.context_window = v;
    }
    if let Some(v) = env.f32("TRANSLATION_TEMPERATURE", 0.0, 2.0) {
        settings.translation.temperature = v;
    }

    // ── Synthesis and room ──────────────────────────────────────────
    if let Some(v) = env.string("ELEVENLABS_VOICE_ID") {
        settings.synthesis.default_voice_id = v;
    }
    if let Some(v) = env.string("LIVEKIT_URL") {
        settings.room.url = v;
        settings.room.kind = RoomKind::Livekit;
    }
}

/// Check that every enabled stage has the credentials it needs.
///
/// # Errors
///
/// Returns [`SettingsError::MissingCredential`] for the first gap found.
pub fn validate_credentials(settings: &AmencastSettings, stages: &[StageKind]) -> Result<()> {
    fn require(
        value: Option<&String>,
        stage: StageKind,
        env_var: &'static str,
    ) -> Result<()> {
        match value {
            Some(v) if !v.trim().is_empty() => Ok(()),
            _ => Err(SettingsError::MissingCredential {
                stage: stage.as_str(),
                env_var,
            }),
        }
    }

    for &stage in stages {
        match stage {
            StageKind::Transcription => require(
                settings.transcription.api_key.as_ref(),
                stage,
                "ASSEMBLYAI_API_KEY",
            )?,
            StageKind::Translation => {
                require(settings.translation.api_key.as_ref(), stage, "OPENAI_API_KEY")?;
                if settings.translation.context_window > 50 {
                    return Err(SettingsError::InvalidValue(format!(
                        "translation.contextWindow {} exceeds 50",
                        settings.translation.context_window
                    )));
                }
            }
            StageKind::Synthesis => {
                require(settings.synthesis.api_key.as_ref(), stage, "ELEVENLABS_API_KEY")?;
                if settings.room.kind == RoomKind::Livekit {
                    require(settings.room.api_key.as_ref(), stage, "LIVEKIT_API_KEY")?;
                    require(settings.room.api_secret.as_ref(), stage, "LIVEKIT_API_SECRET")?;
                }
            }
        }
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a finite `f32` within a range.
pub fn parse_f32_range(val: &str, min: f32, max: f32) -> Option<f32> {
    let n: f32 = val.parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> EnvReader<F> {
    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str) -> Option<String> {
        self.raw(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = self.raw(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = self.raw(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = self.raw(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }

    fn f32(&self, name: &str, min: f32, max: f32) -> Option<f32> {
        let val = self.raw(name)?;
        let result = parse_f32_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid float env var, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
