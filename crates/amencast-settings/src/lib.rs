//! # amencast-settings
//!
//! Layered configuration for AmenCast workers.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AmencastSettings::default()`]
//! 2. **User file**: `~/.amencast/settings.json` or an explicit path
//! 3. **Environment variables**: provider credentials and tuning overrides
//!
//! The loaded value is passed explicitly into each
//! stage at process start.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
    validate_credentials,
};
pub use types::*;
