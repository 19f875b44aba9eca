//! Persisted user preferences (ambient addition; spec.md has no counterpart
//! — SignalScribe's only per-run configuration was CLI flags). Scoped down
//! from the teacher's `whis-core::settings::Settings` to the handful of
//! values worth remembering between invocations in the same project
//! directory: last model choice and path overrides. Stored as hand-editable
//! TOML rather than JSON (the model catalog stays JSON; it's machine-written
//! and never meant to be hand-edited — see spec.md §6).

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    pub model: Option<String>,
    pub model_dir: Option<PathBuf>,
    pub csv_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Settings {
    /// `~/.config/signalscribe/settings.toml`.
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signalscribe")
            .join("settings.toml")
    }

    /// Missing or malformed settings are non-fatal: fall back to defaults,
    /// matching the catalog's own "corrupt is never fatal" posture (spec
    /// §4.1).
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    pub fn load_from(path: &std::path::Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScribeError::config(format!("failed to serialize settings: {e}")))?;
        fs::write(path, content)?;
        Ok(())
    }
}
