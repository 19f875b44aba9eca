//! The model catalog data model (spec §3): `ModelCatalog` / `ModelEntry`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A single asset (the `.bin` file, or the optional CoreML archive).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub filename: String,
    pub url: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Per-model catalog entry. `coreml` is only populated on platforms that
/// use it (macOS).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEntry {
    pub bin: Asset,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub coreml: Option<Asset>,
}

impl ModelEntry {
    /// Whether this entry requires a CoreML asset on the current platform.
    pub fn needs_coreml(&self) -> bool {
        cfg!(target_os = "macos") && self.coreml.is_some()
    }
}

/// Mapping from model name to `ModelEntry`, persisted as JSON at
/// `<model_dir>/models.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelCatalog(pub HashMap<String, ModelEntry>);

impl ModelCatalog {
    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.0.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    /// Validate every entry has the fields the spec requires (non-empty
    /// url/sha256, a coreml entry on platforms that need it). Returns the
    /// names of entries that fail validation.
    pub fn validate(&self) -> Vec<String> {
        self.0
            .iter()
            .filter(|(_, entry)| {
                entry.bin.url.is_empty()
                    || entry.bin.sha256.is_empty()
                    || (cfg!(target_os = "macos") && entry.coreml.is_none())
            })
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Derived presence check: does the asset exist on disk at `model_dir`.
/// This is *not* stored on `Asset` — spec §3 marks `present` as derived.
pub fn asset_present(model_dir: &Path, asset: &Asset) -> bool {
    model_dir.join(&asset.filename).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(url: &str, sha: &str) -> ModelEntry {
        ModelEntry {
            bin: Asset {
                filename: "m.bin".into(),
                url: url.into(),
                size_bytes: 100,
                sha256: sha.into(),
            },
            coreml: None,
        }
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let mut catalog = ModelCatalog::default();
        catalog
            .0
            .insert("m1".into(), sample_entry("https://x/m.bin", "abc"));
        let json = serde_json::to_string(&catalog).unwrap();
        let back: ModelCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("m1").unwrap().bin.sha256, "abc");
    }

    #[test]
    fn validate_flags_missing_url_or_sha() {
        let mut catalog = ModelCatalog::default();
        catalog.0.insert("bad".into(), sample_entry("", ""));
        let bad = catalog.validate();
        assert_eq!(bad, vec!["bad".to_string()]);
    }
}
