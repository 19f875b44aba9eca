//! Reconciles the local model directory against a remote catalog (spec
//! §4.1). Grounded on `original_source/SignalScribe/model.py`'s
//! `ModelManager` and the teacher's temp-then-rename download pattern.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{Result, ScribeError};
use crate::model::catalog::CatalogSource;
use crate::model::types::{asset_present, Asset, ModelCatalog, ModelEntry};

const CATALOG_FILENAME: &str = "models.json";

/// Progress callback: (downloaded_bytes, total_bytes).
pub type ProgressFn<'a> = dyn Fn(u64, u64) + 'a;

/// Interactive confirmation callback, so the CLI can prompt and tests/
/// non-interactive callers can force-accept.
pub type ConfirmFn<'a> = dyn Fn(&str) -> bool + 'a;

pub struct ModelManager {
    model_dir: PathBuf,
    catalog: ModelCatalog,
}

impl ModelManager {
    /// Construction contract (spec §4.1): ensure the directory exists,
    /// load or fetch the catalog, mark presence by file existence only
    /// (hashing is deferred to `select`).
    pub fn new(
        model_dir: Option<PathBuf>,
        refresh_catalog: bool,
        source: &dyn CatalogSource,
    ) -> Result<Self> {
        let model_dir = model_dir.unwrap_or_else(default_model_dir);
        fs::create_dir_all(&model_dir)?;

        let catalog_path = model_dir.join(CATALOG_FILENAME);
        let local = read_catalog(&catalog_path).and_then(|catalog| {
            let invalid = catalog.validate();
            if invalid.is_empty() {
                Some(catalog)
            } else {
                tracing::warn!(entries = ?invalid, "local catalog failed validation, treating as missing");
                None
            }
        });

        let catalog = match (local, refresh_catalog) {
            (Some(catalog), false) => catalog,
            (local, _) => match source.fetch() {
                Ok(entries) => {
                    let catalog = ModelCatalog(entries);
                    write_catalog_atomic(&catalog_path, &catalog)?;
                    catalog
                }
                Err(e) => {
                    if let Some(catalog) = local {
                        tracing::warn!(error = %e, "catalog refresh failed, falling back to local copy");
                        catalog
                    } else {
                        return Err(ScribeError::model(format!(
                            "no valid local catalog and remote fetch failed: {e}"
                        )));
                    }
                }
            },
        };

        Ok(Self { model_dir, catalog })
    }

    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// `Select(name) -> path` (spec §4.1): ensures every required asset is
    /// present and verified, returns the absolute path to the `.bin`.
    pub fn select(
        &self,
        name: &str,
        force_accept: bool,
        confirm: &ConfirmFn,
        progress: &ProgressFn,
    ) -> Result<PathBuf> {
        let entry = self
            .catalog
            .get(name)
            .ok_or_else(|| ScribeError::model(format!("unknown model: {name}")))?
            .clone();

        let mut missing: Vec<&Asset> = Vec::new();
        if !asset_present(&self.model_dir, &entry.bin) {
            missing.push(&entry.bin);
        }
        let coreml_required = entry.needs_coreml();
        if coreml_required {
            if let Some(coreml) = &entry.coreml {
                if !asset_present(&self.model_dir, coreml) {
                    missing.push(coreml);
                }
            }
        }

        if !missing.is_empty() {
            let total_bytes: u64 = missing.iter().map(|a| a.size_bytes).sum();
            let prompt = format!(
                "Download {} missing file(s) for '{name}' ({:.1} MB)?",
                missing.len(),
                total_bytes as f64 / 1_000_000.0
            );
            if !force_accept && !confirm(&prompt) {
                return Err(ScribeError::model(format!(
                    "required assets for '{name}' not present and download declined"
                )));
            }
            for asset in &missing {
                self.download_and_verify(asset, progress)?;
                if asset.filename.ends_with(".zip") {
                    extract_zip(&self.model_dir.join(&asset.filename), &self.model_dir)?;
                }
            }
        } else {
            // Still present files must match their recorded hash.
            self.verify_asset(&entry.bin)?;
            if coreml_required {
                if let Some(coreml) = &entry.coreml {
                    self.verify_asset(coreml)?;
                }
            }
        }

        Ok(self.model_dir.join(&entry.bin.filename))
    }

    fn verify_asset(&self, asset: &Asset) -> Result<()> {
        let path = self.model_dir.join(&asset.filename);
        let actual = sha256_file(&path)?;
        if actual != asset.sha256 {
            return Err(ScribeError::integrity(format!(
                "{} sha256 mismatch: expected {}, got {actual}",
                asset.filename, asset.sha256
            )));
        }
        Ok(())
    }

    fn download_and_verify(&self, asset: &Asset, progress: &ProgressFn) -> Result<()> {
        let dest = self.model_dir.join(&asset.filename);
        download_to_file(&asset.url, &dest, progress)?;
        let actual = sha256_file(&dest)?;
        if actual != asset.sha256 {
            // Spec: offer to delete and abort; never auto-retry.
            let _ = fs::remove_file(&dest);
            return Err(ScribeError::integrity(format!(
                "{} sha256 mismatch after download: expected {}, got {actual}",
                asset.filename, asset.sha256
            )));
        }
        Ok(())
    }
}

pub fn default_model_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".signalscribe")
        .join("models")
}

fn read_catalog(path: &Path) -> Option<ModelCatalog> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<ModelCatalog>(&content) {
        Ok(catalog) => Some(catalog),
        Err(_) => {
            // Corrupt catalog: delete and treat as missing (spec §4.1).
            let _ = fs::remove_file(path);
            None
        }
    }
}

fn write_catalog_atomic(path: &Path, catalog: &ModelCatalog) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(catalog)?;
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn download_to_file(url: &str, dest: &Path, progress: &ProgressFn) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(600))
        .build()
        .map_err(|e| ScribeError::model(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ScribeError::model(format!("download failed: {e}")))?;
    if !response.status().is_success() {
        return Err(ScribeError::model(format!(
            "download failed: HTTP {}",
            response.status()
        )));
    }
    let total = response.content_length().unwrap_or(0);

    let tmp = dest.with_extension("tmp");
    let mut file = fs::File::create(&tmp)?;
    let mut downloaded = 0u64;
    let mut buf = [0u8; 8192];
    progress(0, total);
    loop {
        let n = response
            .read(&mut buf)
            .map_err(|e| ScribeError::model(format!("download interrupted: {e}")))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        downloaded += n as u64;
        progress(downloaded, total);
    }
    drop(file);
    fs::rename(&tmp, dest)?;
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = fs::File::open(zip_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| ScribeError::model(format!("bad zip: {e}")))?;
    archive
        .extract(dest_dir)
        .map_err(|e| ScribeError::model(format!("zip extraction failed: {e}")))?;
    Ok(())
}
