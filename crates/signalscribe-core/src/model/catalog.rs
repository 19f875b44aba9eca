//! Remote catalog acquisition (spec §6 "remote catalog source").
//!
//! The contract is narrower than any one implementation: given a listing
//! endpoint, return for each candidate model its size and SHA-256. This is
//! isolated behind `CatalogSource` so a fixture (tests) or a future JSON
//! API can be swapped in without touching `ModelManager`.

use std::collections::HashMap;

use scraper::{Html, Selector};

use crate::error::{Result, ScribeError};
use crate::model::types::{Asset, ModelEntry};

pub trait CatalogSource {
    /// Fetch the set of available models, each with a fully-populated
    /// `ModelEntry` (size + sha256 resolved).
    fn fetch(&self) -> Result<HashMap<String, ModelEntry>>;
}

/// Scrapes a Hugging Face repository's file listing and per-file blob pages
/// the way `modelutils.fetch_available_models`/`get_file_details` did:
/// only CoreML-compatible `ggml-*-encoder.mlmodelc.zip` files are
/// considered, each paired with its `.bin` counterpart.
pub struct HuggingFaceCatalogSource {
    pub repo_tree_url: String,
    pub blob_url_template: String, // "{repo}/blob/main/{filename}"
    pub raw_url_template: String,  // "{repo}/resolve/main/{filename}"
    client: reqwest::blocking::Client,
}

impl HuggingFaceCatalogSource {
    pub fn new(repo_tree_url: impl Into<String>, blob_url_template: impl Into<String>, raw_url_template: impl Into<String>) -> Self {
        Self {
            repo_tree_url: repo_tree_url.into(),
            blob_url_template: blob_url_template.into(),
            raw_url_template: raw_url_template.into(),
            client: reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
        }
    }

    fn list_zip_filenames(&self, html: &str) -> Vec<String> {
        let doc = Html::parse_document(html);
        // HF tree pages render each entry's filename inside an anchor; we
        // only need plain text content, so the selector is deliberately
        // loose ("a") and we filter on the text itself.
        let selector = Selector::parse("a").expect("static selector");
        doc.select(&selector)
            .filter_map(|el| {
                let text = el.text().collect::<String>();
                let text = text.trim();
                (text.starts_with("ggml-") && text.ends_with("-encoder.mlmodelc.zip"))
                    .then(|| text.to_string())
            })
            .collect()
    }

    fn sha256_from_blob_page(&self, html: &str) -> Option<String> {
        let doc = Html::parse_document(html);
        let selector = Selector::parse("strong").expect("static selector");
        for el in doc.select(&selector) {
            let text = el.text().collect::<String>();
            if let Some(rest) = text.trim().strip_prefix("SHA256:") {
                return Some(rest.trim().to_lowercase());
            }
            // some pages put the label and value in separate nodes; look
            // at siblings' text as a fallback by scanning the parent.
            if text.trim() == "SHA256:" {
                if let Some(parent) = el.parent() {
                    if let Some(parent_el) = scraper::ElementRef::wrap(parent) {
                        let full = parent_el.text().collect::<String>();
                        if let Some(idx) = full.find("SHA256:") {
                            let hash = full[idx + "SHA256:".len()..].trim();
                            return Some(hash.split_whitespace().next().unwrap_or("").to_lowercase());
                        }
                    }
                }
            }
        }
        None
    }

    fn fetch_size(&self, url: &str) -> Result<u64> {
        let resp = self
            .client
            .head(url)
            .send()
            .map_err(|e| ScribeError::model(format!("HEAD {url} failed: {e}")))?;
        resp.headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| ScribeError::model(format!("no content-length for {url}")))
    }

    fn fetch_file_details(&self, filename: &str) -> Result<Asset> {
        let blob_url = self.blob_url_template.replace("{filename}", filename);
        let raw_url = self.raw_url_template.replace("{filename}", filename);
        let html = self
            .client
            .get(&blob_url)
            .send()
            .map_err(|e| ScribeError::model(format!("GET {blob_url} failed: {e}")))?
            .text()
            .map_err(|e| ScribeError::model(e.to_string()))?;
        let sha256 = self
            .sha256_from_blob_page(&html)
            .ok_or_else(|| ScribeError::model(format!("no SHA256 found on {blob_url}")))?;
        let size_bytes = self.fetch_size(&raw_url)?;
        Ok(Asset {
            filename: filename.to_string(),
            url: raw_url,
            size_bytes,
            sha256,
        })
    }
}

impl CatalogSource for HuggingFaceCatalogSource {
    fn fetch(&self) -> Result<HashMap<String, ModelEntry>> {
        let listing_html = self
            .client
            .get(&self.repo_tree_url)
            .send()
            .map_err(|e| ScribeError::model(format!("GET {} failed: {e}", self.repo_tree_url)))?
            .text()
            .map_err(|e| ScribeError::model(e.to_string()))?;

        let mut entries = HashMap::new();
        for coreml_filename in self.list_zip_filenames(&listing_html) {
            let Some(model_name) = coreml_filename
                .strip_prefix("ggml-")
                .and_then(|s| s.strip_suffix("-encoder.mlmodelc.zip"))
            else {
                continue;
            };
            let bin_filename = format!("ggml-{model_name}.bin");
            let bin = self.fetch_file_details(&bin_filename)?;
            let coreml = self.fetch_file_details(&coreml_filename)?;
            entries.insert(
                model_name.to_string(),
                ModelEntry {
                    bin,
                    coreml: Some(coreml),
                },
            );
        }
        Ok(entries)
    }
}

/// A fixture source for tests and for the `--model-dir`-only offline path.
pub struct FixtureCatalogSource(pub HashMap<String, ModelEntry>);

impl CatalogSource for FixtureCatalogSource {
    fn fetch(&self) -> Result<HashMap<String, ModelEntry>> {
        Ok(self.0.clone())
    }
}
