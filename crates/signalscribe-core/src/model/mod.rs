//! Model asset management: catalog acquisition, selection, integrity
//! verification (spec §4.1).

pub mod catalog;
pub mod manager;
pub mod types;

pub use catalog::{CatalogSource, FixtureCatalogSource, HuggingFaceCatalogSource};
pub use manager::{default_model_dir, ModelManager};
pub use types::{Asset, ModelCatalog, ModelEntry};

pub const DEFAULT_MODEL: &str = "large-v3-turbo";

/// Grounded on `original_source/SignalScribe/modelutils.py`'s hardcoded
/// whisper.cpp GGML repository.
pub const DEFAULT_REPO_TREE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/tree/main";
pub const DEFAULT_BLOB_URL_TEMPLATE: &str = "https://huggingface.co/ggerganov/whisper.cpp/blob/main/{filename}";
pub const DEFAULT_RAW_URL_TEMPLATE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{filename}";
