//! Unified error type for signalscribe-core.
//!
//! # Error Hierarchy
//!
//! ```text
//! ScribeError
//!   ├── Model(String)       - catalog, download, verification errors
//!   ├── Integrity(String)   - SHA-256 mismatch after download
//!   ├── Watch(String)       - filesystem watch setup/errors
//!   ├── Decode(String)      - audio decode/transcode errors
//!   ├── Config(String)      - settings/highlight config errors
//!   ├── Io(std::io::Error)
//!   └── Other(String)
//! ```
//!
//! Call sites classify these into the taxonomy of `UserError`,
//! `StartupFailure`, `TransientJobError`, `IntegrityFailure` and `Fatal` —
//! the taxonomy is a matter of where an error is caught and how loudly it's
//! reported, not a separate set of Rust types.

#[derive(Debug, thiserror::Error)]
pub enum ScribeError {
    #[error("model error: {0}")]
    Model(String),

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("watch error: {0}")]
    Watch(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl ScribeError {
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::Integrity(msg.into())
    }

    pub fn watch(msg: impl Into<String>) -> Self {
        Self::Watch(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// True for the taxonomy's `IntegrityFailure` class (spec §7): the
    /// caller should offer to delete the file and must not auto-retry.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;

impl From<anyhow::Error> for ScribeError {
    fn from(err: anyhow::Error) -> Self {
        ScribeError::Other(err.to_string())
    }
}

impl From<reqwest::Error> for ScribeError {
    fn from(err: reqwest::Error) -> Self {
        ScribeError::Model(err.to_string())
    }
}

impl From<serde_json::Error> for ScribeError {
    fn from(err: serde_json::Error) -> Self {
        ScribeError::Config(err.to_string())
    }
}

impl From<notify::Error> for ScribeError {
    fn from(err: notify::Error) -> Self {
        ScribeError::Watch(err.to_string())
    }
}
