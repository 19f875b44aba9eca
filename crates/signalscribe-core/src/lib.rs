//! Core ingestion pipeline for SignalScribe.
//!
//! Four stages — Watcher, Decoder, Transcriber, Output — connected by bounded
//! `TrackedQueue`s, composed and sequenced by `Supervisor`. `ModelManager`
//! runs once at startup to make sure the Transcriber has a verified local
//! model file before the pipeline starts.

pub mod decoder;
pub mod error;
pub mod highlight;
pub mod job;
pub mod model;
pub mod output;
pub mod queue;
pub mod sdrtrunk;
pub mod settings;
pub mod supervisor;
pub mod transcriber;
pub mod watcher;

pub use decoder::Decoder;
pub use error::{Result, ScribeError};
pub use highlight::HighlightRules;
pub use job::Job;
pub use model::{ModelCatalog, ModelEntry, ModelManager};
pub use output::Output;
pub use queue::TrackedQueue;
pub use sdrtrunk::probe_sdrtrunk_recording_dir;
pub use settings::Settings;
pub use supervisor::{Supervisor, SupervisorConfig};
pub use transcriber::{InferenceEngine, Transcriber, WorkerState};
pub use watcher::{SharedHighlightRules, Watcher};

/// Audio extensions the Watcher observes when the user doesn't override
/// `-f/--formats` (spec §6).
pub const DEFAULT_FORMATS: &[&str] = &["mp3", "m4a", "wav"];

/// Default poll interval for the Watcher's notify-fallback and for queue
/// poll granularity references in docs (spec §4.3, §5).
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
