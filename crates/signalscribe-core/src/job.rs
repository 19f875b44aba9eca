//! The unit of work threaded through the pipeline.

use std::path::PathBuf;
use std::time::SystemTime;

/// A single recording moving through Watcher -> Decoder -> Transcriber -> Output.
///
/// `pcm` is `None` until the Decoder fills it in, and is taken (set back to
/// `None`) once the Transcriber has consumed it — a Job is owned by exactly
/// one stage at any moment, ownership transferring through the queues that
/// connect them.
#[derive(Debug, Clone)]
pub struct Job {
    pub path: PathBuf,
    pub enqueued_at: SystemTime,
    pub pcm: Option<Vec<f32>>,
    pub transcribe_ms: Option<u64>,
    pub text: Option<String>,
}

impl Job {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            enqueued_at: SystemTime::now(),
            pcm: None,
            transcribe_ms: None,
            text: None,
        }
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}
