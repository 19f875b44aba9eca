//! Audio -> mono 16kHz float32 PCM (spec §4.4).
//!
//! Grounded on `original_source/SignalScribe/decoder.py`'s `_load_audio`:
//! WAV files are read directly (44-byte header skip, i16 LE samples);
//! anything else is transcoded via an external tool first.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::thread;

use crate::error::{Result, ScribeError};
use crate::job::Job;
use crate::queue::TrackedQueue;

const WAV_HEADER_BYTES: usize = 44;
const TRANSCODER: &str = "ffmpeg";

pub struct Decoder {
    handle: Option<thread::JoinHandle<()>>,
}

impl Decoder {
    /// Spawns the decode loop on a dedicated thread; consumes `input`
    /// until it closes, producing decoded Jobs onto `output`, then closes
    /// `output` itself.
    pub fn spawn(input: TrackedQueue<Job>, output: TrackedQueue<Job>) -> Self {
        let handle = thread::spawn(move || {
            tracing::info!("decoder thread started");
            while let Some(mut job) = input.get() {
                let start = std::time::Instant::now();
                match decode(&job.path) {
                    Ok(pcm) => {
                        job.pcm = Some(pcm);
                        tracing::info!(
                            path = %job.path.display(),
                            elapsed_ms = start.elapsed().as_millis(),
                            "decoded"
                        );
                        if output.put(job).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!(path = %job.path.display(), error = %e, "decode failed");
                    }
                }
            }
            output.close();
            tracing::info!("decoder thread stopped");
        });
        Self {
            handle: Some(handle),
        }
    }

    pub fn join(mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// `Decode(job)` (spec §4.4).
pub fn decode(path: &Path) -> Result<Vec<f32>> {
    let is_wav = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);

    if is_wav {
        return wav_to_pcm(path);
    }

    if which(TRANSCODER).is_none() {
        return Err(ScribeError::other(format!(
            "{TRANSCODER} is not installed or not in PATH; install it or provide a WAV file"
        )));
    }

    let tmp = tempfile::Builder::new()
        .suffix(".wav")
        .tempfile()
        .map_err(ScribeError::Io)?;
    let tmp_path = tmp.path().to_path_buf();
    // Close our handle so ffmpeg (on Windows especially) can write the path.
    drop(tmp);

    let result = (|| -> Result<Vec<f32>> {
        let status = Command::new(TRANSCODER)
            .args([
                "-i",
                &path.to_string_lossy(),
                "-ac",
                "1",
                "-ar",
                "16000",
                &tmp_path.to_string_lossy(),
                "-y",
            ])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map_err(|e| ScribeError::decode(format!("failed to run {TRANSCODER}: {e}")))?;

        if !status.success() {
            return Err(ScribeError::decode(format!(
                "{TRANSCODER} exited with {status}"
            )));
        }
        wav_to_pcm(&tmp_path)
    })();

    let _ = fs::remove_file(&tmp_path);
    result
}

fn wav_to_pcm(path: &Path) -> Result<Vec<f32>> {
    let bytes = fs::read(path)?;
    if bytes.len() < WAV_HEADER_BYTES {
        return Err(ScribeError::decode(format!(
            "{} is too small to be a WAV file",
            path.display()
        )));
    }
    let samples = &bytes[WAV_HEADER_BYTES..];
    let mut pcm = Vec::with_capacity(samples.len() / 2);
    for chunk in samples.chunks_exact(2) {
        let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
        pcm.push(sample as f32 / i16::MAX as f32);
    }
    Ok(pcm)
}

fn which(cmd: &str) -> Option<std::path::PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(cmd))
            .find(|full| full.is_file())
    })
}
