//! Append-only CSV writer + highlighted console print (spec §4.6).
//! Grounded on `original_source/SignalScribe/output.py`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Local};
use console::style;

use crate::job::Job;
use crate::queue::TrackedQueue;
use crate::watcher::SharedHighlightRules;

const CSV_HEADER: [&str; 4] = ["Timestamp", "File Path", "Duration", "Transcription"];

pub struct Output {
    handle: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Spawns the output loop on a dedicated thread. Consumes `input`
    /// until it closes; every Job produces exactly one CSV row, flushed
    /// before the next Job is processed (spec: "line-atomic").
    pub fn spawn(
        input: TrackedQueue<Job>,
        csv_path: PathBuf,
        highlight_rules: SharedHighlightRules,
        silent: bool,
    ) -> Self {
        let handle = thread::spawn(move || {
            tracing::info!("output thread started");
            while let Some(job) = input.get() {
                if let Err(e) = append_csv_row(&csv_path, &job) {
                    tracing::error!(path = %job.path.display(), error = %e, "failed to write CSV row");
                }
                if !silent {
                    print_console(&job, &highlight_rules.snapshot());
                }
            }
            tracing::info!("output thread stopped");
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

fn append_csv_row(csv_path: &Path, job: &Job) -> std::io::Result<()> {
    let needs_header = !csv_path.exists();
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if needs_header {
        writer.write_record(CSV_HEADER)?;
    }

    let timestamp: DateTime<Local> = job.enqueued_at.into();
    let duration_secs = job
        .transcribe_ms
        .map(|ms| ms as f64 / 1000.0)
        .unwrap_or(0.0);

    writer.write_record([
        timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
        job.path.to_string_lossy().to_string(),
        format!("{duration_secs:.2}"),
        job.text.clone().unwrap_or_default(),
    ])?;
    writer.flush()?;
    Ok(())
}

fn print_console(job: &Job, rules: &crate::highlight::HighlightRules) {
    let timestamp: DateTime<Local> = job.enqueued_at.into();
    let filename = job.filename();
    let link = console::Term::stdout().features().hyperlinks();
    let header = format!("{}", timestamp.format("%H:%M:%S"));

    let name_field = if link {
        format!(
            "\u{1b}]8;;file://{}\u{1b}\\{}\u{1b}]8;;\u{1b}\\",
            job.path.display(),
            filename
        )
    } else {
        filename.clone()
    };

    println!("{} {}", style(header).dim(), style(name_field).blue());

    let indent = " ".repeat(header.len() + 1);
    match job.text.as_deref() {
        Some(text) if !text.is_empty() => {
            println!("{indent}{}", rules.highlight(text));
        }
        _ => {
            println!("{indent}{}", style("<no transcription>").dim());
        }
    }

    // Mirror what was printed to the rotating log file at a level below
    // what's shown on a non-verbose console, so the log stays a complete
    // transcript of what ran even when nobody was watching the terminal.
    tracing::debug!(
        target: "signalscribe::console",
        filename = %filename,
        path = %job.path.display(),
        text = job.text.as_deref().unwrap_or(""),
        "printed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn first_write_creates_header_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let job = Job {
            path: PathBuf::from("/tmp/a.wav"),
            enqueued_at: std::time::SystemTime::now(),
            pcm: None,
            transcribe_ms: Some(1234),
            text: Some("hello world".to_string()),
        };
        append_csv_row(&csv_path, &job).unwrap();

        let content = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), "Timestamp,File Path,Duration,Transcription");
        assert!(lines.next().unwrap().contains("1.23"));
    }

    #[test]
    fn second_write_appends_without_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let mk_job = |text: &str| Job {
            path: PathBuf::from("/tmp/a.wav"),
            enqueued_at: std::time::SystemTime::now(),
            pcm: None,
            transcribe_ms: Some(0),
            text: Some(text.to_string()),
        };
        append_csv_row(&csv_path, &mk_job("first")).unwrap();
        append_csv_row(&csv_path, &mk_job("second")).unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().filter(|l| l.starts_with("Timestamp")).count(), 1);
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn empty_transcription_still_writes_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("out.csv");
        let job = Job {
            path: PathBuf::from("/tmp/a.wav"),
            enqueued_at: std::time::SystemTime::now(),
            pcm: None,
            transcribe_ms: Some(0),
            text: Some(String::new()),
        };
        append_csv_row(&csv_path, &job).unwrap();
        let content = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
