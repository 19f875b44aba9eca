//! Startup sequencing, live status display, signal handling, and ordered
//! shutdown (spec §4.7). Grounded on
//! `original_source/SignalScribe/app.py`'s `SignalScribeApp`
//! (initialize/run/shutdown) and `whis-cli/src/service.rs`'s main-loop
//! style; `ctrlc` + `indicatif::MultiProgress` round out the ambient stack
//! for SIGINT handling and the redraw-without-flicker status lines.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::decoder::Decoder;
use crate::error::{Result, ScribeError};
use crate::highlight::HighlightRules;
use crate::job::Job;
use crate::model::manager::{ConfirmFn, ProgressFn};
use crate::model::{CatalogSource, ModelManager};
use crate::output::Output;
use crate::queue::TrackedQueue;
use crate::transcriber::{InferenceEngine, Transcriber, WhisperInferenceEngine, WorkerState};
use crate::watcher::{SharedHighlightRules, Watcher};

/// Startup parameters (spec §6's CLI surface, minus argv parsing itself,
/// which is the CLI crate's job).
pub struct SupervisorConfig {
    pub watch_dir: PathBuf,
    pub recursive: bool,
    pub formats: Vec<String>,
    pub poll_interval: Option<Duration>,
    pub csv_path: PathBuf,
    pub silent: bool,
    pub queue_capacity: usize,
    pub model_name: String,
    pub model_dir: Option<PathBuf>,
    pub refresh_catalog: bool,
    pub force_accept_downloads: bool,
    pub threads: usize,
    pub language: Option<String>,
    pub transcriber_ready_deadline: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("."),
            recursive: false,
            formats: crate::DEFAULT_FORMATS.iter().map(|s| s.to_string()).collect(),
            poll_interval: None,
            csv_path: PathBuf::from("signalscribe.csv"),
            silent: false,
            queue_capacity: 64,
            model_name: crate::model::DEFAULT_MODEL.to_string(),
            model_dir: None,
            refresh_catalog: false,
            force_accept_downloads: false,
            threads: default_thread_count(),
            language: None,
            transcriber_ready_deadline: Duration::from_secs(20),
        }
    }
}

pub fn default_thread_count() -> usize {
    (std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2) / 2).max(1)
}

/// A started pipeline: the four stage handles plus the queues between them,
/// kept around so `shutdown` can close/join in the right order.
pub struct Supervisor {
    watcher: Watcher,
    decoder: Decoder,
    transcriber: Transcriber,
    output: Output,
    q1: TrackedQueue<Job>,
    q2: TrackedQueue<Job>,
    q3: TrackedQueue<Job>,
    watch_dir: PathBuf,
    started_at: Instant,
}

/// Everything the Supervisor reports for the "parameters table" banner
/// (spec §7): chosen model, detected accelerators, thread count, paths.
pub struct StartupReport {
    pub model_name: String,
    pub model_path: PathBuf,
    pub system_info: String,
    pub threads: usize,
    pub csv_path: PathBuf,
    pub watch_dir: PathBuf,
}

impl Supervisor {
    /// Runs the full startup sequence (spec §4.7 steps 1-6), failing loudly
    /// and never starting the Watcher if any earlier step fails.
    pub fn start(
        config: SupervisorConfig,
        catalog_source: &dyn CatalogSource,
        confirm: &ConfirmFn,
        progress: &ProgressFn,
    ) -> Result<(Self, StartupReport)> {
        Self::start_with_engine(
            config,
            catalog_source,
            confirm,
            progress,
            WhisperInferenceEngine::default(),
        )
    }

    /// Same as `start`, with an injectable transcription engine — the seam
    /// integration tests use to avoid depending on a real model file.
    pub fn start_with_engine(
        config: SupervisorConfig,
        catalog_source: &dyn CatalogSource,
        confirm: &ConfirmFn,
        progress: &ProgressFn,
        engine: impl InferenceEngine + 'static,
    ) -> Result<(Self, StartupReport)> {
        // 1. Validate/create the watched directory and the CSV parent dir.
        if !config.watch_dir.exists() {
            std::fs::create_dir_all(&config.watch_dir)?;
        }
        if !config.watch_dir.is_dir() {
            return Err(ScribeError::other(format!(
                "{} is not a directory",
                config.watch_dir.display()
            )));
        }
        if let Some(parent) = config.csv_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // 2. Construct ModelManager; select the requested model.
        let manager = ModelManager::new(config.model_dir.clone(), config.refresh_catalog, catalog_source)?;
        let model_path = manager.select(
            &config.model_name,
            config.force_accept_downloads,
            confirm,
            progress,
        )?;

        // 3. Create the three TrackedQueues.
        let q1: TrackedQueue<Job> = TrackedQueue::new(config.queue_capacity);
        let q2: TrackedQueue<Job> = TrackedQueue::new(config.queue_capacity);
        let q3: TrackedQueue<Job> = TrackedQueue::new(config.queue_capacity);

        // 4. Start the Transcriber; block until RUNNING or fail loudly.
        let transcriber = Transcriber::spawn_with_engine(
            model_path.clone(),
            config.language.clone(),
            config.threads,
            q2.clone(),
            q3.clone(),
            engine,
        );
        transcriber
            .wait_for_ready(config.transcriber_ready_deadline)
            .map_err(|e| ScribeError::other(format!("transcriber failed to start: {e}")))?;
        let system_info = match transcriber.status().state() {
            WorkerState::Running { system_info } => system_info,
            _ => "unknown".to_string(),
        };

        // 5. Start Decoder and Output.
        let decoder = Decoder::spawn(q1.clone(), q2.clone());
        let highlight_rules = SharedHighlightRules::new(HighlightRules::empty());
        let output = Output::spawn(q3.clone(), config.csv_path.clone(), highlight_rules.clone(), config.silent);

        // 6. Start the Watcher.
        let watcher = Watcher::spawn(
            config.watch_dir.clone(),
            config.formats.clone(),
            config.recursive,
            config.poll_interval,
            q1.clone(),
            highlight_rules,
        )?;

        let report = StartupReport {
            model_name: config.model_name.clone(),
            model_path,
            system_info,
            threads: config.threads,
            csv_path: config.csv_path.clone(),
            watch_dir: config.watch_dir.clone(),
        };

        Ok((
            Self {
                watcher,
                decoder,
                transcriber,
                output,
                q1,
                q2,
                q3,
                watch_dir: config.watch_dir,
                started_at: Instant::now(),
            },
            report,
        ))
    }

    pub fn watch_dir(&self) -> &std::path::Path {
        &self.watch_dir
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Pending counts for the status display (spec §4.7): `(label, size)`
    /// for each of the three pipeline queues.
    pub fn queue_depths(&self) -> [(&'static str, usize); 3] {
        [
            ("decoding", self.q1.size()),
            ("transcribing", self.q2.size()),
            ("writing", self.q3.size()),
        ]
    }

    /// Runs the live status loop at ~10Hz until `running` is cleared
    /// (spec §4.7, §5). When both pipeline queues are empty shows a single
    /// "listening" line; otherwise shows one line per nonempty queue.
    pub fn run_status_loop(&self, running: Arc<AtomicBool>) {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template("{msg}").expect("static template");
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(style);

        while running.load(Ordering::SeqCst) {
            let depths = self.queue_depths();
            let pending: Vec<String> = depths
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(label, n)| format!("{label}: {n} pending"))
                .collect();

            if pending.is_empty() {
                bar.set_message(format!(
                    "listening on {} ({}s)",
                    self.watch_dir.display(),
                    self.elapsed().as_secs()
                ));
            } else {
                bar.set_message(pending.join(" | "));
            }
            bar.tick();
            std::thread::sleep(Duration::from_millis(100));
        }
        bar.finish_and_clear();
    }

    /// Installs a `ctrlc` handler that clears `running`, translating SIGINT
    /// into the graceful shutdown path (spec §5: "SIGINT is never an
    /// error").
    pub fn install_sigint_handler(running: Arc<AtomicBool>) -> Result<()> {
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .map_err(|e| ScribeError::other(format!("failed to install SIGINT handler: {e}")))
    }

    /// Shutdown sequence (spec §4.7): stop the Watcher, close the decoding
    /// queue so the Decoder drains and exits (which itself closes the
    /// transcribing queue, the worker's sentinel per `TrackedQueue`'s own
    /// contract), join the Transcriber with a forceful-termination
    /// deadline, then let Output drain and join.
    pub fn shutdown(self) {
        self.watcher.join();
        self.q1.close();
        self.decoder.join();
        // Decoder::spawn's loop closes q2 on exit; belt-and-suspenders in
        // case a future decoder variant doesn't.
        self.q2.close();
        self.transcriber.join_with_deadline();
        self.q3.close();
        self.output.join();
    }
}
