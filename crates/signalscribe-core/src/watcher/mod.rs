//! Filesystem event source (spec §4.3). Grounded on
//! `original_source/SignalScribe/watcher.py`'s `FolderWatcher` /
//! `FolderWatcherHandler`: notify-first with a polling fallback, hidden-file
//! filtering, `colors.yaml` reload, and moved-event suppression for
//! parent/child reorganizations.

use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use notify::{
    Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher as _,
};

use crate::error::Result;
use crate::highlight::HighlightRules;
use crate::job::Job;
use crate::queue::TrackedQueue;

pub const COLORS_FILE_NAME: &str = "colors.yaml";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// `HighlightRules` shared between the Watcher (writer, on colors.yaml
/// change) and Output (reader). Readers snapshot-copy before iterating to
/// minimize hold time (spec §5).
#[derive(Clone, Default)]
pub struct SharedHighlightRules(Arc<Mutex<HighlightRules>>);

impl SharedHighlightRules {
    pub fn new(initial: HighlightRules) -> Self {
        Self(Arc::new(Mutex::new(initial)))
    }

    pub fn snapshot(&self) -> HighlightRules {
        self.0.lock().expect("highlight rules lock poisoned").clone()
    }

    fn replace(&self, rules: HighlightRules) {
        *self.0.lock().expect("highlight rules lock poisoned") = rules;
    }
}

pub struct Watcher {
    handle: Option<thread::JoinHandle<()>>,
    stop_flag: Arc<std::sync::atomic::AtomicBool>,
}

impl Watcher {
    /// Starts watching `root_dir` for files matching `formats`. Spawns the
    /// underlying notify watcher plus a dedicated thread draining its
    /// event channel so this call returns immediately (the caller treats
    /// construction failures, e.g. nonexistent directory, as a startup
    /// error per spec §4.3).
    pub fn spawn(
        root_dir: PathBuf,
        formats: Vec<String>,
        recursive: bool,
        poll_interval: Option<Duration>,
        output: TrackedQueue<Job>,
        highlight_rules: SharedHighlightRules,
    ) -> Result<Self> {
        if !root_dir.is_dir() {
            return Err(crate::error::ScribeError::watch(format!(
                "{} is not a directory",
                root_dir.display()
            )));
        }

        let formats: Vec<String> = formats.into_iter().map(|f| f.to_lowercase()).collect();
        let recursive_mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };

        let (tx, rx) = channel::<notify::Result<Event>>();
        let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

        // Reload colors.yaml synchronously at startup if present, same as
        // the first pass over an existing directory in the source impl.
        if let Ok(rules) = load_colors(&root_dir.join(COLORS_FILE_NAME)) {
            highlight_rules.replace(rules);
        }

        let watch_kind = start_native_or_polling(&root_dir, recursive_mode, poll_interval, tx.clone())?;

        let stop_flag_thread = stop_flag.clone();
        let root_dir_thread = root_dir.clone();
        let handle = thread::spawn(move || {
            // Keep the watcher alive for the lifetime of the thread.
            let _watch_kind = watch_kind;
            while !stop_flag_thread.load(std::sync::atomic::Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(Ok(event)) => {
                        handle_event(&event, &root_dir_thread, &formats, &output, &highlight_rules)
                    }
                    Ok(Err(e)) => tracing::warn!(error = %e, "watch error"),
                    Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::info!("watcher thread stopped");
        });

        Ok(Self {
            handle: Some(handle),
            stop_flag,
        })
    }

    /// Stops accepting new files. Does not wait for in-flight events.
    pub fn stop(&self) {
        self.stop_flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn join(mut self) {
        self.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

enum WatchKind {
    Native(RecommendedWatcher),
    Polling(PollWatcher),
}

fn start_native_or_polling(
    root_dir: &Path,
    mode: RecursiveMode,
    poll_interval: Option<Duration>,
    tx: std::sync::mpsc::Sender<notify::Result<Event>>,
) -> Result<WatchKind> {
    let native = RecommendedWatcher::new(
        {
            let tx = tx.clone();
            move |res| {
                let _ = tx.send(res);
            }
        },
        Config::default(),
    );

    match native {
        Ok(mut watcher) => match watcher.watch(root_dir, mode) {
            Ok(()) => return Ok(WatchKind::Native(watcher)),
            Err(e) => {
                tracing::warn!(error = %e, "native watch failed, falling back to polling");
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "native watcher unavailable, falling back to polling");
        }
    }

    let interval = poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
    let config = Config::default().with_poll_interval(interval);
    let mut watcher = PollWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        config,
    )
    .map_err(|e| crate::error::ScribeError::watch(format!("polling fallback failed: {e}")))?;
    watcher
        .watch(root_dir, mode)
        .map_err(|e| crate::error::ScribeError::watch(format!("polling fallback failed: {e}")))?;
    Ok(WatchKind::Polling(watcher))
}

fn handle_event(
    event: &Event,
    root_dir: &Path,
    formats: &[String],
    output: &TrackedQueue<Job>,
    highlight_rules: &SharedHighlightRules,
) {
    match &event.kind {
        EventKind::Create(_) => {
            for path in &event.paths {
                handle_created_or_moved_in(path, root_dir, formats, output, highlight_rules);
            }
        }
        EventKind::Modify(modify_kind) => {
            use notify::event::ModifyKind;
            if matches!(modify_kind, ModifyKind::Name(_)) && event.paths.len() == 2 {
                // rename-style event: [from, to]
                let (from, to) = (&event.paths[0], &event.paths[1]);
                if is_parent_child(from, to) {
                    return; // suppress reorg moves (spec §4.3)
                }
                handle_created_or_moved_in(to, root_dir, formats, output, highlight_rules);
                return;
            }
            for path in &event.paths {
                if is_colors_file(path) {
                    reload_colors(path, highlight_rules);
                }
            }
        }
        _ => {}
    }
}

fn handle_created_or_moved_in(
    path: &Path,
    _root_dir: &Path,
    formats: &[String],
    output: &TrackedQueue<Job>,
    highlight_rules: &SharedHighlightRules,
) {
    if is_hidden(path) {
        return;
    }
    if is_colors_file(path) {
        reload_colors(path, highlight_rules);
        return;
    }
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return;
    };
    if formats.iter().any(|f| f.eq_ignore_ascii_case(ext)) {
        let job = Job::new(path.to_path_buf());
        if output.put(job).is_err() {
            tracing::warn!("output queue closed; dropping new Job");
        }
    }
}

fn is_colors_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n == COLORS_FILE_NAME)
        .unwrap_or(false)
}

fn reload_colors(path: &Path, highlight_rules: &SharedHighlightRules) {
    match load_colors(path) {
        Ok(rules) => {
            highlight_rules.replace(rules);
            tracing::info!(path = %path.display(), "reloaded highlight rules");
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid colors.yaml, keeping previous rules");
        }
    }
}

fn load_colors(path: &Path) -> Result<HighlightRules> {
    let content = std::fs::read_to_string(path)?;
    HighlightRules::parse(&content)
        .map_err(|e| crate::error::ScribeError::config(format!("invalid colors.yaml: {e}")))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// True when `from` is an ancestor of `to` or vice versa — the "user
/// reorganizing files" case the spec says to suppress to avoid
/// double-ingest. A same-directory rename (e.g. a user fixing a typo in a
/// filename) is *not* a parent/child relationship and still emits a Job.
fn is_parent_child(from: &Path, to: &Path) -> bool {
    from.starts_with(to) || to.starts_with(from)
}
