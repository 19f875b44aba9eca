//! Best-effort probe for SDRTrunk's configured recording directory (spec.md
//! §1: "a probe function returning an optional path", explicitly out of
//! core scope — a named external collaborator, not pipeline surface).
//!
//! Grounded on `original_source/SignalScribe/sdrtrunk.py`'s
//! `SDRTrunkDetector`: find the running SDRTrunk process, locate its log
//! file among its open files, and parse the `Recordings:` line. The
//! Windows-registry and macOS-plist lookups the original also tries have no
//! Rust equivalent exercised here; this probe sticks to the cross-platform
//! log-parsing path and returns `None` (with a debug log line) wherever that
//! path isn't available, never failing startup over it.

use std::path::PathBuf;

const LOG_MARKER: &str = "sdrtrunk_app.log";
const RECORDINGS_PREFIX: &str = "Recordings:";

/// Returns SDRTrunk's configured recording directory if SDRTrunk appears to
/// be running and its log file names one, or `None` otherwise. Never
/// errors: absence of SDRTrunk is the common case, not a failure.
pub fn probe_sdrtrunk_recording_dir() -> Option<PathBuf> {
    let log_path = find_sdrtrunk_log_path()?;
    let content = std::fs::read_to_string(&log_path).ok()?;
    let dir = parse_recordings_line(&content)?;
    tracing::info!(path = %dir.display(), "found SDRTrunk recording directory from logs");
    Some(dir)
}

/// Scan `/proc` for a running `java ... sdrtrunk ...` process and return the
/// path of its open `sdrtrunk_app.log`, Linux-only (the original's
/// `psutil`-based process/open-files scan has no direct cross-platform
/// equivalent in the standard library).
#[cfg(target_os = "linux")]
fn find_sdrtrunk_log_path() -> Option<PathBuf> {
    let proc_dir = std::fs::read_dir("/proc").ok()?;
    for entry in proc_dir.flatten() {
        let pid = entry.file_name();
        let Some(pid_str) = pid.to_str() else {
            continue;
        };
        if !pid_str.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }

        let cmdline = std::fs::read_to_string(entry.path().join("cmdline")).unwrap_or_default();
        let cmdline = cmdline.replace('\0', " ").to_lowercase();
        if !(cmdline.contains("java") && cmdline.contains("sdrtrunk")) {
            continue;
        }

        let fd_dir = entry.path().join("fd");
        let Ok(fds) = std::fs::read_dir(&fd_dir) else {
            continue;
        };
        for fd in fds.flatten() {
            if let Ok(target) = std::fs::read_link(fd.path()) {
                if target.to_string_lossy().contains(LOG_MARKER) {
                    return Some(target);
                }
            }
        }
    }
    tracing::debug!("no running SDRTrunk process with an open log file was found");
    None
}

#[cfg(not(target_os = "linux"))]
fn find_sdrtrunk_log_path() -> Option<PathBuf> {
    tracing::debug!("SDRTrunk probing is only implemented on Linux");
    None
}

/// Extract the path following the last `Recordings:` line, trimming any
/// trailing bracketed stats, matching
/// `SignalScribe/sdrtrunk.py::_find_recording_dir_in_logs`'s regex.
fn parse_recordings_line(log_content: &str) -> Option<PathBuf> {
    let mut found = None;
    for line in log_content.lines() {
        if let Some(idx) = line.find(RECORDINGS_PREFIX) {
            let rest = &line[idx + RECORDINGS_PREFIX.len()..];
            let trimmed = rest.split('[').next().unwrap_or(rest).trim();
            if !trimmed.is_empty() {
                found = Some(PathBuf::from(trimmed));
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recordings_line_trimming_bracketed_stats() {
        let log = "2024-01-01 INFO Recordings:   /home/user/SDRTrunk/recordings [disk usage stats]\n";
        assert_eq!(
            parse_recordings_line(log),
            Some(PathBuf::from("/home/user/SDRTrunk/recordings"))
        );
    }

    #[test]
    fn uses_the_last_matching_line() {
        let log = "Recordings: /old/path\nRecordings: /new/path\n";
        assert_eq!(parse_recordings_line(log), Some(PathBuf::from("/new/path")));
    }

    #[test]
    fn no_matching_line_returns_none() {
        assert_eq!(parse_recordings_line("nothing here\n"), None);
    }
}
