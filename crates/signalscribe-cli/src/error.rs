//! CLI error display with helpful hints, grounded on
//! `whis-cli/src/error.rs`'s pattern-matched style, adapted to
//! `ScribeError`'s variants. Rendered in red with the log path printed
//! alongside, per spec §7: "Errors render to the console in red; the log
//! path is printed so the user can inspect details."

use std::path::Path;

use console::style;
use signalscribe_core::ScribeError;

fn red(line: impl AsRef<str>) {
    eprintln!("{}", style(line.as_ref()).red());
}

/// Display an error to stderr, in red, with a contextual hint.
pub fn display_error(err: &ScribeError) {
    match err {
        ScribeError::Integrity(msg) => {
            red("Error: model integrity check failed");
            red(msg);
            red("");
            red("Hint: the downloaded file did not match its published SHA-256.");
            red("  Delete it and rerun with --reload-models to fetch a fresh copy.");
        }

        ScribeError::Model(msg) => {
            red("Error: model error");
            red(msg);
            red("");
            red("Hint: run with --list-models to see what's available, or");
            red("  --reload-models to refresh the catalog from the network.");
        }

        ScribeError::Watch(msg) => {
            red("Error: filesystem watch error");
            red(msg);
            red("");
            red("Hint: check that the watch directory exists and is readable.");
        }

        ScribeError::Decode(msg) => {
            red("Error: audio decode error");
            red(msg);
            red("");
            red("Hint: confirm ffmpeg is installed and on PATH for non-WAV formats.");
        }

        ScribeError::Config(msg) => {
            red("Error: configuration error");
            red(msg);
            red("");
            red("Hint: check settings.toml and colors.yaml for syntax errors.");
        }

        ScribeError::Io(io_err) => {
            red("Error: I/O error");
            red(io_err.to_string());
            red("");
            match io_err.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    red("Hint: permission denied - check file/directory permissions");
                }
                std::io::ErrorKind::NotFound => {
                    red("Hint: file or directory not found - check the path");
                }
                _ => {
                    red("Hint: check file paths and permissions");
                }
            }
        }

        ScribeError::Other(msg) => {
            red(format!("Error: {msg}"));
        }
    }
}

/// Bridge for the top-level `anyhow::Result` returned by `main`. `log_path`
/// is `None` when `--no-logs` was set or logging hadn't been initialized yet
/// when the error occurred.
pub fn display_anyhow_error(err: &anyhow::Error, log_path: Option<&Path>) {
    if let Some(scribe_err) = err.downcast_ref::<ScribeError>() {
        display_error(scribe_err);
    } else {
        red(format!("Error: {err:#}"));
    }
    match log_path {
        Some(p) => red(format!("See the log for details: {}", p.display())),
        None => red("(file logging is disabled; rerun without --no-logs for details)"),
    }
}
