//! CLI flag surface (spec §6), a flattened `clap` derive struct mirroring
//! `whis-cli/src/args.rs`'s style.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "signalscribe")]
#[command(version)]
#[command(about = "Unattended audio-ingestion and transcription pipeline")]
pub struct Cli {
    /// Directory to watch; if omitted, try the SDRTrunk recording-dir probe
    pub folder: Option<PathBuf>,

    /// Select model by catalog key (falls back to the saved setting, then
    /// to the built-in default, when omitted)
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// List models in the catalog and exit
    #[arg(short = 'M', long = "list-models")]
    pub list_models: bool,

    /// Force catalog refresh from remote
    #[arg(short = 'r', long = "reload-models")]
    pub reload_models: bool,

    /// Override the model directory
    #[arg(long = "model-dir", value_name = "PATH")]
    pub model_dir: Option<PathBuf>,

    /// Override the CSV destination (file or directory)
    #[arg(short = 'c', long = "csv-path", value_name = "PATH")]
    pub csv_path: Option<PathBuf>,

    /// Override the log destination
    #[arg(short = 'l', long = "log-path", value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Disable file logging
    #[arg(short = 'n', long = "no-logs")]
    pub no_logs: bool,

    /// Audio extensions to observe
    #[arg(short = 'f', long, value_delimiter = ' ', num_args = 1.., default_values_t = vec!["mp3".to_string(), "m4a".to_string(), "wav".to_string()])]
    pub formats: Vec<String>,

    /// Recurse into subdirectories
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Worker thread count for the STT engine
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Mirror logs to console
    #[arg(short = 'V', long)]
    pub verbose: bool,

    /// Suppress interactive console output
    #[arg(short = 'S', long)]
    pub silent: bool,

    /// Maximum verbosity (overrides --verbose/--silent)
    #[arg(long)]
    pub debug: bool,
}
