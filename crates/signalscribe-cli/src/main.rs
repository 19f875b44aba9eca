//! `signalscribe`: unattended audio-ingestion and transcription pipeline.
//!
//! Wires argv (`args`) to `Supervisor::start`, prints the startup banner
//! (spec §7), then runs the live status loop until SIGINT. Grounded on
//! `whis-cli/src/main.rs`'s parse-then-dispatch shape.

mod args;
mod error;
mod logging;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use signalscribe_core::model::{
    HuggingFaceCatalogSource, ModelManager, DEFAULT_BLOB_URL_TEMPLATE, DEFAULT_RAW_URL_TEMPLATE,
    DEFAULT_REPO_TREE_URL,
};
use signalscribe_core::supervisor::{default_thread_count, SupervisorConfig};
use signalscribe_core::{probe_sdrtrunk_recording_dir, Settings, Supervisor};

use crate::args::Cli;

fn main() {
    let log_path = std::cell::RefCell::new(None);
    if let Err(err) = run(&log_path) {
        error::display_anyhow_error(&err, log_path.borrow().as_deref());
        std::process::exit(1);
    }
}

fn run(log_path_out: &std::cell::RefCell<Option<PathBuf>>) -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load();

    let (_log_path, _guard) = logging::init(&logging::LoggingConfig {
        log_path: cli.log_path.clone().or_else(|| settings.log_path.clone()),
        no_logs: cli.no_logs,
        verbose: cli.verbose,
        debug: cli.debug,
    })?;
    *log_path_out.borrow_mut() = _log_path.clone();

    let catalog_source =
        HuggingFaceCatalogSource::new(DEFAULT_REPO_TREE_URL, DEFAULT_BLOB_URL_TEMPLATE, DEFAULT_RAW_URL_TEMPLATE);

    if cli.list_models {
        let manager = ModelManager::new(
            cli.model_dir.clone().or_else(|| settings.model_dir.clone()),
            cli.reload_models,
            &catalog_source,
        )?;
        let mut names = manager.catalog().names();
        names.sort();
        for name in names {
            println!("{name}");
        }
        return Ok(());
    }

    let watch_dir = cli
        .folder
        .clone()
        .or_else(probe_sdrtrunk_recording_dir)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no folder given and no SDRTrunk recording directory could be detected"
            )
        })?;

    let threads = cli.threads.unwrap_or_else(default_thread_count);
    let model_name = cli
        .model
        .clone()
        .or_else(|| settings.model.clone())
        .unwrap_or_else(|| signalscribe_core::model::DEFAULT_MODEL.to_string());
    let model_dir = cli.model_dir.clone().or_else(|| settings.model_dir.clone());
    let csv_path = cli
        .csv_path
        .clone()
        .or_else(|| settings.csv_path.clone())
        .unwrap_or_else(|| PathBuf::from("signalscribe.csv"));

    // --debug overrides --verbose/--silent to maximum verbosity (spec §6).
    let effective_silent = cli.silent && !cli.debug;

    let config = SupervisorConfig {
        watch_dir: watch_dir.clone(),
        recursive: cli.recursive,
        formats: cli.formats.clone(),
        poll_interval: None,
        csv_path,
        silent: effective_silent,
        queue_capacity: 64,
        model_name,
        model_dir,
        refresh_catalog: cli.reload_models,
        // -S/--silent suppresses interactive console output (spec §6);
        // a download confirmation prompt is interactive console output,
        // so silent runs force-accept instead of blocking on a prompt
        // nobody will see.
        force_accept_downloads: effective_silent,
        threads,
        language: None,
        transcriber_ready_deadline: std::time::Duration::from_secs(120),
    };

    let confirm = |prompt: &str| -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    };

    let progress_bar = ProgressBar::new(0);
    progress_bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40}] {bytes}/{total_bytes}")
            .expect("static template")
            .progress_chars("=> "),
    );
    let progress = |downloaded: u64, total: u64| {
        if total > 0 {
            progress_bar.set_length(total);
        }
        progress_bar.set_position(downloaded);
        if total > 0 && downloaded >= total {
            progress_bar.finish_and_clear();
        }
    };

    let (supervisor, report) = Supervisor::start(config, &catalog_source, &confirm, &progress)?;

    if !effective_silent {
        print_banner(&report, _log_path.as_deref());
    }

    let running = Arc::new(AtomicBool::new(true));
    Supervisor::install_sigint_handler(running.clone())?;
    supervisor.run_status_loop(running);
    supervisor.shutdown();

    Ok(())
}

fn print_banner(report: &signalscribe_core::supervisor::StartupReport, log_path: Option<&Path>) {
    println!("{}", style("SignalScribe").bold().green());
    println!("  model:      {}", report.model_name);
    println!("  system:     {}", report.system_info);
    println!("  threads:    {}", report.threads);
    println!("  csv:        {}", report.csv_path.display());
    println!("  watching:   {}", report.watch_dir.display());
    match log_path {
        Some(p) => println!("  log:        {}", p.display()),
        None => println!("  log:        disabled"),
    }
}
