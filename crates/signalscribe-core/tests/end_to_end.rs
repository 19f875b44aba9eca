//! End-to-end pipeline scenarios (spec.md §8, literal scenarios 1-6).
//! Exercises the crate's public surface the way a caller wiring up a
//! Supervisor would, rather than poking at individual stages.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use signalscribe_core::model::catalog::FixtureCatalogSource;
use signalscribe_core::model::types::{Asset, ModelEntry};
use signalscribe_core::model::ModelManager;
use signalscribe_core::supervisor::SupervisorConfig;
use signalscribe_core::transcriber::InferenceEngine;
use signalscribe_core::Supervisor;

struct StubEngine {
    text: &'static str,
}

impl InferenceEngine for StubEngine {
    fn load_model(&mut self, _model_path: &Path) -> Result<(), String> {
        Ok(())
    }

    fn transcribe(&mut self, _pcm: Vec<f32>, _language: Option<&str>) -> Result<String, String> {
        Ok(self.text.to_string())
    }
}

/// Like `StubEngine`, but slow enough that `shutdown_drains_jobs_already_in_the_pipeline`
/// can call `Supervisor::shutdown` while jobs are still mid-flight rather than
/// already fully drained.
struct SlowStubEngine {
    text: &'static str,
    delay: Duration,
}

impl InferenceEngine for SlowStubEngine {
    fn load_model(&mut self, _model_path: &Path) -> Result<(), String> {
        Ok(())
    }

    fn transcribe(&mut self, _pcm: Vec<f32>, _language: Option<&str>) -> Result<String, String> {
        thread::sleep(self.delay);
        Ok(self.text.to_string())
    }
}

struct ErrorEngine;

impl InferenceEngine for ErrorEngine {
    fn load_model(&mut self, _model_path: &Path) -> Result<(), String> {
        Err("synthetic startup failure".to_string())
    }

    fn transcribe(&mut self, _pcm: Vec<f32>, _language: Option<&str>) -> Result<String, String> {
        unreachable!("never reached when load_model fails")
    }
}

const WAV_HEADER_BYTES: usize = 44;

fn write_wav_sine(path: &Path, seconds: f32, sample_rate: u32) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(&[0u8; WAV_HEADER_BYTES]).unwrap();
    let n = (seconds * sample_rate as f32) as usize;
    for i in 0..n {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * std::f32::consts::TAU).sin();
        let quantized = (sample * i16::MAX as f32) as i16;
        f.write_all(&quantized.to_le_bytes()).unwrap();
    }
}

fn fixture_catalog(model_dir: &Path, bin_bytes: &[u8]) -> HashMap<String, ModelEntry> {
    fs::write(model_dir.join("m1.bin"), bin_bytes).unwrap();
    let mut hasher = Sha256::new();
    hasher.update(bin_bytes);
    let sha = format!("{:x}", hasher.finalize());
    let mut map = HashMap::new();
    map.insert(
        "m1".to_string(),
        ModelEntry {
            bin: Asset {
                filename: "m1.bin".into(),
                url: "unused".into(),
                size_bytes: bin_bytes.len() as u64,
                sha256: sha,
            },
            coreml: None,
        },
    );
    map
}

fn read_csv_rows(csv_path: &Path) -> Vec<csv::StringRecord> {
    let mut reader = csv::Reader::from_path(csv_path).unwrap();
    reader.records().map(|r| r.unwrap()).collect()
}

fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    predicate()
}

/// Scenario 1: single WAV ingest with a stub Transcriber returning "hello".
#[test]
fn single_wav_ingest_produces_one_csv_row() {
    let watch_dir = tempfile::tempdir().unwrap();
    let model_dir = tempfile::tempdir().unwrap();
    let csv_path = tempfile::tempdir().unwrap().path().join("out.csv");

    let entries = fixture_catalog(model_dir.path(), b"stub-model");
    let source = FixtureCatalogSource(entries);

    write_wav_sine(&watch_dir.path().join("a.wav"), 2.0, 16_000);

    let config = SupervisorConfig {
        watch_dir: watch_dir.path().to_path_buf(),
        model_dir: Some(model_dir.path().to_path_buf()),
        csv_path: csv_path.clone(),
        model_name: "m1".to_string(),
        force_accept_downloads: true,
        poll_interval: Some(Duration::from_millis(50)),
        ..SupervisorConfig::default()
    };

    let (supervisor, _report) = Supervisor::start_with_engine(
        config,
        &source,
        &|_| true,
        &|_, _| {},
        StubEngine { text: "hello" },
    )
    .expect("startup should succeed");

    let found = wait_until(|| csv_path.exists() && read_csv_rows(&csv_path).len() == 1, Duration::from_secs(10));
    assert!(found, "expected exactly one CSV row within the timeout");

    let rows = read_csv_rows(&csv_path);
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert!(row[1].ends_with("a.wav"));
    assert_eq!(&row[3], "hello");

    supervisor.shutdown();
}

/// Scenario 2: MP3 ingest via the ffmpeg transcoder. Skipped when ffmpeg is
/// not on PATH, matching the Decoder's own runtime check.
#[test]
fn mp3_ingest_via_transcoder_leaves_no_temp_file() {
    if which_ffmpeg().is_none() {
        eprintln!("skipping mp3_ingest_via_transcoder_leaves_no_temp_file: ffmpeg not on PATH");
        return;
    }

    let watch_dir = tempfile::tempdir().unwrap();
    let model_dir = tempfile::tempdir().unwrap();
    let csv_path = tempfile::tempdir().unwrap().path().join("out.csv");
    let entries = fixture_catalog(model_dir.path(), b"stub-model");
    let source = FixtureCatalogSource(entries);

    let wav_src = watch_dir.path().join("a_source.wav");
    write_wav_sine(&wav_src, 2.0, 16_000);
    let mp3_dst = watch_dir.path().join("a.mp3");
    let status = std::process::Command::new("ffmpeg")
        .args(["-y", "-i", &wav_src.to_string_lossy(), &mp3_dst.to_string_lossy()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
    fs::remove_file(&wav_src).unwrap();

    let temp_dir_before: Vec<PathBuf> = fs::read_dir(std::env::temp_dir())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .collect();

    let config = SupervisorConfig {
        watch_dir: watch_dir.path().to_path_buf(),
        model_dir: Some(model_dir.path().to_path_buf()),
        csv_path: csv_path.clone(),
        model_name: "m1".to_string(),
        force_accept_downloads: true,
        formats: vec!["mp3".to_string()],
        poll_interval: Some(Duration::from_millis(50)),
        ..SupervisorConfig::default()
    };

    let (supervisor, _report) = Supervisor::start_with_engine(
        config,
        &source,
        &|_| true,
        &|_, _| {},
        StubEngine { text: "hello" },
    )
    .expect("startup should succeed");

    let found = wait_until(|| csv_path.exists() && read_csv_rows(&csv_path).len() == 1, Duration::from_secs(15));
    assert!(found, "expected exactly one CSV row within the timeout");
    assert_eq!(&read_csv_rows(&csv_path)[0][3], "hello");

    supervisor.shutdown();

    let temp_dir_after: Vec<PathBuf> = fs::read_dir(std::env::temp_dir())
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .collect();
    assert_eq!(
        temp_dir_before.len(),
        temp_dir_after.len(),
        "decoder's transcode temp file should be removed after use"
    );
}

fn which_ffmpeg() -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join("ffmpeg"))
            .find(|full| full.is_file())
    })
}

/// Scenario 3: catalog cold start populates `models.json` from the fixture.
#[test]
fn catalog_cold_start_writes_models_json() {
    let model_dir = tempfile::tempdir().unwrap();
    let mut entries = fixture_catalog(model_dir.path(), b"m1-bytes");
    entries.insert(
        "m2".to_string(),
        ModelEntry {
            bin: Asset {
                filename: "m2.bin".into(),
                url: "unused".into(),
                size_bytes: 10,
                sha256: "deadbeef".into(),
            },
            coreml: Some(Asset {
                filename: "m2-coreml.zip".into(),
                url: "unused".into(),
                size_bytes: 20,
                sha256: "feedface".into(),
            }),
        },
    );
    let source = FixtureCatalogSource(entries);

    assert!(!model_dir.path().join("models.json").exists());
    let manager = ModelManager::new(Some(model_dir.path().to_path_buf()), true, &source).unwrap();

    let catalog_path = model_dir.path().join("models.json");
    assert!(catalog_path.exists());
    assert!(manager.catalog().get("m1").is_some());
    assert!(manager.catalog().get("m2").is_some());
    assert_eq!(manager.catalog().get("m2").unwrap().bin.size_bytes, 10);
}

/// Scenario 4: a pre-placed file with the wrong hash fails as an integrity
/// error and is never silently replaced.
#[test]
fn integrity_failure_on_select_does_not_replace_the_file() {
    let model_dir = tempfile::tempdir().unwrap();
    let entries = fixture_catalog(model_dir.path(), b"expected-bytes");
    let source = FixtureCatalogSource(entries);
    let manager = ModelManager::new(Some(model_dir.path().to_path_buf()), true, &source).unwrap();

    // Overwrite the previously-written, correctly-hashed file with garbage.
    fs::write(model_dir.path().join("m1.bin"), b"TAMPERED").unwrap();

    let err = manager
        .select("m1", true, &|_| true, &|_, _| {})
        .expect_err("hash mismatch should fail");
    assert!(err.is_integrity());
    assert_eq!(fs::read(model_dir.path().join("m1.bin")).unwrap(), b"TAMPERED");
}

/// Scenario 5: graceful SIGINT-equivalent shutdown drains pending jobs.
/// `Supervisor::shutdown` is the process-internal stand-in for the signal
/// handler flipping `running` to false — both paths converge on the same
/// ordered close-then-join sequence.
#[test]
fn shutdown_drains_jobs_already_in_the_pipeline() {
    let watch_dir = tempfile::tempdir().unwrap();
    let model_dir = tempfile::tempdir().unwrap();
    let csv_path = tempfile::tempdir().unwrap().path().join("out.csv");
    let entries = fixture_catalog(model_dir.path(), b"stub-model");
    let source = FixtureCatalogSource(entries);

    for name in ["a", "b", "c"] {
        write_wav_sine(&watch_dir.path().join(format!("{name}.wav")), 1.0, 16_000);
    }

    let config = SupervisorConfig {
        watch_dir: watch_dir.path().to_path_buf(),
        model_dir: Some(model_dir.path().to_path_buf()),
        csv_path: csv_path.clone(),
        model_name: "m1".to_string(),
        force_accept_downloads: true,
        poll_interval: Some(Duration::from_millis(50)),
        ..SupervisorConfig::default()
    };

    let (supervisor, _report) = Supervisor::start_with_engine(
        config,
        &source,
        &|_| true,
        &|_, _| {},
        SlowStubEngine {
            text: "hello",
            delay: Duration::from_millis(300),
        },
    )
    .expect("startup should succeed");

    // Give the watcher time to pick up the three files and push them into
    // the pipeline, but not enough for the (deliberately slow) transcriber
    // to finish all of them — this is the "3 Jobs already in Q2" precondition
    // from spec §8 scenario 5, not a fully-drained pipeline.
    thread::sleep(Duration::from_millis(150));
    let rows_before_shutdown = if csv_path.exists() {
        read_csv_rows(&csv_path).len()
    } else {
        0
    };
    assert!(
        rows_before_shutdown < 3,
        "test setup should catch the pipeline still mid-flight, not already drained"
    );

    // shutdown() must block until every already-enqueued Job reaches CSV
    // (spec §8: "the 3 pending Jobs all reach CSV"), not just signal stages
    // to stop.
    supervisor.shutdown();
    assert_eq!(read_csv_rows(&csv_path).len(), 3);
}

/// Scenario 6: a worker that transitions to `Error` during startup aborts
/// the Supervisor before the Watcher ever starts.
#[test]
fn worker_crash_during_startup_aborts_before_watcher_runs() {
    let watch_dir = tempfile::tempdir().unwrap();
    let model_dir = tempfile::tempdir().unwrap();
    let csv_path = tempfile::tempdir().unwrap().path().join("out.csv");
    let entries = fixture_catalog(model_dir.path(), b"stub-model");
    let source = FixtureCatalogSource(entries);

    let config = SupervisorConfig {
        watch_dir: watch_dir.path().to_path_buf(),
        model_dir: Some(model_dir.path().to_path_buf()),
        csv_path,
        model_name: "m1".to_string(),
        force_accept_downloads: true,
        transcriber_ready_deadline: Duration::from_secs(5),
        ..SupervisorConfig::default()
    };

    let err = Supervisor::start_with_engine(config, &source, &|_| true, &|_, _| {}, ErrorEngine)
        .expect_err("a worker stuck in ERROR must abort startup");
    assert!(err.to_string().contains("failed to start"));

    // The watch directory must still be empty of any Job-producing activity:
    // dropping a file afterwards would have nothing listening for it.
    assert!(fs::read_dir(watch_dir.path()).unwrap().next().is_none());
}
