//! Single-flight admission tests for [`ExtractionManager`].

use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use framesift::testsupport::{BrightnessScorer, CountingHook, SlowScorer, SyntheticDecoder};
use framesift::{
    CompletionHook, DiskCodec, ExtractionConfig, ExtractionManager, PipelineKind, ScorerCell,
    SiftError,
};
use tempfile::TempDir;

fn video_fixture() -> (TempDir, TempDir, ExtractionConfig) {
    let input = tempfile::tempdir().expect("Failed to create input dir");
    let output = tempfile::tempdir().expect("Failed to create output dir");
    fs::write(input.path().join("clip.mp4"), b"synthetic").expect("Failed to write video");
    let config = ExtractionConfig::new(input.path(), output.path()).with_batch_size(10);
    (input, output, config)
}

fn slow_manager(delay: Duration) -> ExtractionManager {
    ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::preloaded(Arc::new(SlowScorer { delay })),
    )
}

fn wait_until_idle(manager: &ExtractionManager, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while manager.active_pipeline().is_some() {
        assert!(
            Instant::now() < deadline,
            "manager did not return to idle within {timeout:?}",
        );
        thread::sleep(Duration::from_millis(10));
    }
}

// ── admission ──────────────────────────────────────────────────────

#[test]
fn second_start_is_rejected_naming_the_active_pipeline() {
    let (_input, _output, config) = video_fixture();
    let manager = slow_manager(Duration::from_millis(400));

    let message = manager
        .start(PipelineKind::BestFrames, config.clone())
        .expect("first start should be admitted");
    assert_eq!(message, "'best_frames' started.");
    assert_eq!(manager.active_pipeline(), Some(PipelineKind::BestFrames));

    let rejection = manager.start(PipelineKind::TopImages, config);
    match rejection {
        Err(SiftError::AlreadyRunning { active }) => assert_eq!(active, "best_frames"),
        other => panic!("expected AlreadyRunning, got {other:?}"),
    }

    wait_until_idle(&manager, Duration::from_secs(10));
}

#[test]
fn racing_starts_admit_exactly_one() {
    let (_input, _output, config) = video_fixture();
    let manager = Arc::new(slow_manager(Duration::from_millis(500)));
    let barrier = Arc::new(Barrier::new(2));

    let mut handles = Vec::new();
    for kind in [PipelineKind::BestFrames, PipelineKind::TopImages] {
        let manager = Arc::clone(&manager);
        let barrier = Arc::clone(&barrier);
        let config = config.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            manager.start(kind, config)
        }));
    }

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("start thread panicked"))
        .collect();

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Err(SiftError::AlreadyRunning { .. })))
        .count();
    assert_eq!(admitted, 1, "exactly one of two racing starts is admitted");
    assert_eq!(rejected, 1);

    wait_until_idle(&manager, Duration::from_secs(10));
}

// ── release ────────────────────────────────────────────────────────

#[test]
fn slot_clears_after_successful_completion() {
    let (input, output, config) = video_fixture();
    let manager = ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::preloaded(Arc::new(BrightnessScorer)),
    );

    manager
        .start(PipelineKind::BestFrames, config)
        .expect("start failed");
    wait_until_idle(&manager, Duration::from_secs(10));

    assert_eq!(manager.active_pipeline(), None);
    assert!(input.path().join("frames_extracted_clip.mp4").exists());
    assert!(output.path().read_dir().expect("list failed").next().is_some());
}

#[test]
fn slot_clears_after_background_failure_and_accepts_next_job() {
    // The input directory exists but holds no videos, so admission
    // succeeds and the job fails in the background.
    let input = tempfile::tempdir().expect("Failed to create input dir");
    let output = tempfile::tempdir().expect("Failed to create output dir");
    let config = ExtractionConfig::new(input.path(), output.path());

    let manager = ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::preloaded(Arc::new(BrightnessScorer)),
    );

    manager
        .start(PipelineKind::BestFrames, config.clone())
        .expect("admission should succeed before listing happens");
    wait_until_idle(&manager, Duration::from_secs(10));

    // The manager must be usable again after the failed job.
    fs::write(input.path().join("clip.mp4"), b"synthetic").expect("write failed");
    manager
        .start(PipelineKind::BestFrames, config)
        .expect("manager should accept a new job after a failure");
    wait_until_idle(&manager, Duration::from_secs(10));
}

#[test]
fn scorer_construction_failure_releases_the_slot() {
    let (input, _output, config) = video_fixture();
    let manager = ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::new(|| {
            Err(SiftError::ModelUnavailable(
                "weights host unreachable".to_string(),
            ))
        }),
    );

    manager
        .start(PipelineKind::BestFrames, config)
        .expect("admission precedes scorer construction");
    wait_until_idle(&manager, Duration::from_secs(10));

    // Job aborted before any sampling: the video is untouched.
    assert!(input.path().join("clip.mp4").exists());
}

// ── completion signal ──────────────────────────────────────────────

#[test]
fn completion_hook_fires_exactly_once_on_success() {
    let (_input, _output, config) = video_fixture();
    let hook = Arc::new(CountingHook::new());
    let manager = ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::preloaded(Arc::new(BrightnessScorer)),
    )
    .with_completion_hook(Arc::clone(&hook) as Arc<dyn CompletionHook>);

    manager
        .start(PipelineKind::BestFrames, config)
        .expect("start failed");
    wait_until_idle(&manager, Duration::from_secs(10));

    assert_eq!(hook.completions(), 1);
    assert_eq!(hook.last_pipeline(), Some(PipelineKind::BestFrames));
}

#[test]
fn completion_hook_does_not_fire_on_failure() {
    // An existing but empty input directory passes admission, so the job
    // fails in the background when the listing comes up empty.
    let input = tempfile::tempdir().expect("Failed to create input dir");
    let output = tempfile::tempdir().expect("Failed to create output dir");
    let config = ExtractionConfig::new(input.path(), output.path());

    let hook = Arc::new(CountingHook::new());
    let manager = ExtractionManager::new(
        Arc::new(SyntheticDecoder::new(30.0, 300)),
        Arc::new(DiskCodec::new()),
        ScorerCell::preloaded(Arc::new(BrightnessScorer)),
    )
    .with_completion_hook(Arc::clone(&hook) as Arc<dyn CompletionHook>);

    manager
        .start(PipelineKind::BestFrames, config)
        .expect("admission should succeed before listing happens");
    wait_until_idle(&manager, Duration::from_secs(10));

    assert_eq!(hook.completions(), 0);
}

// ── fail-fast paths ────────────────────────────────────────────────

#[test]
fn invalid_config_is_rejected_without_claiming_the_slot() {
    let (_input, _output, config) = video_fixture();
    let manager = slow_manager(Duration::from_millis(50));

    let result = manager.start(PipelineKind::BestFrames, config.with_batch_size(0));
    assert!(matches!(result, Err(SiftError::InvalidBatchSize(0))));
    assert_eq!(manager.active_pipeline(), None);
}

#[test]
fn missing_input_directory_is_rejected_at_admission() {
    let manager = slow_manager(Duration::from_millis(50));
    let config = ExtractionConfig::new(Path::new("/no/such/input"), "out");

    let result = manager.start(PipelineKind::TopImages, config);
    assert!(matches!(
        result,
        Err(SiftError::InputDirectoryNotFound(_))
    ));
    assert_eq!(manager.active_pipeline(), None);
}

#[test]
fn unknown_pipeline_name_is_rejected() {
    let (_input, _output, config) = video_fixture();
    let manager = slow_manager(Duration::from_millis(50));

    let result = manager.start_named("frame_blender", config);
    assert!(matches!(
        result,
        Err(SiftError::UnknownPipeline(name)) if name == "frame_blender"
    ));
    assert_eq!(manager.active_pipeline(), None);
}

#[test]
fn start_named_accepts_wire_names() {
    let (_input, _output, config) = video_fixture();
    let manager = slow_manager(Duration::from_millis(100));

    let message = manager
        .start_named("top_images", config)
        .expect("wire name should resolve");
    assert_eq!(message, "'top_images' started.");
    wait_until_idle(&manager, Duration::from_secs(10));
}
