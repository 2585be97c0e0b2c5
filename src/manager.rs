//! Single-flight extraction job management.
//!
//! [`ExtractionManager`] is the admission-control layer in front of the
//! pipelines: at most one extraction job is active system-wide. A `start`
//! call either claims the single-flight slot and returns immediately — the
//! pipeline runs on a background thread — or fails with
//! [`SiftError::AlreadyRunning`] naming the active pipeline.
//!
//! The admission check and the transition to running are one atomic step
//! under a mutex, so two racing `start` calls can never both observe an
//! idle manager. The slot is released by a drop guard when the background
//! job returns, fails, or panics — a broken pipeline can never wedge the
//! manager in the running state.
//!
//! The manager owns the shared collaborators: the video decoder, the image
//! codec, and a [`ScorerCell`] so the quality model is constructed once and
//! reused by every subsequent job. An optional [`CompletionHook`] is
//! forwarded to every started job and invoked when it finishes successfully.
//!
//! # Example
//!
//! ```no_run
//! use framesift::{ExtractionConfig, ExtractionManager, PipelineKind};
//!
//! let manager = ExtractionManager::with_defaults();
//! let config = ExtractionConfig::new("videos/", "frames/");
//! let message = manager.start(PipelineKind::BestFrames, config)?;
//! println!("{message}");
//! assert_eq!(manager.active_pipeline(), Some(PipelineKind::BestFrames));
//! # Ok::<(), framesift::SiftError>(())
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::config::ExtractionConfig;
use crate::decoder::VideoDecoder;
use crate::error::SiftError;
use crate::ffmpeg::FfmpegDecoder;
use crate::io::{DiskCodec, ImageCodec};
use crate::pipeline::{
    BestFramesPipeline, CompletionHook, NoOpCompletion, PipelineKind, TopImagesPipeline,
};
use crate::scoring::{ScorerCell, SharpnessScorer};

/// Shared handle to the single-flight job slot.
type ActiveSlot = Arc<Mutex<Option<PipelineKind>>>;

/// Admission control and background execution for extraction jobs.
///
/// Each manager instance owns its own job slot, so independent managers can
/// coexist (and be tested) without interfering through global state.
pub struct ExtractionManager {
    active: ActiveSlot,
    decoder: Arc<dyn VideoDecoder>,
    codec: Arc<dyn ImageCodec>,
    scorer: Arc<ScorerCell>,
    hook: Arc<dyn CompletionHook>,
}

impl ExtractionManager {
    /// Create a manager with explicit collaborators.
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        codec: Arc<dyn ImageCodec>,
        scorer: ScorerCell,
    ) -> Self {
        Self {
            active: Arc::new(Mutex::new(None)),
            decoder,
            codec,
            scorer: Arc::new(scorer),
            hook: Arc::new(NoOpCompletion),
        }
    }

    /// Attach a completion observer, invoked by every job this manager
    /// starts after the job's last output has been persisted. Jobs that
    /// fail do not invoke it.
    #[must_use]
    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Create a manager with the default stack: FFmpeg decoding, disk image
    /// I/O, and the built-in sharpness scorer.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(FfmpegDecoder::new()),
            Arc::new(DiskCodec::new()),
            ScorerCell::preloaded(Arc::new(SharpnessScorer::new())),
        )
    }

    /// Start a pipeline by its wire name.
    ///
    /// Convenience for callers at a string boundary (e.g. an HTTP handler).
    ///
    /// # Errors
    ///
    /// [`SiftError::UnknownPipeline`] for an unrecognized name, otherwise
    /// as [`start`](ExtractionManager::start).
    pub fn start_named(&self, name: &str, config: ExtractionConfig) -> Result<String, SiftError> {
        let kind: PipelineKind = name.parse()?;
        self.start(kind, config)
    }

    /// Admit and start an extraction job.
    ///
    /// Validates the configuration, atomically claims the single-flight
    /// slot, schedules the pipeline on a background thread, and returns an
    /// acknowledgement immediately — the caller does not wait for the job.
    ///
    /// # Errors
    ///
    /// * configuration errors from
    ///   [`ExtractionConfig::validate`] — rejected before the slot is
    ///   touched;
    /// * [`SiftError::AlreadyRunning`] when a job is active; no state is
    ///   changed and the caller may retry later.
    pub fn start(
        &self,
        kind: PipelineKind,
        config: ExtractionConfig,
    ) -> Result<String, SiftError> {
        // Fail fast on impossible configs without claiming the slot.
        config.validate()?;

        // Check-and-claim must be one atomic step: two concurrent starts
        // must never both observe an idle slot.
        {
            let mut slot = lock_slot(&self.active);
            if let Some(active) = *slot {
                log::error!(
                    "Rejecting '{kind}': pipeline '{active}' is already running",
                );
                return Err(SiftError::AlreadyRunning {
                    active: active.name().to_string(),
                });
            }
            *slot = Some(kind);
        }

        let job = Job {
            kind,
            config,
            decoder: Arc::clone(&self.decoder),
            codec: Arc::clone(&self.codec),
            scorer: Arc::clone(&self.scorer),
            hook: Arc::clone(&self.hook),
            release: ReleaseOnDrop {
                active: Arc::clone(&self.active),
            },
        };
        thread::spawn(move || job.run());

        log::info!("Pipeline '{kind}' started");
        Ok(format!("'{kind}' started."))
    }

    /// The currently running pipeline, if any. Pure read, for status
    /// polling.
    pub fn active_pipeline(&self) -> Option<PipelineKind> {
        *lock_slot(&self.active)
    }
}

/// A claimed extraction job, ready to run on a background thread.
struct Job {
    kind: PipelineKind,
    config: ExtractionConfig,
    decoder: Arc<dyn VideoDecoder>,
    codec: Arc<dyn ImageCodec>,
    scorer: Arc<ScorerCell>,
    hook: Arc<dyn CompletionHook>,
    release: ReleaseOnDrop,
}

impl Job {
    fn run(self) {
        // `self.release` drops when this returns — including on a scorer
        // construction failure or a pipeline panic — restoring the idle
        // state unconditionally.
        let result = self.execute();
        match result {
            Ok(()) => log::info!("Pipeline '{}' finished", self.kind),
            Err(error) => log::error!("Pipeline '{}' failed: {error}", self.kind),
        }
    }

    fn execute(&self) -> Result<(), SiftError> {
        // Resolving the scorer here serializes concurrent first loads and
        // keeps the (possibly network-bound) model fetch off the caller.
        let scorer = self.scorer.get()?;
        match self.kind {
            PipelineKind::BestFrames => BestFramesPipeline::new(
                self.config.clone(),
                Arc::clone(&self.decoder),
                Arc::clone(&self.codec),
                scorer,
            )
            .with_completion_hook(Arc::clone(&self.hook))
            .process(),
            PipelineKind::TopImages => {
                TopImagesPipeline::new(self.config.clone(), Arc::clone(&self.codec), scorer)
                    .with_completion_hook(Arc::clone(&self.hook))
                    .process()
            }
        }
    }
}

/// Restores the idle state when dropped, even if the job panicked.
struct ReleaseOnDrop {
    active: ActiveSlot,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        *lock_slot(&self.active) = None;
    }
}

/// Lock the slot, recovering from poisoning.
///
/// The slot only ever holds an `Option<PipelineKind>`, so a panic while it
/// is held cannot leave it logically inconsistent.
fn lock_slot(slot: &ActiveSlot) -> std::sync::MutexGuard<'_, Option<PipelineKind>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
