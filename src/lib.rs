//! # framesift
//!
//! Sample frames from videos and sift out the visually best ones, scored by
//! a pluggable image-quality model.
//!
//! `framesift` walks every video in a directory at one frame per second,
//! scores the sampled frames in batches, keeps the winners, and writes them
//! out as still images — or, in its second mode, scores an existing
//! directory of images and keeps the top percentile. Video decoding is
//! powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate; images are
//! [`image::DynamicImage`] values throughout.
//!
//! ## Quick Start
//!
//! ### Extract the best frames from a directory of videos
//!
//! ```no_run
//! use framesift::{ExtractionConfig, ExtractionManager, PipelineKind};
//!
//! let manager = ExtractionManager::with_defaults();
//! let config = ExtractionConfig::new("videos/", "frames/")
//!     .with_batch_size(60)
//!     .with_group_size(5);
//!
//! let message = manager.start(PipelineKind::BestFrames, config)?;
//! println!("{message}"); // "'best_frames' started."
//!
//! // The job runs in the background; poll for completion.
//! while manager.active_pipeline().is_some() {
//!     std::thread::sleep(std::time::Duration::from_millis(100));
//! }
//! # Ok::<(), framesift::SiftError>(())
//! ```
//!
//! ### Keep the top decile of a directory of images
//!
//! ```no_run
//! use framesift::{ExtractionConfig, ExtractionManager, PipelineKind};
//!
//! let manager = ExtractionManager::with_defaults();
//! let config = ExtractionConfig::new("photos/", "keepers/").with_top_percent(90.0);
//! manager.start(PipelineKind::TopImages, config)?;
//! # Ok::<(), framesift::SiftError>(())
//! ```
//!
//! ### Sample frames directly
//!
//! ```no_run
//! use framesift::{FfmpegDecoder, FrameSampler};
//!
//! let decoder = FfmpegDecoder::new();
//! let sampler = FrameSampler::open(&decoder, "input.mp4".as_ref(), 100)?;
//! for batch in sampler {
//!     println!("{} one-second-apart frames", batch.len());
//! }
//! # Ok::<(), framesift::SiftError>(())
//! ```
//!
//! ## Design
//!
//! - **Single-flight jobs** — [`ExtractionManager`] admits at most one
//!   extraction job at a time; a second `start` fails with
//!   [`SiftError::AlreadyRunning`] until the active job drains.
//! - **Deterministic selection** — [`select_best_per_group`] keeps exactly
//!   one frame per comparison group (ties to the first occurrence);
//!   [`select_top_percent`] keeps scores strictly above a
//!   linear-interpolation percentile.
//! - **Fault-tolerant sampling** — a decode failure at one frame index is
//!   skipped, not fatal; an unreadable image file is dropped from its
//!   batch. Only errors that stop all progress abort a job.
//! - **Pluggable scoring** — anything implementing [`QualityScorer`] can
//!   rank frames; [`SharpnessScorer`] (Laplacian variance) works out of the
//!   box, and [`WeightsSource`] fetches and caches pretrained weights for
//!   learned models.
//! - **Amortized model loading** — the scorer is constructed once through a
//!   [`ScorerCell`] and shared by every job.
//!
//! ## Logging
//!
//! Diagnostics go through the [`log`](https://crates.io/crates/log) facade.
//! FFmpeg's separate stderr logging can be tuned with
//! [`set_ffmpeg_log_level`].
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod config;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod io;
pub mod manager;
pub mod pipeline;
pub mod sampler;
pub mod scoring;
pub mod selection;
#[doc(hidden)]
pub mod testsupport;
pub mod weights;

pub use config::{ExtractionConfig, OutputFormat};
pub use decoder::{DecodeSession, VideoDecoder};
pub use error::SiftError;
pub use ffmpeg::{FfmpegDecoder, FfmpegLogLevel, set_ffmpeg_log_level};
pub use io::{DiskCodec, ImageCodec, read_many, write_many};
pub use manager::ExtractionManager;
pub use pipeline::{
    BestFramesPipeline, CompletionHook, NoOpCompletion, PipelineKind, TopImagesPipeline,
};
pub use sampler::{FrameBatch, FrameSampler, SampledFrame};
pub use scoring::{ImageTensor, QualityScorer, ScorerCell, ScoringAdapter, SharpnessScorer};
pub use selection::{select_best_per_group, select_top_percent};
pub use weights::WeightsSource;
