//! Error types for the `framesift` crate.
//!
//! This module defines [`SiftError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry rich context to aid
//! debugging, including file paths, configuration values, and upstream error
//! messages.
//!
//! The taxonomy mirrors how the engine reacts to each failure:
//!
//! * configuration errors ([`SiftError::InvalidBatchSize`],
//!   [`SiftError::InvalidGroupSize`], [`SiftError::InvalidPercent`],
//!   [`SiftError::InputDirectoryNotFound`], [`SiftError::UnknownPipeline`])
//!   are rejected before any I/O happens;
//! * resource errors ([`SiftError::EmptyInputDirectory`],
//!   [`SiftError::CannotOpenVideo`], [`SiftError::InvalidVideo`]) abort the
//!   current job — it cannot make progress as given;
//! * [`SiftError::ModelUnavailable`] also aborts the job but is kept distinct
//!   so callers can schedule a retry once the network recovers;
//! * [`SiftError::AlreadyRunning`] is an admission-time rejection with no
//!   state change.
//!
//! Per-item failures (one undecodable frame, one unreadable image file) are
//! *not* errors at this level: they are logged and skipped by the sampler and
//! the concurrent I/O helpers.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all `framesift` operations.
///
/// Every public method that can fail returns `Result<T, SiftError>`. Variants
/// carry enough context to diagnose the problem without needing additional
/// logging at the call site.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SiftError {
    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    CannotOpenVideo {
        /// Path that was passed to the decoder.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The video reported a non-positive frame rate or frame count, so a
    /// sampling plan cannot be built from it.
    #[error("Invalid video at {path}: {reason}")]
    InvalidVideo {
        /// Path of the offending video.
        path: PathBuf,
        /// What made the video unusable (e.g. a zero frame rate).
        reason: String,
    },

    /// A video frame could not be decoded.
    ///
    /// Surfaced by the decoder session; the sampler logs and skips the
    /// affected index rather than propagating this.
    #[error("Failed to decode video frame: {0}")]
    FrameDecode(String),

    /// The configured input directory does not exist or is not a directory.
    #[error("Input directory does not exist: {0}")]
    InputDirectoryNotFound(PathBuf),

    /// The input directory contains nothing to process.
    ///
    /// Listing the input directory produced no usable files — nothing to do
    /// is treated as a caller error, not a silent no-op, so misconfiguration
    /// surfaces quickly.
    #[error(
        "No files with extensions {extensions:?} found in {directory} \
         (files prefixed with {ignored_prefix:?} are skipped as already processed)"
    )]
    EmptyInputDirectory {
        /// The directory that was listed.
        directory: PathBuf,
        /// The extensions the listing matched against.
        extensions: Vec<String>,
        /// Prefix that marks already-processed files, if one was applied.
        ignored_prefix: Option<String>,
    },

    /// A batch size of zero was provided.
    #[error("Batch size must be at least 1 (got {0})")]
    InvalidBatchSize(usize),

    /// A comparison group size of zero was provided.
    #[error("Comparison group size must be at least 1 (got {0})")]
    InvalidGroupSize(usize),

    /// The top-percent threshold is outside the `0.0..=100.0` range.
    #[error("Top percent must be within 0.0..=100.0 (got {0})")]
    InvalidPercent(f64),

    /// The quality scorer could not be constructed, typically because its
    /// model weights could not be fetched.
    ///
    /// Distinct from other configuration errors so callers can distinguish
    /// "transient network failure, retry later" from "bad input".
    #[error("Quality scorer unavailable: {0}")]
    ModelUnavailable(String),

    /// An extraction job is already active.
    ///
    /// Maps naturally to an HTTP 409 at the (out-of-scope) web boundary.
    #[error(
        "Pipeline '{active}' is already running; only one extraction job \
         may be active at a time"
    )]
    AlreadyRunning {
        /// Name of the pipeline currently holding the single-flight slot.
        active: String,
    },

    /// A pipeline name did not match any known pipeline.
    #[error("Unknown pipeline name: {0:?}")]
    UnknownPipeline(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while encoding or decoding an image.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for SiftError {
    fn from(error: FfmpegError) -> Self {
        SiftError::FfmpegError(error.to_string())
    }
}
