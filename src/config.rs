//! Extraction job configuration.
//!
//! [`ExtractionConfig`] is an immutable, builder-style description of one
//! extraction job: where to read inputs, where to write outputs, how large
//! scoring batches and comparison groups are, and how images are normalized
//! before scoring.
//!
//! # Example
//!
//! ```no_run
//! use framesift::{ExtractionConfig, OutputFormat};
//!
//! let config = ExtractionConfig::new("videos/", "frames/")
//!     .with_batch_size(60)
//!     .with_group_size(5)
//!     .with_top_percent(90.0)
//!     .with_output_format(OutputFormat::Png);
//! ```

use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::SiftError;

/// Encoding format for persisted output images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// JPEG output (`.jpg`). This is the default.
    #[default]
    Jpeg,
    /// PNG output (`.png`).
    Png,
}

impl OutputFormat {
    /// The filename extension for this format, without a leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// Map to the corresponding `image` crate format constant.
    pub(crate) fn to_image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

/// Configuration for one extraction job.
///
/// Construct with [`ExtractionConfig::new`] and customize via the `with_*`
/// builder methods. The struct is cloned into the background job on
/// admission, so mutating a config after starting a job has no effect on it.
///
/// Call [`validate`](ExtractionConfig::validate) to fail fast on impossible
/// settings; the pipelines do this before any I/O.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Directory containing the input videos or images.
    pub input_directory: PathBuf,
    /// Directory where selected images are written. Created if missing.
    pub output_directory: PathBuf,
    /// Filename extensions recognized as videos (without leading dot).
    pub video_extensions: Vec<String>,
    /// Filename extensions recognized as images (without leading dot).
    pub image_extensions: Vec<String>,
    /// Prefix prepended to a video's filename once it has been processed.
    pub processed_prefix: String,
    /// Maximum number of images presented to the scorer in one call.
    pub batch_size: usize,
    /// Size of the comparison groups used by best-of-group selection.
    pub group_size: usize,
    /// Percentile threshold used by top-percent selection.
    pub top_percent: f64,
    /// Width and height every image is resized to before scoring.
    pub target_size: (u32, u32),
    /// Encoding format for persisted output images.
    pub output_format: OutputFormat,
}

impl ExtractionConfig {
    /// Create a configuration for the given input and output directories
    /// with default tuning values.
    ///
    /// Defaults: `mp4` videos, `jpg` images, processed prefix
    /// `"frames_extracted_"`, batch size 100, group size 5, top percent 90,
    /// 224×224 normalization, JPEG output.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(input_directory: P, output_directory: Q) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
            output_directory: output_directory.as_ref().to_path_buf(),
            video_extensions: vec!["mp4".to_string()],
            image_extensions: vec!["jpg".to_string()],
            processed_prefix: "frames_extracted_".to_string(),
            batch_size: 100,
            group_size: 5,
            top_percent: 90.0,
            target_size: (224, 224),
            output_format: OutputFormat::Jpeg,
        }
    }

    /// Set the filename extensions recognized as videos.
    #[must_use]
    pub fn with_video_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.video_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the filename extensions recognized as images.
    #[must_use]
    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the prefix that marks a video as already processed.
    #[must_use]
    pub fn with_processed_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.processed_prefix = prefix.into();
        self
    }

    /// Set the maximum number of images scored in a single call.
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the comparison group size for best-of-group selection.
    #[must_use]
    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size;
        self
    }

    /// Set the percentile threshold for top-percent selection.
    #[must_use]
    pub fn with_top_percent(mut self, percent: f64) -> Self {
        self.top_percent = percent;
        self
    }

    /// Set the width and height images are normalized to before scoring.
    #[must_use]
    pub fn with_target_size(mut self, width: u32, height: u32) -> Self {
        self.target_size = (width, height);
        self
    }

    /// Set the encoding format for persisted output images.
    #[must_use]
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Check the configuration for values no job can run with.
    ///
    /// Fails fast, before any I/O:
    ///
    /// * [`SiftError::InvalidBatchSize`] when `batch_size` is zero;
    /// * [`SiftError::InvalidGroupSize`] when `group_size` is zero;
    /// * [`SiftError::InvalidPercent`] when `top_percent` is outside
    ///   `0.0..=100.0` or not finite;
    /// * [`SiftError::InputDirectoryNotFound`] when the input directory does
    ///   not exist or is not a directory.
    pub fn validate(&self) -> Result<(), SiftError> {
        if self.batch_size < 1 {
            return Err(SiftError::InvalidBatchSize(self.batch_size));
        }
        if self.group_size < 1 {
            return Err(SiftError::InvalidGroupSize(self.group_size));
        }
        if !self.top_percent.is_finite() || !(0.0..=100.0).contains(&self.top_percent) {
            return Err(SiftError::InvalidPercent(self.top_percent));
        }
        if !self.input_directory.is_dir() {
            return Err(SiftError::InputDirectoryNotFound(
                self.input_directory.clone(),
            ));
        }
        Ok(())
    }
}
