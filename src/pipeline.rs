//! Extraction pipelines.
//!
//! The two orchestrations built from the sampler, scorer, selectors, and
//! concurrent I/O:
//!
//! * [`BestFramesPipeline`] — for every unprocessed video in the input
//!   directory: sample one frame per second, score each batch, keep the best
//!   frame of every comparison group, persist the keepers, then rename the
//!   video with the processed prefix. The rename is the sole persistent
//!   record of progress, and it happens only after every frame of that video
//!   has been written — a crash mid-video leaves it unmarked and it will be
//!   re-processed on the next run.
//! * [`TopImagesPipeline`] — score every image in the input directory in
//!   fixed-size batches and persist those above the configured percentile.
//!   No done-marking: outputs land in a different directory, and re-runs
//!   re-score by design.
//!
//! A fatal error on one video (cannot open, invalid metadata) aborts the
//! whole job; per-frame and per-file decode failures are skipped. Both
//! policies are explicit and tested, not accidents of error propagation.
//!
//! Pipeline identity is the closed [`PipelineKind`] enum — exhaustively
//! matched at compile time — with [`FromStr`] at the string boundary for
//! external callers.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::decoder::VideoDecoder;
use crate::error::SiftError;
use crate::io::{ImageCodec, read_many, write_many};
use crate::sampler::FrameSampler;
use crate::scoring::{QualityScorer, ScoringAdapter};
use crate::selection::{select_best_per_group, select_top_percent};

/// The closed set of extraction pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Extract the visually best frames from every unprocessed video.
    BestFrames,
    /// Keep the top-scoring percentile of a directory of images.
    TopImages,
}

impl PipelineKind {
    /// The wire name of the pipeline, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            PipelineKind::BestFrames => "best_frames",
            PipelineKind::TopImages => "top_images",
        }
    }
}

impl Display for PipelineKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

impl FromStr for PipelineKind {
    type Err = SiftError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "best_frames" => Ok(PipelineKind::BestFrames),
            "top_images" => Ok(PipelineKind::TopImages),
            other => Err(SiftError::UnknownPipeline(other.to_string())),
        }
    }
}

/// Observer invoked when a pipeline run completes successfully.
///
/// External callers (e.g. shutdown orchestration) can hook this to learn
/// that a job has drained; the default is a no-op.
pub trait CompletionHook: Send + Sync {
    /// Called once, after the pipeline's last batch has been persisted.
    fn on_complete(&self, pipeline: PipelineKind);
}

/// The default [`CompletionHook`] that does nothing.
pub struct NoOpCompletion;

impl CompletionHook for NoOpCompletion {
    fn on_complete(&self, _pipeline: PipelineKind) {}
}

/// Best-frames extraction over every unprocessed video in a directory.
pub struct BestFramesPipeline {
    config: ExtractionConfig,
    decoder: Arc<dyn VideoDecoder>,
    codec: Arc<dyn ImageCodec>,
    scorer: Arc<dyn QualityScorer>,
    hook: Arc<dyn CompletionHook>,
}

impl BestFramesPipeline {
    /// Create the pipeline from its collaborators.
    pub fn new(
        config: ExtractionConfig,
        decoder: Arc<dyn VideoDecoder>,
        codec: Arc<dyn ImageCodec>,
        scorer: Arc<dyn QualityScorer>,
    ) -> Self {
        Self {
            config,
            decoder,
            codec,
            scorer,
            hook: Arc::new(NoOpCompletion),
        }
    }

    /// Attach a completion observer.
    #[must_use]
    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Configuration errors surface before any I/O. A directory with no
    /// unprocessed videos is [`SiftError::EmptyInputDirectory`]. A video
    /// that cannot be opened or reports invalid metadata aborts the job;
    /// individual frame decode failures are skipped.
    pub fn process(&self) -> Result<(), SiftError> {
        self.config.validate()?;
        log::info!(
            "Starting best-frames extraction from '{}'",
            self.config.input_directory.display(),
        );

        let videos = list_directory_files(
            &self.config.input_directory,
            &self.config.video_extensions,
            Some(&self.config.processed_prefix),
        )?;
        fs::create_dir_all(&self.config.output_directory)?;

        // One adapter (and thus one scorer resolution) for the whole job;
        // model load is amortized across every video and batch.
        let adapter = ScoringAdapter::new(Arc::clone(&self.scorer), self.config.target_size);

        for video_path in &videos {
            self.extract_video(video_path, &adapter)?;
            mark_processed(video_path, &self.config.processed_prefix)?;
            log::info!("Frames extraction finished for video '{}'", video_path.display());
        }

        log::info!("Extraction process finished; all videos processed.");
        self.hook.on_complete(PipelineKind::BestFrames);
        Ok(())
    }

    /// Sample, score, select, and persist the best frames of one video.
    fn extract_video(
        &self,
        video_path: &Path,
        adapter: &ScoringAdapter,
    ) -> Result<(), SiftError> {
        let sampler =
            FrameSampler::open(&*self.decoder, video_path, self.config.batch_size)?;

        for batch in sampler {
            // A short or fully-undecodable stretch produces an empty batch;
            // "no best frame found" is not an error.
            if batch.is_empty() {
                continue;
            }
            let scores = adapter.score(&batch.images())?;
            let best = select_best_per_group(
                batch.into_images(),
                &scores,
                self.config.group_size,
            )?;
            write_many(
                &*self.codec,
                &best,
                &self.config.output_directory,
                self.config.output_format,
            )?;
        }
        Ok(())
    }
}

/// Top-percentile selection over a directory of images.
pub struct TopImagesPipeline {
    config: ExtractionConfig,
    codec: Arc<dyn ImageCodec>,
    scorer: Arc<dyn QualityScorer>,
    hook: Arc<dyn CompletionHook>,
}

impl TopImagesPipeline {
    /// Create the pipeline from its collaborators.
    pub fn new(
        config: ExtractionConfig,
        codec: Arc<dyn ImageCodec>,
        scorer: Arc<dyn QualityScorer>,
    ) -> Self {
        Self {
            config,
            codec,
            scorer,
            hook: Arc::new(NoOpCompletion),
        }
    }

    /// Attach a completion observer.
    #[must_use]
    pub fn with_completion_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Run the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Configuration errors surface before any I/O; an input directory with
    /// no matching images is [`SiftError::EmptyInputDirectory`]. Unreadable
    /// individual files are dropped, not fatal.
    pub fn process(&self) -> Result<(), SiftError> {
        self.config.validate()?;
        log::info!(
            "Starting top-images extraction from '{}'",
            self.config.input_directory.display(),
        );

        let image_paths = list_directory_files(
            &self.config.input_directory,
            &self.config.image_extensions,
            None,
        )?;
        fs::create_dir_all(&self.config.output_directory)?;

        let adapter = ScoringAdapter::new(Arc::clone(&self.scorer), self.config.target_size);

        for batch_paths in image_paths.chunks(self.config.batch_size) {
            let images = read_many(&*self.codec, batch_paths);
            if images.is_empty() {
                continue;
            }
            let references: Vec<&_> = images.iter().collect();
            let scores = adapter.score(&references)?;
            let top = select_top_percent(images, &scores, self.config.top_percent)?;
            write_many(
                &*self.codec,
                &top,
                &self.config.output_directory,
                self.config.output_format,
            )?;
        }

        log::info!(
            "Extraction process finished; all top images extracted from '{}'.",
            self.config.input_directory.display(),
        );
        self.hook.on_complete(PipelineKind::TopImages);
        Ok(())
    }
}

/// List files in `directory` whose extension matches one of `extensions`,
/// skipping those whose filename carries `excluded_prefix`.
///
/// Order is the filesystem's listing order — deterministic within one run,
/// but not guaranteed to be lexical across platforms.
///
/// # Errors
///
/// Returns [`SiftError::EmptyInputDirectory`] when no file matches: a job
/// with nothing to do points at misconfiguration and should fail loudly.
fn list_directory_files(
    directory: &Path,
    extensions: &[String],
    excluded_prefix: Option<&str>,
) -> Result<Vec<PathBuf>, SiftError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches_extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(extension))
            });
        if !matches_extension {
            continue;
        }
        let has_excluded_prefix = excluded_prefix.is_some_and(|prefix| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        });
        if has_excluded_prefix {
            continue;
        }
        files.push(path);
    }

    if files.is_empty() {
        return Err(SiftError::EmptyInputDirectory {
            directory: directory.to_path_buf(),
            extensions: extensions.to_vec(),
            ignored_prefix: excluded_prefix.map(str::to_string),
        });
    }

    log::info!("Listed {} files in '{}'", files.len(), directory.display());
    log::debug!("Listed file paths: {files:?}");
    Ok(files)
}

/// Rename a processed video so its filename carries the done prefix.
///
/// The rename is the state transition that marks a video processed; it must
/// only be called after all of the video's output has been durably written.
fn mark_processed(video_path: &Path, prefix: &str) -> Result<PathBuf, SiftError> {
    let file_name = video_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let new_path = video_path.with_file_name(format!("{prefix}{file_name}"));
    fs::rename(video_path, &new_path)?;
    log::debug!(
        "Prefix '{prefix}' added to '{}'; new path '{}'",
        video_path.display(),
        new_path.display(),
    );
    Ok(new_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_names_round_trip() {
        for kind in [PipelineKind::BestFrames, PipelineKind::TopImages] {
            let parsed: PipelineKind = kind.name().parse().expect("parse failed");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn unknown_pipeline_name_is_an_error() {
        let result = "frame_sorter_3000".parse::<PipelineKind>();
        assert!(matches!(result, Err(SiftError::UnknownPipeline(name)) if name == "frame_sorter_3000"));
    }

    #[test]
    fn listing_skips_prefixed_and_foreign_files() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(dir.path().join("a.mp4"), b"").expect("write failed");
        fs::write(dir.path().join("frames_extracted_b.mp4"), b"").expect("write failed");
        fs::write(dir.path().join("notes.txt"), b"").expect("write failed");

        let files = list_directory_files(
            dir.path(),
            &["mp4".to_string()],
            Some("frames_extracted_"),
        )
        .expect("listing failed");

        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("a.mp4"));
    }

    #[test]
    fn listing_nothing_is_an_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = list_directory_files(dir.path(), &["mp4".to_string()], None);
        assert!(matches!(result, Err(SiftError::EmptyInputDirectory { .. })));
    }

    #[test]
    fn mark_processed_renames_in_place() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let video = dir.path().join("clip.mp4");
        fs::write(&video, b"").expect("write failed");

        let renamed = mark_processed(&video, "frames_extracted_").expect("rename failed");
        assert!(!video.exists());
        assert!(renamed.exists());
        assert!(renamed.ends_with("frames_extracted_clip.mp4"));
    }
}
