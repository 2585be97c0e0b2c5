//! One-frame-per-second video sampling.
//!
//! [`FrameSampler`] walks a video at a fixed temporal cadence — one decoded
//! frame per elapsed second — and yields the frames in fixed-size
//! [`FrameBatch`]es. It is a lazy, pull-based iterator: each call to
//! [`next()`](Iterator::next) decodes just enough frames to fill the next
//! batch, so the full frame set is never buffered.
//!
//! The sampler is deterministic: for a video with rounded frame rate `step`
//! and `count` total frames it targets exactly the indices
//! `0, step, 2·step, …` — `count / step` samples in total — regardless of
//! the batch size. A decode failure at one index is logged and skipped; it
//! does not abort the video. The underlying decode session is released when
//! the sampler is dropped.
//!
//! A sampler is single-pass. Re-sampling a video means opening a new sampler
//! through the decoder; an exhausted one cannot be rewound.
//!
//! # Example
//!
//! ```no_run
//! use framesift::{FfmpegDecoder, FrameSampler};
//!
//! let decoder = FfmpegDecoder::new();
//! let sampler = FrameSampler::open(&decoder, "input.mp4".as_ref(), 100)?;
//! for batch in sampler {
//!     println!("batch of {} frames", batch.len());
//! }
//! # Ok::<(), framesift::SiftError>(())
//! ```

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::decoder::{DecodeSession, VideoDecoder};
use crate::error::SiftError;

/// One frame sampled from a video, together with its source frame index.
#[derive(Debug, Clone)]
pub struct SampledFrame {
    /// Index of the frame within the source video.
    pub index: u64,
    /// The decoded frame.
    pub image: DynamicImage,
}

/// An ordered batch of sampled frames.
///
/// Produced lazily by [`FrameSampler`]; every batch except possibly the last
/// holds exactly `batch_size` frames (fewer when decode failures were
/// skipped).
#[derive(Debug, Clone, Default)]
pub struct FrameBatch {
    /// The sampled frames, in ascending source-index order.
    pub frames: Vec<SampledFrame>,
}

impl FrameBatch {
    /// Number of frames in the batch.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if the batch holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Borrow the images in batch order, without their indices.
    pub fn images(&self) -> Vec<&DynamicImage> {
        self.frames.iter().map(|frame| &frame.image).collect()
    }

    /// Consume the batch, yielding the images in batch order.
    pub fn into_images(self) -> Vec<DynamicImage> {
        self.frames.into_iter().map(|frame| frame.image).collect()
    }
}

/// Lazy iterator yielding one-second-apart frames in fixed-size batches.
pub struct FrameSampler {
    session: Box<dyn DecodeSession>,
    video_path: PathBuf,
    /// Distance between sampled frame indices: the frame rate rounded to the
    /// nearest integer, clamped to at least 1.
    step: u64,
    /// Number of samples the plan contains.
    sample_count: u64,
    /// Index into the sampling plan of the next frame to decode.
    next_sample: u64,
    batch_size: usize,
}

impl FrameSampler {
    /// Open `video_path` through `decoder` and build a sampling plan for it.
    ///
    /// Validation happens up front, before any frame is decoded: the batch
    /// size must be at least 1, and the video must report a positive frame
    /// rate and frame count.
    ///
    /// # Errors
    ///
    /// * [`SiftError::InvalidBatchSize`] — `batch_size` is zero.
    /// * [`SiftError::CannotOpenVideo`] — the file cannot be opened.
    /// * [`SiftError::InvalidVideo`] — non-positive frame rate or count.
    pub fn open(
        decoder: &dyn VideoDecoder,
        video_path: &Path,
        batch_size: usize,
    ) -> Result<Self, SiftError> {
        if batch_size < 1 {
            return Err(SiftError::InvalidBatchSize(batch_size));
        }

        let session = decoder.open(video_path)?;

        let frame_rate = session.frame_rate();
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(SiftError::InvalidVideo {
                path: video_path.to_path_buf(),
                reason: format!("non-positive frame rate: {frame_rate}"),
            });
        }
        let frame_count = session.frame_count();
        if frame_count == 0 {
            return Err(SiftError::InvalidVideo {
                path: video_path.to_path_buf(),
                reason: "zero frame count".to_string(),
            });
        }

        // One sample per full second of video. A video shorter than one
        // second yields an empty plan, which callers treat as "no frames to
        // choose from", not an error.
        let step = (frame_rate.round() as u64).max(1);
        let sample_count = frame_count / step;

        log::info!(
            "Sampling '{}' every {step} frames: {sample_count} samples from {frame_count} frames",
            video_path.display(),
        );

        Ok(Self {
            session,
            video_path: video_path.to_path_buf(),
            step,
            sample_count,
            next_sample: 0,
            batch_size,
        })
    }

    /// The distance in frames between two consecutive samples.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Total number of frame indices the sampling plan targets.
    pub fn planned_samples(&self) -> u64 {
        self.sample_count
    }
}

impl Iterator for FrameSampler {
    type Item = FrameBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_sample >= self.sample_count {
            return None;
        }

        let mut batch = FrameBatch::default();
        while self.next_sample < self.sample_count && batch.len() < self.batch_size {
            let index = self.next_sample * self.step;
            self.next_sample += 1;

            match self.session.read_at(index) {
                Ok(Some(image)) => batch.frames.push(SampledFrame { index, image }),
                Ok(None) => {
                    // Stream ended before the reported frame count.
                    log::warn!(
                        "Frame {index} of '{}' is past the end of stream; skipping",
                        self.video_path.display(),
                    );
                }
                Err(error) => {
                    // Transient container damage at one index does not abort
                    // the video.
                    log::warn!(
                        "Failed to decode frame {index} of '{}': {error}; skipping",
                        self.video_path.display(),
                    );
                }
            }
        }

        log::debug!(
            "Sampled batch of {} frames from '{}'",
            batch.len(),
            self.video_path.display(),
        );
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::SyntheticDecoder;

    fn collect_indices(sampler: FrameSampler) -> Vec<u64> {
        sampler
            .flat_map(|batch| batch.frames.into_iter().map(|frame| frame.index))
            .collect()
    }

    // ── cadence ────────────────────────────────────────────────────

    #[test]
    fn samples_one_frame_per_second() {
        // 10 seconds at 30 fps.
        let decoder = SyntheticDecoder::new(30.0, 300);
        let sampler = FrameSampler::open(&decoder, "video.mp4".as_ref(), 100)
            .expect("Failed to open sampler");

        let indices = collect_indices(sampler);
        let expected: Vec<u64> = (0..10).map(|second| second * 30).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn cadence_is_independent_of_batch_size() {
        let reference: Vec<u64> = {
            let decoder = SyntheticDecoder::new(24.0, 241);
            let sampler =
                FrameSampler::open(&decoder, "video.mp4".as_ref(), 1).expect("open failed");
            collect_indices(sampler)
        };

        for batch_size in [2, 3, 7, 100] {
            let decoder = SyntheticDecoder::new(24.0, 241);
            let sampler = FrameSampler::open(&decoder, "video.mp4".as_ref(), batch_size)
                .expect("open failed");
            assert_eq!(
                collect_indices(sampler),
                reference,
                "batch_size={batch_size} changed the sampled sequence",
            );
        }
    }

    #[test]
    fn fractional_frame_rate_rounds_to_nearest() {
        // 29.97 fps rounds to a step of 30.
        let decoder = SyntheticDecoder::new(29.97, 90);
        let sampler =
            FrameSampler::open(&decoder, "video.mp4".as_ref(), 10).expect("open failed");
        assert_eq!(sampler.step(), 30);
        assert_eq!(sampler.planned_samples(), 3);
    }

    // ── batching ───────────────────────────────────────────────────

    #[test]
    fn batches_fill_then_remainder() {
        // Scenario: 10 one-second samples, batch size 4 → 4 + 4 + 2.
        let decoder = SyntheticDecoder::new(30.0, 300);
        let sampler =
            FrameSampler::open(&decoder, "video.mp4".as_ref(), 4).expect("open failed");

        let sizes: Vec<usize> = sampler.map(|batch| batch.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn short_video_yields_no_batches() {
        // Fewer frames than one second's worth.
        let decoder = SyntheticDecoder::new(30.0, 10);
        let sampler =
            FrameSampler::open(&decoder, "video.mp4".as_ref(), 4).expect("open failed");
        assert_eq!(sampler.planned_samples(), 0);
        assert_eq!(sampler.count(), 0);
    }

    // ── fault tolerance ────────────────────────────────────────────

    #[test]
    fn decode_failures_are_skipped_not_fatal() {
        let decoder = SyntheticDecoder::new(30.0, 300).with_failing_indices(&[30, 60]);
        let sampler =
            FrameSampler::open(&decoder, "video.mp4".as_ref(), 100).expect("open failed");

        let indices = collect_indices(sampler);
        assert_eq!(indices.len(), 8, "two of ten samples should be skipped");
        assert!(!indices.contains(&30));
        assert!(!indices.contains(&60));
    }

    // ── validation ─────────────────────────────────────────────────

    #[test]
    fn zero_batch_size_is_rejected_before_open() {
        let decoder = SyntheticDecoder::new(30.0, 300);
        let result = FrameSampler::open(&decoder, "video.mp4".as_ref(), 0);
        assert!(matches!(result, Err(SiftError::InvalidBatchSize(0))));
        assert_eq!(decoder.open_count(), 0, "no session should be opened");
    }

    #[test]
    fn non_positive_frame_rate_is_invalid() {
        let decoder = SyntheticDecoder::new(0.0, 300);
        let result = FrameSampler::open(&decoder, "video.mp4".as_ref(), 4);
        assert!(matches!(result, Err(SiftError::InvalidVideo { .. })));
    }

    #[test]
    fn zero_frame_count_is_invalid() {
        let decoder = SyntheticDecoder::new(30.0, 0);
        let result = FrameSampler::open(&decoder, "video.mp4".as_ref(), 4);
        assert!(matches!(result, Err(SiftError::InvalidVideo { .. })));
    }
}
