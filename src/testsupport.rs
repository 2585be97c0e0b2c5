//! Synthetic collaborators for deterministic testing.
//!
//! Not part of the public API — this module exists so the crate's own unit
//! and integration tests can exercise the sampling, pipeline, and manager
//! logic without real video files, model weights, or FFmpeg.

#![doc(hidden)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Luma};

use crate::decoder::{DecodeSession, VideoDecoder};
use crate::error::SiftError;
use crate::pipeline::{CompletionHook, PipelineKind};
use crate::scoring::{ImageTensor, QualityScorer};

/// A [`VideoDecoder`] that fabricates frames instead of reading files.
///
/// Every opened session reports the configured frame rate and frame count.
/// Frame `i` is an 8×8 gray image whose brightness grows with `i`, so
/// brightness-based scorers rank later frames higher, deterministically.
pub struct SyntheticDecoder {
    frame_rate: f64,
    frame_count: u64,
    failing_indices: HashSet<u64>,
    opens: AtomicUsize,
}

impl SyntheticDecoder {
    pub fn new(frame_rate: f64, frame_count: u64) -> Self {
        Self {
            frame_rate,
            frame_count,
            failing_indices: HashSet::new(),
            opens: AtomicUsize::new(0),
        }
    }

    /// Make `read_at` fail for the given frame indices.
    pub fn with_failing_indices(mut self, indices: &[u64]) -> Self {
        self.failing_indices = indices.iter().copied().collect();
        self
    }

    /// How many sessions have been opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl VideoDecoder for SyntheticDecoder {
    fn open(&self, _path: &Path) -> Result<Box<dyn DecodeSession>, SiftError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticSession {
            frame_rate: self.frame_rate,
            frame_count: self.frame_count,
            failing_indices: self.failing_indices.clone(),
        }))
    }
}

struct SyntheticSession {
    frame_rate: f64,
    frame_count: u64,
    failing_indices: HashSet<u64>,
}

impl DecodeSession for SyntheticSession {
    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn read_at(&mut self, index: u64) -> Result<Option<DynamicImage>, SiftError> {
        if self.failing_indices.contains(&index) {
            return Err(SiftError::FrameDecode(format!(
                "synthetic decode failure at frame {index}"
            )));
        }
        if index >= self.frame_count {
            return Ok(None);
        }
        Ok(Some(synthetic_frame(index)))
    }
}

/// An 8×8 frame whose brightness encodes its index.
pub fn synthetic_frame(index: u64) -> DynamicImage {
    let value = (index / 4).min(255) as u8;
    DynamicImage::ImageLuma8(GrayImage::from_pixel(8, 8, Luma([value])))
}

/// A decoder whose every `open` fails, for abort-policy tests.
pub struct UnopenableDecoder;

impl VideoDecoder for UnopenableDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, SiftError> {
        Err(SiftError::CannotOpenVideo {
            path: path.to_path_buf(),
            reason: "synthetic open failure".to_string(),
        })
    }
}

/// Scores each image by its mean channel value.
///
/// Paired with [`SyntheticDecoder`], later frames score higher, so
/// selection outcomes are fully predictable.
pub struct BrightnessScorer;

impl QualityScorer for BrightnessScorer {
    fn score_batch(&self, batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError> {
        Ok(batch
            .iter()
            .map(|tensor| {
                tensor.data.iter().map(|&v| v as f64).sum::<f64>() / tensor.data.len() as f64
            })
            .collect())
    }
}

/// Sleeps before scoring, to hold the single-flight slot open in tests.
pub struct SlowScorer {
    pub delay: Duration,
}

impl QualityScorer for SlowScorer {
    fn score_batch(&self, batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError> {
        std::thread::sleep(self.delay);
        Ok(vec![1.0; batch.len()])
    }
}

/// A [`CompletionHook`] that records how often it fired and for which
/// pipeline.
#[derive(Default)]
pub struct CountingHook {
    completions: AtomicUsize,
    last: Mutex<Option<PipelineKind>>,
}

impl CountingHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `on_complete` has been invoked.
    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    /// The pipeline most recently reported as complete.
    pub fn last_pipeline(&self) -> Option<PipelineKind> {
        *self.last.lock().expect("hook mutex poisoned")
    }
}

impl CompletionHook for CountingHook {
    fn on_complete(&self, pipeline: PipelineKind) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().expect("hook mutex poisoned") = Some(pipeline);
    }
}

/// Always refuses to score, mimicking a failed model acquisition.
pub struct UnavailableScorer;

impl QualityScorer for UnavailableScorer {
    fn score_batch(&self, _batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError> {
        Err(SiftError::ModelUnavailable(
            "synthetic weights fetch failure".to_string(),
        ))
    }
}
