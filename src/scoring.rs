//! Image quality scoring.
//!
//! The engine treats the quality model as an abstract collaborator: anything
//! implementing [`QualityScorer`] can score a batch of normalized images.
//! [`ScoringAdapter`] sits between raw decoded frames and the scorer — it
//! resizes each image to the model's input size, converts to tightly-packed
//! RGB floats in `[0, 1]`, and presents the whole batch in a single call so
//! model-invocation overhead is amortized.
//!
//! Scores are plain floats with no guaranteed range; selection policies rely
//! only on their total order.
//!
//! [`SharpnessScorer`] is the built-in, dependency-free scorer: it ranks
//! images by the variance of a Laplacian response, a standard focus measure
//! that needs no pretrained weights. Scorers that do need weights can fetch
//! them through [`WeightsSource`](crate::WeightsSource) and should surface
//! fetch failures as [`SiftError::ModelUnavailable`].

use std::sync::Arc;

use image::{DynamicImage, imageops::FilterType};
use once_cell::sync::OnceCell;

use crate::error::SiftError;

/// A normalized image, ready to be presented to a quality model.
///
/// Pixels are tightly-packed interleaved RGB floats in `[0, 1]`, row-major.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    /// Interleaved RGB pixel data, `width * height * 3` values.
    pub data: Vec<f32>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageTensor {
    /// Luminance of the pixel at `(x, y)` using Rec. 601 weights.
    pub fn luma(&self, x: u32, y: u32) -> f32 {
        let offset = ((y * self.width + x) * 3) as usize;
        0.299 * self.data[offset] + 0.587 * self.data[offset + 1] + 0.114 * self.data[offset + 2]
    }
}

/// The abstract quality-model collaborator.
///
/// Given a batch of normalized images, returns one score per image, in input
/// order. Scores have no defined range — only their relative order matters.
///
/// Implementations are shared across jobs as read-mostly singletons, so they
/// must be `Send + Sync`. Scoring is invoked once per batch from a single
/// thread; implementations do not need to support concurrent calls
/// efficiently.
pub trait QualityScorer: Send + Sync {
    /// Score a batch of normalized images.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::ModelUnavailable`] when the underlying model
    /// cannot be used (e.g. a lazy weights fetch failed).
    fn score_batch(&self, batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError>;
}

/// Normalizes raw images and invokes a [`QualityScorer`] on them.
///
/// Constructed once per pipeline run and reused for every batch, so the
/// scorer behind it is only resolved (and its model only loaded) once.
pub struct ScoringAdapter {
    scorer: Arc<dyn QualityScorer>,
    target_size: (u32, u32),
}

impl ScoringAdapter {
    /// Create an adapter that normalizes to `target_size` before scoring.
    pub fn new(scorer: Arc<dyn QualityScorer>, target_size: (u32, u32)) -> Self {
        Self {
            scorer,
            target_size,
        }
    }

    /// Normalize one image: resize to the target size (Lanczos3, matching
    /// the quality-over-speed choice models are trained with) and scale RGB
    /// to `[0, 1]` floats.
    pub fn normalize(&self, image: &DynamicImage) -> ImageTensor {
        let (width, height) = self.target_size;
        let resized = image.resize_exact(width, height, FilterType::Lanczos3);
        let rgb = resized.to_rgb8();
        let data = rgb.as_raw().iter().map(|&value| value as f32 / 255.0).collect();
        ImageTensor {
            data,
            width,
            height,
        }
    }

    /// Normalize a batch of images and score them in one scorer call.
    ///
    /// The returned scores are in input order. If the scorer returns a
    /// different number of scores than images were given, a warning is
    /// logged and the scores are returned as-is — callers must treat the
    /// lengths defensively rather than assume they match.
    ///
    /// # Errors
    ///
    /// Propagates scorer failures, notably [`SiftError::ModelUnavailable`].
    pub fn score(&self, images: &[&DynamicImage]) -> Result<Vec<f64>, SiftError> {
        log::debug!("Scoring batch of {} images", images.len());
        let batch: Vec<ImageTensor> = images.iter().map(|image| self.normalize(image)).collect();
        let scores = self.scorer.score_batch(&batch)?;
        if scores.len() != images.len() {
            log::warn!(
                "Scorer returned {} scores for {} images; lengths don't match",
                scores.len(),
                images.len(),
            );
        }
        Ok(scores)
    }
}

/// One-time, race-free construction of a shared scorer.
///
/// The first job to need the scorer runs the factory (which may download
/// model weights); concurrent first uses are serialized so construction
/// happens exactly once, and every later job reuses the same instance.
pub struct ScorerCell {
    cell: OnceCell<Arc<dyn QualityScorer>>,
    factory: Option<Box<dyn Fn() -> Result<Arc<dyn QualityScorer>, SiftError> + Send + Sync>>,
}

impl ScorerCell {
    /// Create a cell that will run `factory` on first use.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn QualityScorer>, SiftError> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Some(Box::new(factory)),
        }
    }

    /// Create a cell around an already-constructed scorer.
    pub fn preloaded(scorer: Arc<dyn QualityScorer>) -> Self {
        Self {
            cell: OnceCell::with_value(scorer),
            factory: None,
        }
    }

    /// Get the scorer, constructing it on first call.
    ///
    /// # Errors
    ///
    /// Propagates the factory's error (typically
    /// [`SiftError::ModelUnavailable`]); a failed construction is retried on
    /// the next call.
    pub fn get(&self) -> Result<Arc<dyn QualityScorer>, SiftError> {
        self.cell
            .get_or_try_init(|| match &self.factory {
                Some(factory) => factory(),
                None => Err(SiftError::ModelUnavailable(
                    "scorer cell has neither a value nor a factory".to_string(),
                )),
            })
            .cloned()
    }
}

/// Built-in scorer ranking images by Laplacian variance.
///
/// A sharp, detailed image has strong local intensity changes, which a
/// Laplacian filter turns into a high-variance response; a blurry or flat
/// frame scores near zero. This needs no model weights, making it the
/// default scorer for setups without a learned quality model.
#[derive(Debug, Clone, Copy, Default)]
pub struct SharpnessScorer;

impl SharpnessScorer {
    /// Create a new sharpness scorer.
    pub fn new() -> Self {
        Self
    }

    /// Variance of the 4-neighbour Laplacian over the tensor's luminance.
    fn laplacian_variance(tensor: &ImageTensor) -> f64 {
        let (width, height) = (tensor.width, tensor.height);
        if width < 3 || height < 3 {
            return 0.0;
        }

        let mut responses = Vec::with_capacity(((width - 2) * (height - 2)) as usize);
        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let response = 4.0 * tensor.luma(x, y)
                    - tensor.luma(x - 1, y)
                    - tensor.luma(x + 1, y)
                    - tensor.luma(x, y - 1)
                    - tensor.luma(x, y + 1);
                responses.push(response as f64);
            }
        }

        let count = responses.len() as f64;
        let mean = responses.iter().sum::<f64>() / count;
        responses
            .iter()
            .map(|response| {
                let diff = response - mean;
                diff * diff
            })
            .sum::<f64>()
            / count
    }
}

impl QualityScorer for SharpnessScorer {
    fn score_batch(&self, batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError> {
        Ok(batch.iter().map(Self::laplacian_variance).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use image::{DynamicImage, GrayImage, Luma};

    use super::*;

    fn flat_image(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([value])))
    }

    fn checkered_image() -> DynamicImage {
        let img = GrayImage::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 { Luma([255]) } else { Luma([0]) }
        });
        DynamicImage::ImageLuma8(img)
    }

    // ── normalization ──────────────────────────────────────────────

    #[test]
    fn normalize_resizes_and_scales_to_unit_range() {
        let adapter = ScoringAdapter::new(Arc::new(SharpnessScorer::new()), (8, 8));
        let tensor = adapter.normalize(&flat_image(255));

        assert_eq!(tensor.width, 8);
        assert_eq!(tensor.height, 8);
        assert_eq!(tensor.data.len(), 8 * 8 * 3);
        assert!(tensor.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!((tensor.luma(4, 4) - 1.0).abs() < 1e-3);
    }

    // ── adapter contract ───────────────────────────────────────────

    #[test]
    fn score_returns_one_score_per_image_in_order() {
        let adapter = ScoringAdapter::new(Arc::new(SharpnessScorer::new()), (32, 32));
        let flat = flat_image(128);
        let sharp = checkered_image();
        let scores = adapter
            .score(&[&flat, &sharp])
            .expect("scoring should succeed");

        assert_eq!(scores.len(), 2);
        assert!(
            scores[1] > scores[0],
            "checkered image should out-score a flat one ({} vs {})",
            scores[1],
            scores[0],
        );
    }

    struct ShortScorer;
    impl QualityScorer for ShortScorer {
        fn score_batch(&self, batch: &[ImageTensor]) -> Result<Vec<f64>, SiftError> {
            // Deliberately one score short.
            Ok(vec![1.0; batch.len().saturating_sub(1)])
        }
    }

    #[test]
    fn score_count_mismatch_warns_but_does_not_fail() {
        let adapter = ScoringAdapter::new(Arc::new(ShortScorer), (8, 8));
        let a = flat_image(10);
        let b = flat_image(20);
        let scores = adapter.score(&[&a, &b]).expect("mismatch must not fail");
        assert_eq!(scores.len(), 1);
    }

    // ── one-time construction ──────────────────────────────────────

    #[test]
    fn scorer_cell_constructs_exactly_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let cell = ScorerCell::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(SharpnessScorer::new()) as Arc<dyn QualityScorer>)
        });

        cell.get().expect("first get should construct");
        cell.get().expect("second get should reuse");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scorer_cell_propagates_factory_failure() {
        let cell = ScorerCell::new(|| {
            Err(SiftError::ModelUnavailable("weights fetch failed".to_string()))
        });
        assert!(matches!(cell.get(), Err(SiftError::ModelUnavailable(_))));
    }

    #[test]
    fn preloaded_cell_needs_no_factory() {
        let cell = ScorerCell::preloaded(Arc::new(SharpnessScorer::new()));
        assert!(cell.get().is_ok());
    }
}
