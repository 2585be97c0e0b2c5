//! Image codec collaborator and concurrent file I/O.
//!
//! Pipelines read and write many still images per batch. Decoding and
//! encoding them serially would leave the job blocked on filesystem and
//! codec latency, so [`read_many`] and [`write_many`] fan the work out
//! across [`rayon`]'s bounded worker pool — the parallelism hides I/O
//! latency, it is not for compute throughput.
//!
//! Reading is lossy by design: a single corrupt or unreadable file is
//! logged and dropped rather than aborting the whole batch. Writing is
//! strict: an image that cannot be persisted fails the operation, because
//! silently losing selected output defeats the purpose of selection.
//!
//! Output files are anonymous artifacts: every written image gets a fresh
//! UUID-based filename, independent of its source, so concurrent writers
//! can never collide.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use uuid::Uuid;

use crate::config::OutputFormat;
use crate::error::SiftError;

/// Reads and writes still images on behalf of the engine.
///
/// Implementations must be shareable across the I/O worker pool.
pub trait ImageCodec: Send + Sync {
    /// Read and decode the image at `path`.
    ///
    /// Returns `None` when the file cannot be read or decoded; the failure
    /// is logged here so callers can simply drop the entry.
    fn read(&self, path: &Path) -> Option<DynamicImage>;

    /// Encode `image` into `directory` under a freshly generated filename.
    ///
    /// Returns the path the image was written to.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::ImageError`] or [`SiftError::IoError`] when
    /// encoding or writing fails.
    fn write(
        &self,
        image: &DynamicImage,
        directory: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, SiftError>;
}

/// [`ImageCodec`] implementation backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskCodec;

impl DiskCodec {
    /// Create a new disk-backed codec.
    pub fn new() -> Self {
        Self
    }

    /// Generate a collision-free output filename.
    fn generate_filename(format: OutputFormat) -> String {
        format!("image_{}.{}", Uuid::new_v4(), format.extension())
    }
}

impl ImageCodec for DiskCodec {
    fn read(&self, path: &Path) -> Option<DynamicImage> {
        match image::open(path) {
            Ok(image) => {
                log::debug!("Read image '{}'", path.display());
                Some(image)
            }
            Err(error) => {
                log::warn!("Can't read image '{}': {error}; dropping it", path.display());
                None
            }
        }
    }

    fn write(
        &self,
        image: &DynamicImage,
        directory: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, SiftError> {
        let path = directory.join(Self::generate_filename(format));
        // JPEG cannot encode alpha; flatten to RGB first.
        match format {
            OutputFormat::Jpeg => image
                .to_rgb8()
                .save_with_format(&path, format.to_image_format())?,
            OutputFormat::Png => image.save_with_format(&path, format.to_image_format())?,
        }
        log::debug!("Image saved at '{}'", path.display());
        Ok(path)
    }
}

/// Read many images concurrently, dropping entries that fail to decode.
///
/// Output order matches `paths` order (minus the dropped entries).
pub fn read_many(codec: &dyn ImageCodec, paths: &[PathBuf]) -> Vec<DynamicImage> {
    let images: Vec<DynamicImage> = paths
        .par_iter()
        .filter_map(|path| codec.read(path))
        .collect();
    if images.len() < paths.len() {
        log::warn!(
            "Dropped {} unreadable of {} images while reading batch",
            paths.len() - images.len(),
            paths.len(),
        );
    }
    images
}

/// Write many images concurrently into `directory`.
///
/// Each image gets a unique generated filename. Returns the written paths
/// in input order.
///
/// # Errors
///
/// Fails on the first image that cannot be persisted.
pub fn write_many(
    codec: &dyn ImageCodec,
    images: &[DynamicImage],
    directory: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, SiftError> {
    let paths: Result<Vec<PathBuf>, SiftError> = images
        .par_iter()
        .map(|image| codec.write(image, directory, format))
        .collect();
    let paths = paths?;
    log::debug!("Wrote {} images to '{}'", paths.len(), directory.display());
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    fn gray(value: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(16, 16, Luma([value])))
    }

    #[test]
    fn write_then_read_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let codec = DiskCodec::new();

        let path = codec
            .write(&gray(200), dir.path(), OutputFormat::Png)
            .expect("write failed");
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("png"));

        let read_back = codec.read(&path).expect("read failed");
        assert_eq!(read_back.width(), 16);
    }

    #[test]
    fn unreadable_file_reads_as_none() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let garbage = dir.path().join("not_an_image.jpg");
        std::fs::write(&garbage, b"definitely not an image").expect("write failed");

        assert!(DiskCodec::new().read(&garbage).is_none());
    }

    #[test]
    fn read_many_drops_corrupt_entries() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let codec = DiskCodec::new();

        let good = codec
            .write(&gray(10), dir.path(), OutputFormat::Png)
            .expect("write failed");
        let bad = dir.path().join("corrupt.png");
        std::fs::write(&bad, b"junk").expect("write failed");

        let images = read_many(&codec, &[good, bad]);
        assert_eq!(images.len(), 1);
    }

    #[test]
    fn write_many_generates_distinct_filenames() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let images = vec![gray(1), gray(2), gray(3)];

        let paths = write_many(&DiskCodec::new(), &images, dir.path(), OutputFormat::Jpeg)
            .expect("write_many failed");
        assert_eq!(paths.len(), 3);

        let mut unique = paths.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "filenames must not collide");
    }
}
