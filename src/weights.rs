//! Model weights acquisition and caching.
//!
//! Learned quality scorers need pretrained weights. [`WeightsSource`]
//! implements the "cache first, fetch once" policy: look for the weights
//! file in a local cache directory, and only if it is missing download it
//! from the configured content store, persist it, and return the path.
//!
//! The download is the engine's only unbounded external network call, so it
//! carries an explicit timeout. Every failure mode — connection error,
//! timeout, non-success HTTP status, cache write failure — is surfaced as
//! [`SiftError::ModelUnavailable`], letting callers distinguish "retry when
//! the network recovers" from a bad image batch or bad configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::SiftError;

/// Where to find model weights, and where to cache them locally.
///
/// # Example
///
/// ```no_run
/// use framesift::WeightsSource;
///
/// let source = WeightsSource::new(
///     "https://huggingface.co/example/nima-weights/resolve/main/",
///     "weights.h5",
///     "/var/cache/framesift",
/// );
/// let path = source.ensure()?;
/// # Ok::<(), framesift::SiftError>(())
/// ```
#[derive(Debug, Clone)]
pub struct WeightsSource {
    /// Base URL of the content store; the filename is appended to it.
    pub repo_url: String,
    /// Name of the weights file, both remotely and in the cache.
    pub filename: String,
    /// Local directory the weights are cached in.
    pub cache_directory: PathBuf,
    /// Timeout applied to the whole download request.
    pub timeout: Duration,
}

impl WeightsSource {
    /// Create a weights source with the default 10 second timeout.
    pub fn new<S, T, P>(repo_url: S, filename: T, cache_directory: P) -> Self
    where
        S: Into<String>,
        T: Into<String>,
        P: AsRef<Path>,
    {
        Self {
            repo_url: repo_url.into(),
            filename: filename.into(),
            cache_directory: cache_directory.as_ref().to_path_buf(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the download timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Path the weights are cached at.
    pub fn cached_path(&self) -> PathBuf {
        self.cache_directory.join(&self.filename)
    }

    /// Return the local weights path, downloading the file first if it is
    /// not cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::ModelUnavailable`] when the download fails or
    /// the cache cannot be written.
    pub fn ensure(&self) -> Result<PathBuf, SiftError> {
        let path = self.cached_path();
        if path.is_file() {
            log::debug!("Model weights found in cache: {}", path.display());
            return Ok(path);
        }

        log::info!(
            "Model weights not cached; downloading '{}' from {}",
            self.filename,
            self.repo_url,
        );
        let bytes = self.download()?;

        fs::create_dir_all(&self.cache_directory).map_err(|error| {
            SiftError::ModelUnavailable(format!(
                "cannot create weights cache directory {}: {error}",
                self.cache_directory.display(),
            ))
        })?;
        fs::write(&path, &bytes).map_err(|error| {
            SiftError::ModelUnavailable(format!(
                "cannot write weights to {}: {error}",
                path.display(),
            ))
        })?;

        log::debug!("Model weights downloaded and cached at {}", path.display());
        Ok(path)
    }

    fn download(&self) -> Result<Vec<u8>, SiftError> {
        let url = format!("{}{}", self.repo_url, self.filename);
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|error| SiftError::ModelUnavailable(error.to_string()))?;

        let response = client
            .get(&url)
            .send()
            .map_err(|error| SiftError::ModelUnavailable(format!("GET {url} failed: {error}")))?;

        if !response.status().is_success() {
            return Err(SiftError::ModelUnavailable(format!(
                "GET {url} returned HTTP {}",
                response.status(),
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|error| SiftError::ModelUnavailable(format!("reading {url}: {error}")))?;
        Ok(bytes.to_vec())
    }
}
