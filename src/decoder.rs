//! Video decoding collaborator traits.
//!
//! The sampling engine never talks to FFmpeg directly; it goes through
//! [`VideoDecoder`], which opens a video and hands back a [`DecodeSession`]
//! for reading individual frames. This keeps the sampler deterministic and
//! testable against synthetic decoders, and keeps the FFmpeg-specific code
//! confined to [`FfmpegDecoder`](crate::FfmpegDecoder).
//!
//! A session is single-pass: it can seek forward and backward within the
//! open handle, but the only way to restart sampling is to open a new
//! session. Dropping a session releases the underlying decoder resources.

use std::path::Path;

use image::DynamicImage;

use crate::error::SiftError;

/// Opens video files for frame reading.
///
/// Implementations must be shareable across threads — the manager hands the
/// decoder to a background job, and pipelines may hold it across many videos.
pub trait VideoDecoder: Send + Sync {
    /// Open a video file and return a session for reading frames from it.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::CannotOpenVideo`] if the file is missing,
    /// unreadable, or contains no video stream.
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, SiftError>;
}

/// An open, single-pass video decode session.
///
/// Frame rate and frame count are read once at open time; [`read_at`]
/// decodes the frame at a given index. Resources are released on drop.
///
/// [`read_at`]: DecodeSession::read_at
pub trait DecodeSession {
    /// The video's average frame rate in frames per second.
    fn frame_rate(&self) -> f64;

    /// The total number of frames in the video.
    fn frame_count(&self) -> u64;

    /// Decode the frame at `index`.
    ///
    /// Returns `Ok(None)` when the decoder reaches end of stream before
    /// producing the requested frame (truncated containers report more
    /// frames than they hold).
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::FrameDecode`] on a decode failure at this index.
    /// Callers that tolerate damaged containers should skip the index and
    /// continue; the error does not invalidate the session.
    fn read_at(&mut self, index: u64) -> Result<Option<DynamicImage>, SiftError>;
}
