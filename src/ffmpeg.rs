//! FFmpeg-backed implementation of the [`VideoDecoder`] collaborator.
//!
//! [`FfmpegDecoder`] opens videos with the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate and exposes
//! them as [`DecodeSession`]s: frame rate and frame count are read at open
//! time, and [`read_at`](DecodeSession::read_at) seeks to the nearest
//! keyframe and decodes forward until the requested frame is produced.
//!
//! The module also bridges FFmpeg's internal logging, which is separate from
//! the Rust [`log`](https://crates.io/crates/log) crate. By default FFmpeg
//! prints warnings and errors to stderr, which can be noisy in library
//! usage; [`set_ffmpeg_log_level`] tunes that without making users import
//! `ffmpeg-next` directly.

use std::path::Path;
use std::time::Duration;

use ffmpeg_next::{
    Error as FfmpegError, Packet, Rational,
    codec::context::Context as CodecContext,
    decoder::Video as FfmpegVideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::{DynamicImage, RgbImage};

use crate::decoder::{DecodeSession, VideoDecoder};
use crate::error::SiftError;

/// A [`VideoDecoder`] backed by the FFmpeg libraries.
///
/// Stateless and cheap to construct; every [`open`](VideoDecoder::open) call
/// creates an independent demuxer and decoder, so sessions never share
/// mutable state.
///
/// # Example
///
/// ```no_run
/// use framesift::{FfmpegDecoder, VideoDecoder};
///
/// let decoder = FfmpegDecoder::new();
/// let mut session = decoder.open("input.mp4".as_ref())?;
/// println!("{} frames at {} fps", session.frame_count(), session.frame_rate());
/// # Ok::<(), framesift::SiftError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegDecoder;

impl FfmpegDecoder {
    /// Create a new FFmpeg-backed decoder.
    pub fn new() -> Self {
        Self
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, SiftError> {
        Ok(Box::new(FfmpegSession::open(path)?))
    }
}

/// An open FFmpeg decode session for one video file.
struct FfmpegSession {
    input_context: Input,
    decoder: FfmpegVideoDecoder,
    scaler: ScalingContext,
    video_stream_index: usize,
    time_base: Rational,
    frames_per_second: f64,
    frame_count: u64,
    width: u32,
    height: u32,
    decoded_frame: VideoFrame,
    scaled_frame: VideoFrame,
    /// Frame number the decoder would produce next when decoding forward
    /// without seeking. `None` before the first read and after every seek.
    decode_position: Option<u64>,
}

impl FfmpegSession {
    fn open(path: &Path) -> Result<Self, SiftError> {
        let file_path = path.to_path_buf();

        // Initialise ffmpeg (safe to call multiple times).
        ffmpeg_next::init().map_err(|error| SiftError::CannotOpenVideo {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| SiftError::CannotOpenVideo {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| SiftError::CannotOpenVideo {
                path: file_path.clone(),
                reason: "No video stream found in file".to_string(),
            })?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        // Average frame rate, falling back to the stream's raw rate field.
        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        let duration_microseconds = input_context.duration();
        let duration = if duration_microseconds > 0 {
            Duration::from_micros(duration_microseconds as u64)
        } else {
            Duration::ZERO
        };

        // Containers rarely record an exact frame count; derive it from the
        // duration the way the demuxer reports it.
        let frame_count = if frames_per_second > 0.0 {
            (duration.as_secs_f64() * frames_per_second) as u64
        } else {
            0
        };

        let codec_parameters = stream.parameters();
        let decoder_context =
            CodecContext::from_parameters(codec_parameters).map_err(|error| {
                SiftError::CannotOpenVideo {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| SiftError::CannotOpenVideo {
                    path: file_path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;

        log::debug!(
            "Opened '{}': {}x{}, {frames_per_second:.2} fps, ~{frame_count} frames",
            file_path.display(),
            width,
            height,
        );

        Ok(Self {
            input_context,
            decoder,
            scaler,
            video_stream_index,
            time_base,
            frames_per_second,
            frame_count,
            width,
            height,
            decoded_frame: VideoFrame::empty(),
            scaled_frame: VideoFrame::empty(),
            decode_position: None,
        })
    }

    /// Seek the demuxer near `index` and reset decoder state.
    fn seek_to(&mut self, index: u64) -> Result<(), SiftError> {
        let timestamp =
            frame_number_to_stream_timestamp(index, self.frames_per_second, self.time_base);
        self.input_context.seek(timestamp, ..timestamp)?;
        self.decoder.flush();
        self.decode_position = None;
        Ok(())
    }

    /// Scale and convert the current `decoded_frame` to a `DynamicImage`.
    fn convert_current_frame(&mut self) -> Result<DynamicImage, SiftError> {
        self.scaler.run(&self.decoded_frame, &mut self.scaled_frame)?;
        let buffer = frame_to_rgb_buffer(&self.scaled_frame, self.width, self.height);
        let rgb = RgbImage::from_raw(self.width, self.height, buffer).ok_or_else(|| {
            SiftError::FrameDecode(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })?;
        Ok(DynamicImage::ImageRgb8(rgb))
    }
}

impl DecodeSession for FfmpegSession {
    fn frame_rate(&self) -> f64 {
        self.frames_per_second
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn read_at(&mut self, index: u64) -> Result<Option<DynamicImage>, SiftError> {
        // Decoding forward from the current position is cheaper than a seek
        // when the target is ahead of us; seek only when moving backwards or
        // on a fresh/flushed session.
        match self.decode_position {
            Some(position) if position <= index => {}
            _ => self.seek_to(index)?,
        }

        let mut eof_sent = false;
        loop {
            // Drain frames the decoder has already produced.
            if self.decoder.receive_frame(&mut self.decoded_frame).is_ok() {
                let pts = self.decoded_frame.pts().unwrap_or(0);
                let current_frame = pts_to_frame_number(pts, self.time_base, self.frames_per_second);
                self.decode_position = Some(current_frame + 1);

                if current_frame >= index {
                    return self.convert_current_frame().map(Some);
                }
                // Still before the target — keep receiving.
                continue;
            }

            if eof_sent {
                // Decoder fully drained without reaching the target.
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|error| SiftError::FrameDecode(error.to_string()))?;
                    }
                    // Non-video packets are silently skipped.
                }
                Err(FfmpegError::Eof) => {
                    self.decoder
                        .send_eof()
                        .map_err(|error| SiftError::FrameDecode(error.to_string()))?;
                    eof_sent = true;
                }
                Err(_) => {
                    // Non-fatal read error — try the next packet.
                }
            }
        }
    }
}

/// Copy pixel data from an FFmpeg video frame into a tightly-packed RGB
/// buffer.
///
/// FFmpeg frames frequently carry per-row padding (stride > width × 3); this
/// strips it so the result can be passed to [`image::RgbImage::from_raw`].
fn frame_to_rgb_buffer(video_frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let expected_stride = (width as usize) * 3;
    let data = video_frame.data(0);

    if stride == expected_stride {
        data[..expected_stride * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(expected_stride * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + expected_stride]);
        }
        buffer
    }
}

/// Convert a frame number to a timestamp in the stream's time base.
fn frame_number_to_stream_timestamp(
    frame_number: u64,
    frames_per_second: f64,
    time_base: Rational,
) -> i64 {
    let seconds = if frames_per_second > 0.0 {
        frame_number as f64 / frames_per_second
    } else {
        0.0
    };
    let numerator = time_base.numerator() as f64;
    let denominator = time_base.denominator() as f64;
    (seconds * denominator / numerator) as i64
}

/// Rescale a PTS value to a frame number.
fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64;
    (seconds * frames_per_second) as u64
}

/// FFmpeg internal log verbosity level.
///
/// Maps directly to FFmpeg's `AV_LOG_*` constants. Setting a level causes
/// FFmpeg to suppress all messages below that severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log when the process is about to abort.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors.
    Error,
    /// Log warnings (default FFmpeg level).
    Warning,
    /// Log informational messages.
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    fn to_ffmpeg_level(self) -> Level {
        match self {
            FfmpegLogLevel::Quiet => Level::Quiet,
            FfmpegLogLevel::Panic => Level::Panic,
            FfmpegLogLevel::Fatal => Level::Fatal,
            FfmpegLogLevel::Error => Level::Error,
            FfmpegLogLevel::Warning => Level::Warning,
            FfmpegLogLevel::Info => Level::Info,
            FfmpegLogLevel::Verbose => Level::Verbose,
            FfmpegLogLevel::Debug => Level::Debug,
            FfmpegLogLevel::Trace => Level::Trace,
        }
    }
}

/// Set the FFmpeg internal log verbosity level.
///
/// This controls what FFmpeg prints to stderr. It does **not** affect
/// Rust-side `log` crate output.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}
