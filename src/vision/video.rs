// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Video frame decoding
//!
//! Frames are pulled lazily, one at a time, from an `ffmpeg` child process
//! that writes binary PPM (`P6`) images to its stdout. Nothing is written to
//! disk and at most one decoded frame is held in memory per sequence.

use image::codecs::pnm::{PnmDecoder, PnmSubtype, SampleEncoding};
use image::{DynamicImage, ImageDecoder, ImageError, Limits};
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::DetectConfig;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("Not a readable video container: {0}")]
    NotAVideo(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode frame: {0}")]
    Frame(String),
}

/// Forward-only sequence of decoded frames in stream order
///
/// Each item is one frame position; an `Err` item is a frame that could not
/// be decoded. Restarting means opening the file again.
pub type FrameSequence = Box<dyn Iterator<Item = Result<DynamicImage, VideoError>> + Send>;

/// Opens a staged video file as a frame sequence
pub trait VideoDecoder: Send + Sync {
    /// Open `path`, producing at most `max_frames` frame positions
    fn open(&self, path: &Path, max_frames: usize) -> Result<FrameSequence, VideoError>;
}

/// `ffprobe`/`ffmpeg` backed decoder
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl Default for FfmpegDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl From<&DetectConfig> for FfmpegDecoder {
    fn from(config: &DetectConfig) -> Self {
        Self::new(&config.ffmpeg_path, &config.ffprobe_path)
    }
}

impl FfmpegDecoder {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Check that `path` holds at least one video stream
    pub fn probe(&self, path: &Path) -> Result<(), VideoError> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error"])
            .args(["-select_streams", "v:0"])
            .args(["-show_entries", "stream=codec_type"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| VideoError::Spawn {
                program: self.ffprobe_path.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VideoError::NotAVideo(first_line_or(&stderr, "ffprobe failed")));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.lines().any(|line| line.trim() == "video") {
            Ok(())
        } else {
            Err(VideoError::NotAVideo("no video stream found".to_string()))
        }
    }

    /// Arguments streaming the first `max_frames` frames of `path` as PPM
    ///
    /// Frames pass through untimed so variable-rate input is neither
    /// duplicated nor dropped.
    fn frame_stream_args(&self, path: &Path, max_frames: usize) -> Vec<OsString> {
        let frames = max_frames.to_string();
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(path.as_os_str().to_os_string());
        args.extend(
            [
                "-an",
                "-sn",
                "-fps_mode",
                "passthrough",
                "-frames:v",
                frames.as_str(),
                "-f",
                "image2pipe",
                "-vcodec",
                "ppm",
                "pipe:1",
            ]
            .into_iter()
            .map(OsString::from),
        );
        args
    }
}

impl VideoDecoder for FfmpegDecoder {
    fn open(&self, path: &Path, max_frames: usize) -> Result<FrameSequence, VideoError> {
        self.probe(path)?;

        let mut child = Command::new(&self.ffmpeg_path)
            .args(self.frame_stream_args(path, max_frames))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| VideoError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::Spawn {
            program: self.ffmpeg_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdout not captured"),
        })?;

        debug!("ffmpeg frame stream opened for {}", path.display());

        Ok(Box::new(FfmpegFrames {
            child,
            frames: PpmFrameReader::new(stdout),
        }))
    }
}

/// Frames streamed from a running `ffmpeg`; the process dies with the sequence
struct FfmpegFrames {
    child: Child,
    frames: PpmFrameReader<ChildStdout>,
}

impl Iterator for FfmpegFrames {
    type Item = Result<DynamicImage, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.next()
    }
}

impl Drop for FfmpegFrames {
    fn drop(&mut self) {
        // Already exited when the stream was read to the end
        if let Ok(Some(status)) = self.child.try_wait() {
            if !status.success() {
                debug!("ffmpeg exited with {}", status);
            }
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!("Failed to stop ffmpeg: {}", e);
        }
        let _ = self.child.wait();
    }
}

/// Reader for concatenated binary PPM images
///
/// A malformed frame ends the stream: framing cannot be recovered once a
/// header or pixel block is out of step.
pub struct PpmFrameReader<R: Read> {
    reader: BufReader<R>,
    finished: bool,
}

impl<R: Read> PpmFrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            finished: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<DynamicImage>, VideoError> {
        let at_end = self
            .reader
            .fill_buf()
            .map_err(|e| VideoError::Frame(format!("frame stream error: {}", e)))?
            .is_empty();
        if at_end {
            return Ok(None);
        }

        let mut decoder = PnmDecoder::new(&mut self.reader).map_err(frame_error)?;
        if !matches!(decoder.subtype(), PnmSubtype::Pixmap(SampleEncoding::Binary)) {
            return Err(VideoError::Frame(format!(
                "expected binary PPM frame, got {:?}",
                decoder.subtype()
            )));
        }

        let (width, height) = decoder.dimensions();
        if width == 0 || height == 0 {
            return Err(VideoError::Frame(format!(
                "frame has zero size ({}x{})",
                width, height
            )));
        }

        decoder.set_limits(Limits::default()).map_err(frame_error)?;
        DynamicImage::from_decoder(decoder)
            .map(Some)
            .map_err(frame_error)
    }
}

impl<R: Read> Iterator for PpmFrameReader<R> {
    type Item = Result<DynamicImage, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

fn frame_error(err: ImageError) -> VideoError {
    VideoError::Frame(err.to_string())
}

fn first_line_or(text: &str, fallback: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
