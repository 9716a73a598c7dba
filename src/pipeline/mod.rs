// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Media detection pipeline
//!
//! validate → stage → decode/sample → detect → normalize → release.
//! The staged file is released on every exit path, including panics
//! (through [`StagedFile`]'s `Drop`).

pub mod error;
pub mod image_path;
pub mod normalizer;
pub mod staging;
pub mod validator;
pub mod video_path;

use anyhow::Context;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::DetectConfig;
use crate::vision::{DetectionEngine, FfmpegDecoder, VideoDecoder};

pub use error::PipelineError;
pub use image_path::process_image;
pub use normalizer::{normalize, Detection};
pub use staging::{StagedFile, StagingArea, TempDirStaging};
pub use validator::{AcceptedMedia, MediaKind, MediaValidator, Rejection};
pub use video_path::{process_video, VideoDetections};

/// One uploaded file, as received
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content: Bytes,
    /// Size reported by the transport
    pub declared_size: u64,
}

impl UploadRequest {
    pub fn new(filename: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        Self {
            filename: filename.into(),
            declared_size: content.len() as u64,
            content,
        }
    }
}

/// Result of a successful detection request
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionReport {
    /// Validated lower-case extension
    pub file_type: String,
    pub media_type: MediaKind,
    /// Detections in frame order, engine order within a frame
    pub detections: Vec<Detection>,
    /// Frame positions consumed, video only
    pub frames_processed: Option<usize>,
    pub processing_time_ms: u64,
}

/// The request handler core, independent of HTTP
pub struct DetectionPipeline {
    validator: MediaValidator,
    staging: Arc<dyn StagingArea>,
    engine: Arc<dyn DetectionEngine>,
    decoder: Arc<dyn VideoDecoder>,
    max_frames: usize,
}

impl DetectionPipeline {
    pub fn new(
        validator: MediaValidator,
        staging: Arc<dyn StagingArea>,
        engine: Arc<dyn DetectionEngine>,
        decoder: Arc<dyn VideoDecoder>,
        max_frames: usize,
    ) -> Self {
        Self {
            validator,
            staging,
            engine,
            decoder,
            max_frames: max_frames.max(1),
        }
    }

    /// Build with on-disk staging and the ffmpeg decoder from `config`
    pub fn from_config(
        config: &DetectConfig,
        engine: Arc<dyn DetectionEngine>,
    ) -> anyhow::Result<Self> {
        let staging_dir = config.staging_dir();
        let staging = TempDirStaging::new(&staging_dir).with_context(|| {
            format!("Failed to create staging directory {}", staging_dir.display())
        })?;

        Ok(Self::new(
            MediaValidator::from_config(config),
            Arc::new(staging),
            engine,
            Arc::new(FfmpegDecoder::from(config)),
            config.max_frames,
        ))
    }

    pub fn validator(&self) -> &MediaValidator {
        &self.validator
    }

    pub fn engine(&self) -> &Arc<dyn DetectionEngine> {
        &self.engine
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    /// Run one upload through the pipeline
    ///
    /// Blocking: decoding and inference run on the calling thread.
    pub fn run(&self, request: UploadRequest) -> Result<DetectionReport, PipelineError> {
        let start = Instant::now();
        let request_id = Uuid::new_v4().simple().to_string();
        let request_id = &request_id[..8];

        let size = request.declared_size.max(request.content.len() as u64);
        let accepted = match self.validator.validate(&request.filename, size) {
            Ok(accepted) => accepted,
            Err(rejection) => {
                warn!("[{}] Upload rejected: {}", request_id, rejection);
                return Err(rejection.into());
            }
        };

        info!(
            "[{}] Processing {} upload ({} bytes)",
            request_id,
            accepted.kind.as_str(),
            size
        );

        let staged = self.staging.stage(&request.content, &accepted.extension)?;
        drop(request);

        let outcome = match (self.process(&staged, &accepted), staged.release()) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(e), Ok(())) => Err(e),
            // Processing failure wins; cleanup failure is only logged
            (Err(e), Err(cleanup)) => {
                warn!("[{}] {}", request_id, cleanup);
                Err(e)
            }
        };

        let (detections, frames_processed) = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!("[{}] {} failure: {}", request_id, e.kind(), e);
                return Err(e);
            }
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "[{}] Detection complete: {} detections, {}ms",
            request_id,
            detections.len(),
            processing_time_ms
        );

        Ok(DetectionReport {
            file_type: accepted.extension,
            media_type: accepted.kind,
            detections,
            frames_processed,
            processing_time_ms,
        })
    }

    fn process(
        &self,
        staged: &StagedFile,
        accepted: &AcceptedMedia,
    ) -> Result<(Vec<Detection>, Option<usize>), PipelineError> {
        match accepted.kind {
            MediaKind::Image => {
                let detections = process_image(staged.path(), self.engine.as_ref())?;
                Ok((detections, None))
            }
            MediaKind::Video => {
                let video = process_video(
                    staged.path(),
                    self.engine.as_ref(),
                    self.decoder.as_ref(),
                    self.max_frames,
                )?;
                if video.frames_skipped > 0 {
                    warn!(
                        "{} of {} frames could not be decoded",
                        video.frames_skipped, video.frames_processed
                    );
                }
                Ok((video.detections, Some(video.frames_processed)))
            }
        }
    }
}
