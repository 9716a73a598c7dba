// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Bounded video sampling: one engine call per frame, frames in stream order

use std::path::Path;
use tracing::{debug, warn};

use super::normalizer::{normalize, Detection};
use super::PipelineError;
use crate::vision::{DetectionEngine, VideoDecoder};

/// Detections from a sampled video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetections {
    pub detections: Vec<Detection>,
    /// Frame positions consumed, decodable or not
    pub frames_processed: usize,
    /// Frames that failed to decode and were skipped
    pub frames_skipped: usize,
}

/// Sample up to `max_frames` frame positions and detect on each
///
/// A frame that fails to decode is skipped but still uses its index and its
/// place under the cap. An engine failure aborts the whole video. A video
/// with no decodable frames yields an empty result.
pub fn process_video(
    path: &Path,
    engine: &dyn DetectionEngine,
    decoder: &dyn VideoDecoder,
    max_frames: usize,
) -> Result<VideoDetections, PipelineError> {
    let frames = decoder.open(path, max_frames)?;

    let mut detections = Vec::new();
    let mut frames_processed = 0usize;
    let mut frames_skipped = 0usize;

    for (index, frame) in frames.take(max_frames).enumerate() {
        frames_processed += 1;

        let image = match frame {
            Ok(image) => image,
            Err(e) => {
                warn!("Skipping frame {}: {}", index, e);
                frames_skipped += 1;
                continue;
            }
        };

        let frame_index = u32::try_from(index)
            .map_err(|_| PipelineError::Internal(format!("frame index {} overflows", index)))?;

        let raw = engine.detect(&image)?;
        debug!("Frame {}: {} detections", index, raw.len());

        detections.extend(normalize(raw, engine.taxonomy(), Some(frame_index))?);
        // frame dropped here, before the next one is decoded
    }

    Ok(VideoDetections {
        detections,
        frames_processed,
        frames_skipped,
    })
}
