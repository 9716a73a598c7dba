// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction response types

use serde::{Deserialize, Serialize};

use crate::pipeline::{Detection, DetectionReport, MediaKind};

/// Success envelope for POST /predict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Always true; failures use the error envelope
    pub success: bool,
    /// Validated lower-case extension (e.g. "jpg", "mp4")
    pub file_type: String,
    /// "image" or "video"
    pub media_type: MediaKind,
    pub detections: Vec<Detection>,
    /// Frame positions consumed, video only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frames_processed: Option<usize>,
    /// Processing time in milliseconds
    pub processing_time_ms: u64,
}

impl From<DetectionReport> for PredictResponse {
    fn from(report: DetectionReport) -> Self {
        Self {
            success: true,
            file_type: report.file_type,
            media_type: report.media_type,
            detections: report.detections,
            frames_processed: report.frames_processed,
            processing_time_ms: report.processing_time_ms,
        }
    }
}
