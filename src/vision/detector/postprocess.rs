// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO output decoding and non-maximum suppression

use ndarray::{ArrayViewD, Axis, Ix2};

use super::preprocessing::Letterbox;
use super::{EngineError, RawDetection};

/// Postprocessing thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    /// Minimum class score kept
    pub confidence_threshold: f32,
    /// IoU above which a lower-scored box of the same class is suppressed
    pub iou_threshold: f32,
    /// Maximum detections returned per image
    pub max_detections: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

/// Decode a YOLOv8-style prediction tensor into source-space detections
///
/// Accepts `[1, 4 + C, N]` (the stock export) or the transposed
/// `[1, N, 4 + C]`. Each candidate carries `cx, cy, w, h` in model pixels
/// followed by one score per class. Results are sorted by confidence,
/// highest first, after class-wise NMS.
pub fn decode_predictions(
    output: ArrayViewD<f32>,
    geometry: &Letterbox,
    config: &PostprocessConfig,
) -> Result<Vec<RawDetection>, EngineError> {
    let shape = output.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(EngineError::InvalidOutput(format!(
            "expected [1, 4+C, N], got {:?}",
            shape
        )));
    }

    let predictions = output.index_axis(Axis(0), 0);
    // Stock exports have far more candidates than channels
    let predictions = if shape[1] <= shape[2] {
        predictions
    } else {
        predictions.reversed_axes()
    };
    let predictions = predictions
        .into_dimensionality::<Ix2>()
        .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;

    let channels = predictions.shape()[0];
    let candidates = predictions.shape()[1];
    if channels <= 4 {
        return Err(EngineError::InvalidOutput(format!(
            "prediction has {} channels, need at least 5",
            channels
        )));
    }

    let mut detections = Vec::new();
    for i in 0..candidates {
        let mut best_score = 0.0f32;
        let mut best_class = 0usize;
        for c in 4..channels {
            let score = predictions[[c, i]];
            if score > best_score {
                best_score = score;
                best_class = c - 4;
            }
        }

        if best_score < config.confidence_threshold {
            continue;
        }

        let cx = predictions[[0, i]];
        let cy = predictions[[1, i]];
        let w = predictions[[2, i]];
        let h = predictions[[3, i]];

        let x1 = geometry.unmap_x(cx - w / 2.0);
        let y1 = geometry.unmap_y(cy - h / 2.0);
        let x2 = geometry.unmap_x(cx + w / 2.0);
        let y2 = geometry.unmap_y(cy + h / 2.0);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(RawDetection::new(
            best_class,
            best_score.min(1.0),
            [x1, y1, x2, y2],
        ));
    }

    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept = non_max_suppression(detections, config.iou_threshold);
    kept.truncate(config.max_detections);
    Ok(kept)
}

/// Greedy class-wise NMS over detections sorted by descending confidence
pub fn non_max_suppression(detections: Vec<RawDetection>, threshold: f32) -> Vec<RawDetection> {
    let mut result: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for detection in detections {
        let suppressed = result.iter().any(|kept| {
            kept.class_index == detection.class_index && detection.iou(kept) > threshold
        });
        if !suppressed {
            result.push(detection);
        }
    }
    result
}
