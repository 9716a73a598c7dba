// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection engine boundary
//!
//! The pipeline only sees the [`DetectionEngine`] trait: one decoded image in,
//! zero or more [`RawDetection`]s out. The shipped implementation is a
//! YOLO-style ONNX model running on CPU ([`YoloOnnxEngine`]).

pub mod postprocess;
pub mod preprocessing;
pub mod taxonomy;
pub mod yolo;

use image::DynamicImage;
use thiserror::Error;

pub use taxonomy::ClassTaxonomy;
pub use yolo::{YoloOnnxEngine, YoloParams};

/// Errors raised by a detection engine for a single image
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Image has zero size ({0}x{1})")]
    EmptyImage(u32, u32),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Unexpected model output: {0}")]
    InvalidOutput(String),
}

/// One detection as emitted by the engine, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Index into the engine's class taxonomy
    pub class_index: usize,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// Box corners `[x1, y1, x2, y2]` in source-image pixels
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_index: usize, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_index,
            confidence,
            bbox,
        }
    }

    pub fn width(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.bbox[3] - self.bbox[1]).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &Self) -> f32 {
        let x1 = self.bbox[0].max(other.bbox[0]);
        let y1 = self.bbox[1].max(other.bbox[1]);
        let x2 = self.bbox[2].min(other.bbox[2]);
        let y2 = self.bbox[3].min(other.bbox[3]);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if intersection <= 0.0 {
            return 0.0;
        }

        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

/// A loaded object detector
///
/// Implementations are initialized once at startup and shared read-only
/// across requests, so `detect` must be safe to call concurrently.
pub trait DetectionEngine: Send + Sync {
    /// Short identifier reported by `/health`
    fn name(&self) -> &str;

    /// Ordered index-to-label mapping of the loaded model
    fn taxonomy(&self) -> &ClassTaxonomy;

    /// Run detection on one decoded image
    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, EngineError>;
}
