// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing module for CPU-based object detection
//!
//! This module provides:
//! - The detection engine boundary and a YOLO-style ONNX detector
//! - Still-image decoding
//! - Video frame decoding via ffmpeg
//!
//! Inference runs on CPU only.

pub mod detector;
pub mod image_utils;
pub mod model_manager;
pub mod video;

pub use detector::{ClassTaxonomy, DetectionEngine, EngineError, RawDetection};
pub use image_utils::{decode_image_bytes, decode_image_file, detect_format, ImageError, ImageInfo};
pub use model_manager::{DetectionModelInfo, DetectionModelManager};
pub use video::{FfmpegDecoder, FrameSequence, PpmFrameReader, VideoDecoder, VideoError};
