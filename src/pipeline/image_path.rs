// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Still-image detection: one decode, one engine call

use std::path::Path;
use tracing::debug;

use super::normalizer::{normalize, Detection};
use super::PipelineError;
use crate::vision::{decode_image_file, DetectionEngine};

/// Detect objects in a staged still image
///
/// GIFs are decoded to their first frame. Results carry no frame index.
pub fn process_image(
    path: &Path,
    engine: &dyn DetectionEngine,
) -> Result<Vec<Detection>, PipelineError> {
    let (image, info) = decode_image_file(path)?;

    debug!(
        "Decoded image: {}x{}, {:?}, {} bytes",
        info.width, info.height, info.format, info.size_bytes
    );

    let raw = engine.detect(&image)?;
    normalize(raw, engine.taxonomy(), None)
}
