// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Raw engine output to the public detection schema

use serde::{Deserialize, Serialize};

use super::PipelineError;
use crate::vision::{ClassTaxonomy, RawDetection};

/// One detection in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label from the model taxonomy
    pub class: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in source pixels
    pub bbox: [f32; 4],
    /// Frame index, video only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub frame: Option<u32>,
}

/// Map raw detections onto the schema, preserving engine order
///
/// Confidence is clamped to `[0, 1]`; box corners are ordered and clamped to
/// be non-negative. A class index outside the taxonomy or a non-finite value
/// is a schema error.
pub fn normalize(
    raw: Vec<RawDetection>,
    taxonomy: &ClassTaxonomy,
    frame: Option<u32>,
) -> Result<Vec<Detection>, PipelineError> {
    raw.into_iter()
        .map(|detection| normalize_one(detection, taxonomy, frame))
        .collect()
}

fn normalize_one(
    raw: RawDetection,
    taxonomy: &ClassTaxonomy,
    frame: Option<u32>,
) -> Result<Detection, PipelineError> {
    let class = taxonomy.label(raw.class_index).ok_or_else(|| {
        PipelineError::Schema(format!(
            "class index {} outside taxonomy of {} classes",
            raw.class_index,
            taxonomy.len()
        ))
    })?;

    if !raw.confidence.is_finite() || raw.bbox.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Schema(format!(
            "non-finite values in detection of class '{}'",
            class
        )));
    }

    let [a, b, c, d] = raw.bbox;
    let bbox = [
        a.min(c).max(0.0),
        b.min(d).max(0.0),
        a.max(c).max(0.0),
        b.max(d).max(0.0),
    ];

    Ok(Detection {
        class: class.to_string(),
        confidence: raw.confidence.clamp(0.0, 1.0),
        bbox,
        frame,
    })
}
