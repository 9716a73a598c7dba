// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pipeline error taxonomy

use thiserror::Error;

use crate::vision::{EngineError, ImageError, VideoError};

/// Every way a detection request can fail
///
/// `Validation` is the only client-side failure; the rest are server errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to stage upload: {0}")]
    Storage(String),

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("Detection failed: {0}")]
    Engine(#[from] EngineError),

    #[error("Invalid detection output: {0}")]
    Schema(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller sent something unacceptable
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Validation(_))
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Storage(_) => "storage",
            PipelineError::Decode(_) => "decode",
            PipelineError::Engine(_) => "engine",
            PipelineError::Schema(_) => "schema",
            PipelineError::Internal(_) => "internal",
        }
    }
}

impl From<ImageError> for PipelineError {
    fn from(err: ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

impl From<VideoError> for PipelineError {
    fn from(err: VideoError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Storage(err.to_string())
    }
}
