// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod version;
pub mod vision;

// Re-export main types
pub use config::DetectConfig;
pub use pipeline::{DetectionPipeline, DetectionReport, PipelineError, UploadRequest};
pub use vision::{DetectionEngine, DetectionModelManager};
