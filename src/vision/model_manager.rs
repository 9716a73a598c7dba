// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection model manager: loads the detector once and hands out shared handles

use std::sync::Arc;

use crate::config::DetectConfig;
use crate::vision::detector::{DetectionEngine, YoloOnnxEngine, YoloParams};

/// Information about the loaded detection model
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionModelInfo {
    /// Model name
    pub name: String,
    /// Number of classes in the taxonomy
    pub classes: usize,
}

/// Owner of the process-wide detection engine
///
/// The engine is built once at startup, then only shared through `Arc`.
/// It is never reloaded.
pub struct DetectionModelManager {
    engine: Arc<dyn DetectionEngine>,
}

impl DetectionModelManager {
    /// Load the ONNX detector described by `config`
    ///
    /// Unlike optional vision models, a missing detector is fatal: the node
    /// has nothing to serve without it.
    pub fn load(config: &DetectConfig) -> anyhow::Result<Self> {
        let params = YoloParams::from(config);
        match YoloOnnxEngine::load(&params) {
            Ok(engine) => {
                tracing::info!(
                    "✅ Detection model ready: {} ({} classes, {}px input, {} inference slots)",
                    engine.name(),
                    engine.taxonomy().len(),
                    engine.input_size(),
                    engine.slot_count()
                );
                Ok(Self::with_engine(Arc::new(engine)))
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to load detection model from {}: {}",
                    params.model_path.display(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Wrap an already-built engine
    pub fn with_engine(engine: Arc<dyn DetectionEngine>) -> Self {
        Self { engine }
    }

    /// Shared handle to the engine
    pub fn engine(&self) -> Arc<dyn DetectionEngine> {
        Arc::clone(&self.engine)
    }

    pub fn info(&self) -> DetectionModelInfo {
        DetectionModelInfo {
            name: self.engine.name().to_string(),
            classes: self.engine.taxonomy().len(),
        }
    }
}
