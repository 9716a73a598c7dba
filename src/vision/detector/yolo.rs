// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLO-style ONNX object detector
//!
//! Runs a YOLOv8-format export (`[1, 4 + C, N]` output) on CPU through
//! ONNX Runtime. A session needs exclusive access while it runs, so the
//! engine owns a small pool of sessions ("inference slots"); a request
//! holds one slot only for the duration of a single `run`.

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use tracing::{debug, info, warn};

use super::postprocess::{decode_predictions, PostprocessConfig};
use super::preprocessing::preprocess_for_detection;
use super::{ClassTaxonomy, DetectionEngine, EngineError, RawDetection};
use crate::config::DetectConfig;

/// Parameters for loading a YOLO ONNX model
#[derive(Debug, Clone)]
pub struct YoloParams {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    /// Square model input size (640 typical)
    pub input_size: u32,
    pub postprocess: PostprocessConfig,
    /// Number of sessions in the pool
    pub inference_slots: usize,
    pub intra_threads: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/yolov8n.onnx"),
            labels_path: None,
            input_size: 640,
            postprocess: PostprocessConfig::default(),
            inference_slots: 2,
            intra_threads: 4,
        }
    }
}

impl From<&DetectConfig> for YoloParams {
    fn from(config: &DetectConfig) -> Self {
        Self {
            model_path: config.model_path.clone(),
            labels_path: config.labels_path.clone(),
            input_size: config.input_size,
            postprocess: PostprocessConfig {
                confidence_threshold: config.confidence_threshold,
                iou_threshold: config.iou_threshold,
                max_detections: config.max_detections,
            },
            inference_slots: config.inference_slots.max(1),
            intra_threads: config.intra_threads.max(1),
        }
    }
}

/// YOLO object detector backed by a pool of ONNX Runtime sessions
pub struct YoloOnnxEngine {
    name: String,
    slots: Vec<Mutex<Session>>,
    next_slot: AtomicUsize,
    input_name: String,
    input_size: u32,
    postprocess: PostprocessConfig,
    taxonomy: ClassTaxonomy,
}

impl std::fmt::Debug for YoloOnnxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloOnnxEngine")
            .field("name", &self.name)
            .field("slots", &self.slots.len())
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("postprocess", &self.postprocess)
            .field("classes", &self.taxonomy.len())
            .finish_non_exhaustive()
    }
}

impl YoloOnnxEngine {
    /// Load the detector model and resolve its class taxonomy
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    /// - A configured labels file cannot be read
    pub fn load(params: &YoloParams) -> Result<Self> {
        let model_path = params.model_path.as_path();

        if !model_path.exists() {
            anyhow::bail!("Detection model not found: {}", model_path.display());
        }

        info!(
            "Loading detection model from {} ({} inference slots)",
            model_path.display(),
            params.inference_slots
        );

        let slot_count = params.inference_slots.max(1);
        let mut slots = Vec::with_capacity(slot_count);
        for _ in 0..slot_count {
            slots.push(Mutex::new(build_session(model_path, params.intra_threads)?));
        }

        let (input_name, taxonomy) = {
            let first = slots[0]
                .get_mut()
                .map_err(|_| anyhow::anyhow!("inference slot poisoned during load"))?;

            let input_name = first
                .inputs
                .first()
                .map(|input| input.name.clone())
                .unwrap_or_else(|| "images".to_string());

            if let Some(input) = first.inputs.first() {
                debug!("Detection model input type: {:?}", input.input_type);
            }

            let taxonomy = resolve_taxonomy(first, params.labels_path.as_deref())?;
            (input_name, taxonomy)
        };

        let name = model_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx-detector".to_string());

        info!(
            "✅ Detection model '{}' loaded (input: {}, {} classes, CPU-only)",
            name,
            input_name,
            taxonomy.len()
        );

        Ok(Self {
            name,
            slots,
            next_slot: AtomicUsize::new(0),
            input_name,
            input_size: params.input_size,
            postprocess: params.postprocess,
            taxonomy,
        })
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Take a free session if one is idle, else wait on the round-robin pick
    fn acquire_slot(&self) -> Result<MutexGuard<'_, Session>, EngineError> {
        let start = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slots.len();

        for offset in 0..self.slots.len() {
            let index = (start + offset) % self.slots.len();
            match self.slots[index].try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::WouldBlock) => continue,
                Err(TryLockError::Poisoned(_)) => {
                    return Err(EngineError::Inference(format!(
                        "inference slot {} poisoned",
                        index
                    )))
                }
            }
        }

        self.slots[start]
            .lock()
            .map_err(|_| EngineError::Inference(format!("inference slot {} poisoned", start)))
    }
}

impl DetectionEngine for YoloOnnxEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn taxonomy(&self) -> &ClassTaxonomy {
        &self.taxonomy
    }

    fn detect(&self, image: &DynamicImage) -> Result<Vec<RawDetection>, EngineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(EngineError::EmptyImage(width, height));
        }

        let (tensor, geometry) = preprocess_for_detection(image, self.input_size);
        let input_value = Value::from_array(tensor)
            .map_err(|e| EngineError::UnsupportedInput(e.to_string()))?;

        let predictions = {
            let mut session = self.acquire_slot()?;
            let outputs = session
                .run(ort::inputs![&self.input_name => input_value])
                .map_err(|e| EngineError::Inference(e.to_string()))?;

            let output_tensor = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| EngineError::InvalidOutput(e.to_string()))?;
            output_tensor.to_owned()
        };

        let detections = decode_predictions(predictions.view(), &geometry, &self.postprocess)?;

        debug!(
            "{} detections on {}x{} image (model output {:?})",
            detections.len(),
            width,
            height,
            predictions.shape()
        );

        Ok(detections)
    }
}

fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load detection model from {}",
            model_path.display()
        ))?;
    Ok(session)
}

/// Labels file first, then the model's `names` metadata, then COCO
fn resolve_taxonomy(session: &Session, labels_path: Option<&Path>) -> Result<ClassTaxonomy> {
    if let Some(path) = labels_path {
        let taxonomy = ClassTaxonomy::from_labels_file(path)?;
        info!("Loaded {} class labels from {}", taxonomy.len(), path.display());
        return Ok(taxonomy);
    }

    let names = session
        .metadata()
        .ok()
        .and_then(|metadata| metadata.custom("names").ok().flatten());

    if let Some(raw) = names {
        match ClassTaxonomy::from_names_metadata(&raw) {
            Ok(taxonomy) => {
                info!("Loaded {} class labels from model metadata", taxonomy.len());
                return Ok(taxonomy);
            }
            Err(e) => warn!("⚠️ Ignoring unparseable names metadata: {}", e),
        }
    }

    info!("No labels configured, using COCO class labels");
    Ok(ClassTaxonomy::coco())
}
