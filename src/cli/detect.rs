// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api::{ErrorResponse, PredictResponse};
use crate::config::DetectConfig;
use crate::pipeline::{DetectionPipeline, UploadRequest};
use crate::vision::DetectionModelManager;

/// Arguments for detect command
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Image or video file to analyse
    pub path: PathBuf,

    /// TOML config file
    #[arg(long, env = "DETECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the detection model path
    #[arg(long)]
    pub model: Option<PathBuf>,
}

/// Arguments for labels command
#[derive(Args, Debug)]
pub struct LabelsArgs {
    /// TOML config file
    #[arg(long, env = "DETECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the detection model path
    #[arg(long)]
    pub model: Option<PathBuf>,
}

fn load_config(path: Option<&Path>, model: Option<PathBuf>) -> Result<DetectConfig> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let mut config = DetectConfig::load(path)?;
    if let Some(model) = model {
        config.model_path = model;
    }
    Ok(config)
}

/// Run the detection pipeline on a local file and print the JSON envelope
pub async fn detect_file(args: DetectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.model)?;

    let filename = args
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("{} is not a file path", args.path.display()))?;
    let content = tokio::fs::read(&args.path)
        .await
        .with_context(|| format!("Failed to read {}", args.path.display()))?;

    let manager = DetectionModelManager::load(&config)?;
    let pipeline = Arc::new(DetectionPipeline::from_config(&config, manager.engine())?);

    info!("Running detection on {}", args.path.display());
    let upload = UploadRequest::new(filename, content);
    let outcome = tokio::task::spawn_blocking(move || pipeline.run(upload))
        .await
        .context("Detection task failed")?;

    match outcome {
        Ok(report) => {
            let response = PredictResponse::from(report);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            let envelope = ErrorResponse {
                error: e.to_string(),
            };
            println!("{}", serde_json::to_string_pretty(&envelope)?);
            Err(e.into())
        }
    }
}

/// Print the class taxonomy of the configured model, one `index: label` per line
pub async fn print_labels(args: LabelsArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.model)?;
    let manager = DetectionModelManager::load(&config)?;
    let engine = manager.engine();

    for (index, label) in engine.taxonomy().labels().iter().enumerate() {
        println!("{}: {}", index, label);
    }
    Ok(())
}
