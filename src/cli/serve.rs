// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::DetectConfig;

/// Fabstir Detect Node server
#[derive(Parser, Debug, Default)]
#[command(name = "fabstir-detect-node")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "HTTP object detection for uploaded images and videos", long_about = None)]
pub struct ServeArgs {
    /// TOML config file
    #[arg(long, env = "DETECT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port
    #[arg(long)]
    pub port: Option<u16>,

    /// Detection model (ONNX)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Class labels file, one per line
    #[arg(long)]
    pub labels: Option<PathBuf>,

    /// Maximum video frames sampled per request
    #[arg(long)]
    pub max_frames: Option<usize>,
}

impl ServeArgs {
    /// Defaults, config file and environment, then these flags on top
    pub fn resolve_config(&self) -> Result<DetectConfig> {
        let config = DetectConfig::load(self.config.as_deref())?;
        let config = self.apply(config);
        config.validate()?;
        Ok(config)
    }

    /// Overlay the flags that were given
    pub fn apply(&self, mut config: DetectConfig) -> DetectConfig {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(model) = &self.model {
            config.model_path = model.clone();
        }
        if let Some(labels) = &self.labels {
            config.labels_path = Some(labels.clone());
        }
        if let Some(max_frames) = self.max_frames {
            config.max_frames = max_frames;
        }
        config
    }
}
