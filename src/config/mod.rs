// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection node configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file
//! (`[detect]` table or top-level keys), then `DETECT_*` environment
//! variables. The binaries apply CLI flags last.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default upload ceiling (100 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Default number of video frame positions sampled per request
pub const DEFAULT_MAX_FRAMES: usize = 30;

/// Extensions accepted by default
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "mp4", "avi", "mov", "mkv"];

/// Extensions decoded as still images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Extensions sampled frame by frame through ffmpeg
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "m4v"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Listen address for the HTTP server
    pub host: String,
    pub port: u16,

    /// Upload ceiling in bytes, enforced by the media validator
    pub max_upload_bytes: u64,
    /// Lower-case extensions accepted by the media validator
    pub allowed_extensions: Vec<String>,
    /// Frame cap for the video sampling path
    pub max_frames: usize,

    /// ONNX detector model
    pub model_path: PathBuf,
    /// Optional labels file, one class name per line
    pub labels_path: Option<PathBuf>,
    /// Square model input size in pixels
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Number of ONNX Runtime sessions available for concurrent inference
    pub inference_slots: usize,
    /// Intra-op threads per session
    pub intra_threads: usize,

    /// Directory for staged uploads; OS temp dir when unset
    pub staging_dir: Option<PathBuf>,

    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_frames: DEFAULT_MAX_FRAMES,
            model_path: PathBuf::from("./models/yolov8n.onnx"),
            labels_path: None,
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
            inference_slots: 2,
            intra_threads: 4,
            staging_dir: None,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl DetectConfig {
    /// Load configuration from a TOML file
    ///
    /// Accepts either a `[detect]` table or the keys at the top level.
    /// Missing keys keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_value: toml::Value = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let table = toml_value.get("detect").cloned().unwrap_or(toml_value);
        let config: DetectConfig = table
            .try_into()
            .with_context(|| format!("Invalid detect config in {}", path.display()))?;

        Ok(config)
    }

    /// Overlay `DETECT_*` environment variables onto this configuration
    ///
    /// A numeric variable that does not parse is an error, not a silent default.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(val) = std::env::var("DETECT_HOST") {
            self.host = val;
        }
        if let Some(num) = env_parse("DETECT_PORT")? {
            self.port = num;
        }
        if let Some(num) = env_parse("DETECT_MAX_UPLOAD_BYTES")? {
            self.max_upload_bytes = num;
        }
        if let Ok(val) = std::env::var("DETECT_ALLOWED_EXTENSIONS") {
            self.allowed_extensions = parse_extension_list(&val);
        }
        if let Some(num) = env_parse("DETECT_MAX_FRAMES")? {
            self.max_frames = num;
        }
        if let Ok(val) = std::env::var("DETECT_MODEL_PATH") {
            self.model_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DETECT_LABELS_PATH") {
            self.labels_path = Some(PathBuf::from(val));
        }
        if let Some(num) = env_parse("DETECT_CONFIDENCE_THRESHOLD")? {
            self.confidence_threshold = num;
        }
        if let Some(num) = env_parse("DETECT_IOU_THRESHOLD")? {
            self.iou_threshold = num;
        }
        if let Some(num) = env_parse("DETECT_INFERENCE_SLOTS")? {
            self.inference_slots = num;
        }
        if let Ok(val) = std::env::var("DETECT_STAGING_DIR") {
            self.staging_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("DETECT_FFMPEG_PATH") {
            self.ffmpeg_path = val;
        }
        if let Ok(val) = std::env::var("DETECT_FFPROBE_PATH") {
            self.ffprobe_path = val;
        }
        Ok(self)
    }

    /// Defaults, then the optional file, then the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.max_frames == 0 {
            anyhow::bail!("max_frames must be at least 1");
        }
        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }
        if self.allowed_extensions.is_empty() {
            anyhow::bail!("allowed_extensions must not be empty");
        }
        if let Some(unknown) = self.allowed_extensions.iter().find(|ext| {
            !IMAGE_EXTENSIONS.contains(&ext.as_str()) && !VIDEO_EXTENSIONS.contains(&ext.as_str())
        }) {
            anyhow::bail!(
                "allowed extension {:?} is neither a supported image nor video type",
                unknown
            );
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            );
        }
        if self.inference_slots == 0 {
            anyhow::bail!("inference_slots must be at least 1");
        }
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!(
                "input_size must be a positive multiple of 32, got {}",
                self.input_size
            );
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Staging directory, falling back to the OS temp dir
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Split a comma-separated extension list into normalized entries
pub fn parse_extension_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_env_value(key, std::env::var(key).ok())
}

fn parse_env_value<T>(key: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {} value {:?}: {}", key, val, e)),
        None => Ok(None),
    }
}
