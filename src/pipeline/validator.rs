// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload validation: filename extension and size, before anything touches disk

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::PipelineError;
use crate::config::{DetectConfig, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Media family derived from the validated extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// `None` for extensions no decoder handles
    pub fn from_extension(extension: &str) -> Option<Self> {
        if IMAGE_EXTENSIONS.contains(&extension) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

/// An upload that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedMedia {
    pub kind: MediaKind,
    /// Lower-case extension without the dot
    pub extension: String,
}

/// Why an upload was turned away
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("No file selected")]
    EmptyFilename,

    #[error("File type not supported")]
    UnsupportedType,

    #[error("File too large (max {max} bytes)")]
    TooLarge { size: u64, max: u64 },
}

impl From<Rejection> for PipelineError {
    fn from(rejection: Rejection) -> Self {
        PipelineError::Validation(rejection.to_string())
    }
}

/// Pure filename and size checks
#[derive(Debug, Clone)]
pub struct MediaValidator {
    allowed_extensions: Vec<String>,
    max_upload_bytes: u64,
}

impl MediaValidator {
    pub fn new<I, S>(allowed_extensions: I, max_upload_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &DetectConfig) -> Self {
        Self::new(&config.allowed_extensions, config.max_upload_bytes)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Check the filename alone
    ///
    /// Lets the HTTP layer refuse a disallowed type before reading the body.
    pub fn check_filename(&self, filename: &str) -> Result<AcceptedMedia, Rejection> {
        if filename.trim().is_empty() {
            return Err(Rejection::EmptyFilename);
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .ok_or(Rejection::UnsupportedType)?;

        if !self.allowed_extensions.iter().any(|allowed| *allowed == extension) {
            return Err(Rejection::UnsupportedType);
        }
        let kind = MediaKind::from_extension(&extension).ok_or(Rejection::UnsupportedType)?;

        Ok(AcceptedMedia { kind, extension })
    }

    /// Check the size alone
    pub fn check_size(&self, declared_size: u64) -> Result<(), Rejection> {
        if declared_size > self.max_upload_bytes {
            return Err(Rejection::TooLarge {
                size: declared_size,
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }

    /// Full validation of an upload
    pub fn validate(&self, filename: &str, declared_size: u64) -> Result<AcceptedMedia, Rejection> {
        let accepted = self.check_filename(filename)?;
        self.check_size(declared_size)?;
        Ok(accepted)
    }
}
