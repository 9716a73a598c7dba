// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-scoped staging of uploaded media
//!
//! Every upload is written to its own file named `upload-<uuid>.<ext>`,
//! created exclusively, and removed when the request finishes. The client's
//! filename never reaches the filesystem.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tracing::{debug, warn};
use uuid::Uuid;

use super::PipelineError;

/// Where uploads are staged for decoding
pub trait StagingArea: Send + Sync {
    /// Write `bytes` to a fresh request-unique file ending in `.extension`
    fn stage(&self, bytes: &[u8], extension: &str) -> Result<StagedFile, PipelineError>;
}

/// Staging inside a local directory
#[derive(Debug, Clone)]
pub struct TempDirStaging {
    dir: PathBuf,
}

impl TempDirStaging {
    /// Use `dir`, creating it if missing
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl StagingArea for TempDirStaging {
    fn stage(&self, bytes: &[u8], extension: &str) -> Result<StagedFile, PipelineError> {
        let prefix = format!("upload-{}", Uuid::new_v4());
        let suffix = format!(".{}", extension);

        // A failed write drops the NamedTempFile, which deletes it
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .rand_bytes(0)
            .tempfile_in(&self.dir)
            .map_err(|e| PipelineError::Storage(format!("create failed: {}", e)))?;

        file.write_all(bytes)
            .and_then(|_| file.flush())
            .map_err(|e| PipelineError::Storage(format!("write failed: {}", e)))?;

        let staged = StagedFile::new(file.into_temp_path());
        debug!("Staged {} bytes at {}", bytes.len(), staged.path().display());
        Ok(staged)
    }
}

/// Exclusive handle to one staged upload
///
/// `release` deletes the file and reports failures. If the handle is dropped
/// without being released (early return, panic), the file is still removed.
#[derive(Debug)]
pub struct StagedFile {
    path: Option<TempPath>,
    location: PathBuf,
}

impl StagedFile {
    pub fn new(path: TempPath) -> Self {
        let location = path.to_path_buf();
        Self {
            path: Some(path),
            location,
        }
    }

    pub fn path(&self) -> &Path {
        &self.location
    }

    /// Delete the staged file
    pub fn release(mut self) -> Result<(), PipelineError> {
        match self.path.take() {
            Some(path) => path
                .close()
                .map_err(|e| PipelineError::Storage(format!("cleanup failed: {}", e))),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = path.close() {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove staged file {}: {}", self.location.display(), e);
                }
            }
        }
    }
}
