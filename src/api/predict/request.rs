// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction

use axum_extra::extract::Multipart;
use bytes::BytesMut;
use tracing::debug;

use crate::api::errors::ApiError;
use crate::pipeline::{MediaValidator, UploadRequest};

/// Form fields that carry the uploaded file
pub const FILE_FIELD_NAMES: &[&str] = &["file", "image"];

/// Pull the uploaded file out of a multipart body
///
/// The first field named `file` or `image`, or failing that the first field
/// with a filename, is the upload. Its extension is checked before the body
/// is read, and reading stops as soon as the size limit is passed.
pub async fn read_upload(
    multipart: &mut Multipart,
    validator: &MediaValidator,
) -> Result<UploadRequest, ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().map(str::to_string);
        let filename = field.file_name().map(str::to_string);

        let is_file_field = name
            .as_deref()
            .map(|n| FILE_FIELD_NAMES.contains(&n))
            .unwrap_or(false);
        if !is_file_field && filename.is_none() {
            continue;
        }

        let filename = filename.unwrap_or_default();
        validator
            .check_filename(&filename)
            .map_err(|rejection| ApiError::InvalidRequest(rejection.to_string()))?;

        let mut content = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            let size = (content.len() + chunk.len()) as u64;
            validator
                .check_size(size)
                .map_err(|rejection| ApiError::InvalidRequest(rejection.to_string()))?;
            content.extend_from_slice(&chunk);
        }

        debug!(
            "Received upload '{}' ({} bytes) in field {:?}",
            filename,
            content.len(),
            name
        );

        let declared_size = content.len() as u64;
        return Ok(UploadRequest {
            filename,
            content: content.freeze(),
            declared_size,
        });
    }

    Err(ApiError::InvalidRequest("No file provided".to_string()))
}

fn malformed(err: impl std::fmt::Display) -> ApiError {
    ApiError::InvalidRequest(format!("Malformed multipart body: {}", err))
}
