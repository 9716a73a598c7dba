// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::Multipart;
use tracing::{debug, warn};

use super::request::read_upload;
use super::response::PredictResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// POST /predict - Detect objects in an uploaded image or video
///
/// # Request
/// Multipart form with the file in a `file` or `image` field.
/// Accepted types: png, jpg, jpeg, gif, mp4, avi, mov, mkv (configurable).
///
/// # Response
/// - `success`: always true
/// - `file_type`: validated extension
/// - `media_type`: "image" or "video"
/// - `detections`: `{class, confidence, bbox, frame?}` entries
/// - `frames_processed`: video only
/// - `processing_time_ms`: processing time in milliseconds
///
/// # Errors
/// - 400 Bad Request: missing file, unsupported type, too large, malformed body
/// - 500 Internal Server Error: staging, decode or detection failure
pub async fn predict_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>, ApiError> {
    // 1. Extract and pre-validate the upload
    let upload = read_upload(&mut multipart, state.pipeline.validator())
        .await
        .map_err(|e| {
            warn!("Predict request rejected: {}", e);
            e
        })?;

    debug!(
        "Predict request received: {} ({} bytes)",
        upload.filename, upload.declared_size
    );

    // 2. Run the blocking pipeline off the async executor
    let pipeline = state.pipeline.clone();
    let report = tokio::task::spawn_blocking(move || pipeline.run(upload))
        .await
        .map_err(|e| {
            warn!("Detection task failed: {}", e);
            ApiError::InternalError(format!("Detection task failed: {}", e))
        })??;

    Ok(Json(PredictResponse::from(report)))
}
