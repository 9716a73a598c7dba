// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction API endpoint module
//!
//! Provides POST /predict (and /api/predict) for object detection on an
//! uploaded image or short video.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::predict_handler;
pub use request::{read_upload, FILE_FIELD_NAMES};
pub use response::PredictResponse;
