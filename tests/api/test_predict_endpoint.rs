// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Predict endpoint tests for POST /predict
//!
//! These tests drive the full router with hand-built multipart bodies and
//! verify that the handler:
//! - Returns the success envelope for images and videos
//! - Rejects bad uploads with 400 before staging anything
//! - Maps pipeline failures to 500 with the error envelope
//! - Leaves no staged file behind

use crate::common::{
    corrupt_jpeg_bytes, jpeg_bytes, pipeline_with, staged_file_count, FakeVideoDecoder,
    MockStaging, ScriptedEngine,
};
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use fabstir_detect_node::{
    api::{create_router, AppState},
    config::DetectConfig,
    pipeline::{StagingArea, TempDirStaging},
    vision::{RawDetection, VideoDecoder},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "detect-test-boundary";

/// Multipart part: (field name, optional filename, content)
type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

fn part<'a>(name: &'a str, filename: Option<&'a str>, content: &'a [u8]) -> Part<'a> {
    (name, filename, content)
}

fn multipart_body(parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn predict_request(uri: &str, parts: &[Part]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

struct Server {
    app: axum::Router,
    engine: Arc<ScriptedEngine>,
    dir: TempDir,
}

fn server_with(config: DetectConfig, engine: ScriptedEngine, decoder: impl VideoDecoder + 'static) -> Server {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine);
    let staging: Arc<dyn StagingArea> = Arc::new(TempDirStaging::new(dir.path()).unwrap());
    let pipeline = pipeline_with(&config, staging, engine.clone(), Arc::new(decoder));
    Server {
        app: create_router(AppState::new(Arc::new(pipeline))),
        engine,
        dir,
    }
}

fn cat_server() -> Server {
    server_with(
        DetectConfig::default(),
        ScriptedEngine::new(&["cat", "dog"])
            .always(vec![RawDetection::new(0, 0.92, [10.0, 20.0, 110.0, 220.0])]),
        FakeVideoDecoder::with_frames(0),
    )
}

/// Router whose staging must never be touched
fn spy_server(config: DetectConfig) -> (axum::Router, Arc<ScriptedEngine>) {
    let mut staging = MockStaging::new();
    staging.expect_stage().times(0);

    let engine = Arc::new(ScriptedEngine::new(&["cat"]));
    let pipeline = pipeline_with(
        &config,
        Arc::new(staging),
        engine.clone(),
        Arc::new(FakeVideoDecoder::with_frames(0)),
    );
    (create_router(AppState::new(Arc::new(pipeline))), engine)
}

// ============================================================================
// Success Cases
// ============================================================================

#[tokio::test]
async fn test_predict_image_scenario_a() {
    let server = cat_server();
    let image = jpeg_bytes();

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("image", Some("photo.jpg"), &image)]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["file_type"], "jpg");
    assert_eq!(body["media_type"], "image");
    assert!(body.get("frames_processed").is_none());

    let detections = body["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["class"], "cat");
    assert!((detections[0]["confidence"].as_f64().unwrap() - 0.92).abs() < 1e-6);
    let bbox: Vec<f64> = detections[0]["bbox"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_f64().unwrap())
        .collect();
    assert_eq!(bbox, vec![10.0, 20.0, 110.0, 220.0]);
    assert!(detections[0].get("frame").is_none());

    assert_eq!(server.engine.calls(), 1);
    assert_eq!(staged_file_count(server.dir.path()), 0);
}

#[tokio::test]
async fn test_predict_accepts_file_field_and_api_alias() {
    let server = cat_server();
    let image = jpeg_bytes();

    let (status, body) = send(
        server.app,
        predict_request("/api/predict", &[part("file", Some("photo.png.jpg"), &image)]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detections"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_predict_skips_plain_form_fields() {
    let server = cat_server();
    let image = jpeg_bytes();

    let (status, _) = send(
        server.app,
        predict_request(
            "/predict",
            &[part("note", None, b"hello"), part("upload", Some("photo.jpg"), &image)],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_video_scenario_b() {
    let server = server_with(
        DetectConfig::default(),
        ScriptedEngine::new(&["cat", "dog"])
            .on_frame(2, vec![RawDetection::new(1, 0.7, [5.0, 5.0, 50.0, 60.0])]),
        FakeVideoDecoder::with_frames(5),
    );

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("file", Some("clip.mp4"), b"video bytes")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["media_type"], "video");
    assert_eq!(body["frames_processed"], 5);
    assert_eq!(body["detections"].as_array().unwrap().len(), 1);
    assert_eq!(body["detections"][0]["frame"], 2);
    assert_eq!(body["detections"][0]["class"], "dog");
    assert_eq!(staged_file_count(server.dir.path()), 0);
}

#[tokio::test]
async fn test_predict_video_frame_indices_within_cap() {
    let config = DetectConfig {
        max_frames: 3,
        ..Default::default()
    };
    let server = server_with(
        config,
        ScriptedEngine::new(&["cat"]).always(vec![RawDetection::new(0, 0.5, [0.0, 0.0, 1.0, 1.0])]),
        FakeVideoDecoder::with_frames(10),
    );

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("file", Some("clip.mkv"), b"video bytes")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let frames: Vec<u64> = body["detections"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["frame"].as_u64().unwrap())
        .collect();
    assert_eq!(frames, vec![0, 1, 2]);
    assert_eq!(server.engine.calls(), 3);
}

// ============================================================================
// Client Errors (400)
// ============================================================================

#[tokio::test]
async fn test_predict_unsupported_type_scenario_c() {
    let (app, engine) = spy_server(DetectConfig::default());

    let (status, body) = send(
        app,
        predict_request("/predict", &[part("file", Some("document.pdf"), b"%PDF-1.4")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "File type not supported"}));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_predict_oversize_upload() {
    let config = DetectConfig {
        max_upload_bytes: 16,
        ..Default::default()
    };
    let (app, engine) = spy_server(config);

    let (status, body) = send(
        app,
        predict_request("/predict", &[part("file", Some("photo.jpg"), &[0u8; 64])]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "File too large (max 16 bytes)"}));
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_predict_missing_file() {
    let (app, _engine) = spy_server(DetectConfig::default());

    let (status, body) = send(
        app,
        predict_request("/predict", &[part("note", None, b"no upload here")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No file provided"}));
}

#[tokio::test]
async fn test_predict_empty_filename() {
    let (app, _engine) = spy_server(DetectConfig::default());

    let (status, body) = send(
        app,
        predict_request("/predict", &[part("file", Some(""), b"")]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "No file selected"}));
}

// ============================================================================
// Server Errors (500)
// ============================================================================

#[tokio::test]
async fn test_predict_corrupt_image_scenario_d() {
    let server = cat_server();
    let broken = corrupt_jpeg_bytes();

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("file", Some("broken.jpg"), &broken)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to decode media"), "got {}", message);
    assert_eq!(server.engine.calls(), 0);
    assert_eq!(staged_file_count(server.dir.path()), 0);
}

#[tokio::test]
async fn test_predict_engine_failure() {
    let server = server_with(
        DetectConfig::default(),
        ScriptedEngine::new(&["cat"]).fail_on_frame(0),
        FakeVideoDecoder::with_frames(3),
    );

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("file", Some("clip.avi"), b"video bytes")]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Detection failed: Inference failed: boom"}));
    assert_eq!(staged_file_count(server.dir.path()), 0);
}

#[tokio::test]
async fn test_predict_engine_panic_is_500() {
    let server = server_with(
        DetectConfig::default(),
        ScriptedEngine::new(&["cat"]).panicking(),
        FakeVideoDecoder::with_frames(0),
    );
    let image = jpeg_bytes();

    let (status, body) = send(
        server.app,
        predict_request("/predict", &[part("file", Some("photo.jpg"), &image)]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Detection task failed"));
    assert_eq!(staged_file_count(server.dir.path()), 0);
}
