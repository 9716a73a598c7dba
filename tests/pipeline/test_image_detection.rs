// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Still-image path tests

use crate::common::{
    corrupt_jpeg_bytes, encoded_image, jpeg_bytes, pipeline_with, staged_file_count,
    tiny_gif_bytes, FakeVideoDecoder, ScriptedEngine,
};
use fabstir_detect_node::{
    config::DetectConfig,
    pipeline::{Detection, MediaKind, PipelineError, TempDirStaging, UploadRequest},
    vision::RawDetection,
};
use image::ImageFormat;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    engine: Arc<ScriptedEngine>,
    decoder: Arc<FakeVideoDecoder>,
    pipeline: fabstir_detect_node::DetectionPipeline,
}

fn fixture(engine: ScriptedEngine) -> Fixture {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine);
    let decoder = Arc::new(FakeVideoDecoder::with_frames(0));
    let pipeline = pipeline_with(
        &DetectConfig::default(),
        Arc::new(TempDirStaging::new(dir.path()).unwrap()),
        engine.clone(),
        decoder.clone(),
    );
    Fixture {
        dir,
        engine,
        decoder,
        pipeline,
    }
}

// ============================================================================
// Scenario A: photo.jpg with one cat
// ============================================================================

#[test]
fn test_photo_with_single_detection() {
    let f = fixture(
        ScriptedEngine::new(&["cat", "dog"])
            .always(vec![RawDetection::new(0, 0.92, [10.0, 20.0, 110.0, 220.0])]),
    );

    let report = f
        .pipeline
        .run(UploadRequest::new("photo.jpg", jpeg_bytes()))
        .unwrap();

    assert_eq!(report.file_type, "jpg");
    assert_eq!(report.media_type, MediaKind::Image);
    assert_eq!(report.frames_processed, None);
    assert_eq!(
        report.detections,
        vec![Detection {
            class: "cat".to_string(),
            confidence: 0.92,
            bbox: [10.0, 20.0, 110.0, 220.0],
            frame: None,
        }]
    );
    assert_eq!(f.engine.calls(), 1);
    // Images never touch the video decoder
    assert!(f.decoder.opened().is_empty());
}

#[test]
fn test_image_without_detections() {
    let f = fixture(ScriptedEngine::new(&["cat"]));

    let report = f
        .pipeline
        .run(UploadRequest::new("empty.png", encoded_image(16, 16, ImageFormat::Png)))
        .unwrap();

    assert!(report.detections.is_empty());
    assert_eq!(f.engine.calls(), 1);
}

#[test]
fn test_gif_uses_first_frame() {
    let f = fixture(
        ScriptedEngine::new(&["cat"]).always(vec![RawDetection::new(0, 0.5, [0.0, 0.0, 1.0, 1.0])]),
    );

    let report = f
        .pipeline
        .run(UploadRequest::new("anim.GIF", tiny_gif_bytes()))
        .unwrap();

    assert_eq!(report.file_type, "gif");
    assert_eq!(report.detections.len(), 1);
    assert!(report.detections.iter().all(|d| d.frame.is_none()));
}

#[test]
fn test_extension_mismatch_still_decodes() {
    // PNG content under a .jpg name: content decides the decoder
    let f = fixture(ScriptedEngine::new(&["cat"]));

    let result = f
        .pipeline
        .run(UploadRequest::new("mislabelled.jpg", encoded_image(8, 8, ImageFormat::Png)));
    assert!(result.is_ok());
}

// ============================================================================
// Scenario D: corrupt image
// ============================================================================

#[test]
fn test_corrupt_image_is_decode_error_and_cleaned_up() {
    let f = fixture(ScriptedEngine::new(&["cat"]));

    let err = f
        .pipeline
        .run(UploadRequest::new("broken.jpg", corrupt_jpeg_bytes()))
        .unwrap_err();

    assert!(matches!(err, PipelineError::Decode(_)));
    assert!(err.to_string().starts_with("Failed to decode media"));
    assert_eq!(f.engine.calls(), 0);
    assert_eq!(staged_file_count(f.dir.path()), 0);
}

#[test]
fn test_unknown_class_is_schema_error() {
    let f = fixture(
        ScriptedEngine::new(&["cat"]).always(vec![RawDetection::new(5, 0.9, [0.0, 0.0, 1.0, 1.0])]),
    );

    let err = f
        .pipeline
        .run(UploadRequest::new("photo.jpg", jpeg_bytes()))
        .unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
    assert_eq!(staged_file_count(f.dir.path()), 0);
}
