// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Concurrent requests share only the engine

use crate::common::{
    jpeg_bytes, pipeline_with, staged_file_count, FakeVideoDecoder, ScriptedEngine,
};
use fabstir_detect_node::{
    config::DetectConfig,
    pipeline::{TempDirStaging, UploadRequest},
    vision::RawDetection,
};
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_parallel_requests_are_isolated() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(
        ScriptedEngine::new(&["cat"]).always(vec![RawDetection::new(0, 0.8, [0.0, 0.0, 3.0, 3.0])]),
    );
    let pipeline = pipeline_with(
        &DetectConfig::default(),
        Arc::new(TempDirStaging::new(dir.path()).unwrap()),
        engine.clone(),
        Arc::new(FakeVideoDecoder::with_frames(3)),
    );

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pipeline = &pipeline;
                scope.spawn(move || {
                    let request = if i % 2 == 0 {
                        UploadRequest::new(format!("photo-{}.jpg", i), jpeg_bytes())
                    } else {
                        UploadRequest::new(format!("clip-{}.mp4", i), b"video".to_vec())
                    };
                    pipeline.run(request)
                })
            })
            .collect();

        for handle in handles {
            let report = handle.join().unwrap().unwrap();
            assert!(!report.detections.is_empty());
        }
    });

    // 4 images x 1 call + 4 videos x 3 frames
    assert_eq!(engine.calls(), 16);
    assert_eq!(staged_file_count(dir.path()), 0);
}
