// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::predict::predict_handler;
use crate::config::DetectConfig;
use crate::pipeline::DetectionPipeline;
use crate::version;

/// Plain-text body of GET /
pub const LANDING_TEXT: &str = "YOLOv8 Object Detection API";

/// Room for multipart boundaries and headers on top of the file itself
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DetectionPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<DetectionPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub classes: usize,
    pub version: String,
    pub features: Vec<String>,
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    let body_limit = state
        .pipeline
        .validator()
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let body_limit = usize::try_from(body_limit).unwrap_or(usize::MAX);

    Router::new()
        // Landing page
        .route("/", get(landing_handler))
        // Health check
        .route("/health", get(health_handler))
        // Detection endpoints
        .route("/predict", post(predict_handler))
        .route("/api/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn start_server(config: &DetectConfig, pipeline: Arc<DetectionPipeline>) -> anyhow::Result<()> {
    let app = create_router(AppState::new(pipeline));

    let addr = config.bind_address().parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn landing_handler() -> &'static str {
    LANDING_TEXT
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.pipeline.engine();
    Json(HealthResponse {
        status: "ok".to_string(),
        model: engine.name().to_string(),
        classes: engine.taxonomy().len(),
        version: version::VERSION.to_string(),
        features: version::FEATURES.iter().map(|f| f.to_string()).collect(),
    })
}
