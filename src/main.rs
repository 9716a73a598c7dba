// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use fabstir_detect_node::{
    api::start_server,
    cli::ServeArgs,
    pipeline::DetectionPipeline,
    version,
    vision::DetectionModelManager,
};
use std::{env, sync::Arc};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let args = ServeArgs::parse();

    println!("🚀 Starting Fabstir Detect Node...\n");
    println!("📦 BUILD VERSION: {}", version::VERSION);
    println!("📅 Build Date: {}", version::BUILD_DATE);
    println!();

    let config = args.resolve_config()?;
    tracing::info!("{}", version::get_version_string());
    tracing::info!(
        "Config: max_upload_bytes={}, max_frames={}, allowed_extensions={:?}",
        config.max_upload_bytes,
        config.max_frames,
        config.allowed_extensions
    );

    // Load the detection model once; it is shared read-only from here on
    println!("🧠 Loading detection model...");
    let manager = DetectionModelManager::load(&config)?;
    let info = manager.info();
    println!("✅ Detection model loaded: {} ({} classes)", info.name, info.classes);

    let pipeline = Arc::new(DetectionPipeline::from_config(&config, manager.engine())?);
    tracing::info!("Staging uploads in {}", config.staging_dir().display());

    println!("🌐 Listening on http://{}", config.bind_address());
    start_server(&config, pipeline).await?;

    println!("👋 Detect node stopped");
    Ok(())
}
