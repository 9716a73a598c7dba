// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;
pub mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub use serve::ServeArgs;

/// Fabstir Detect Node CLI
#[derive(Parser, Debug)]
#[command(name = "detect-cli")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Run object detection on local media files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect objects in an image or video file
    Detect(detect::DetectArgs),

    /// Print the class labels of the configured model
    Labels(detect::LabelsArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect(args) => detect::detect_file(args).await,
        Commands::Labels(args) => detect::print_labels(args).await,
    }
}
