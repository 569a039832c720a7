// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod detect;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// DDS70 basketball detector CLI
#[derive(Parser, Debug)]
#[command(name = "dds70-cli")]
#[command(version)]
#[command(about = "Run basketball detection on image files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Detect objects in one or more image files
    Detect(detect::DetectArgs),

    /// Show which model would be loaded and its classes
    Info(detect::InfoArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Detect(args) => detect::run_detect(args).await,
        Commands::Info(args) => detect::show_info(args).await,
    }
}
