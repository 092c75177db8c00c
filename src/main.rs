// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! rosflow - ROS workspace CI orchestrator
//!
//! Expand build/test matrices and drive catkin workspaces through fetch,
//! build, and ordered test sequences.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rosflow::cli::{Cli, Commands};
use rosflow::pipeline::LogLevel;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A dispatch run's log-level input takes effect unless RUST_LOG is set
    let default_filter = match &cli.command {
        Commands::Run {
            dispatch: true,
            log_level,
            ..
        } => log_level.as_filter(),
        _ => LogLevel::Info.as_filter(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Run {
            pipeline,
            branch,
            pull_request,
            dispatch,
            log_level,
            alt_test_tags,
            job,
            no_cache,
            dry_run,
            sandbox,
        } => {
            let args = rosflow::cli::run::RunArgs {
                pipeline,
                branch,
                pull_request,
                dispatch,
                log_level,
                alt_test_tags,
                jobs: job,
                no_cache,
                dry_run,
                sandbox,
            };
            rosflow::cli::run::run(args, cli.verbose).await
        }
        Commands::Validate { pipeline } => {
            rosflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            rosflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Cache { action } => rosflow::cli::cache::run(action, cli.verbose).await,
    }
}
