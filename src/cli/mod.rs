// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for rosflow.

pub mod cache;
pub mod graph;
pub mod run;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::pipeline::LogLevel;

/// ROS workspace CI orchestrator
///
/// Expand build/test matrices, restore cached dependencies, and drive
/// catkin workspaces through fetch, build, and ordered test sequences.
#[derive(Parser, Debug)]
#[clap(
    name = "rosflow",
    version,
    about = "CI orchestrator for ROS workspace build and test matrices",
    long_about = None,
    after_help = "Examples:\n\
        rosflow run --branch master        Run as a push to master\n\
        rosflow run --dispatch --log-level debug\n\
        rosflow validate                   Check the pipeline definition\n\
        rosflow graph --format mermaid     Show the job graph\n\n\
        See 'rosflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for a trigger event
    Run {
        /// Pipeline file
        #[clap(short, long, default_value = ".rosflow.yaml")]
        pipeline: PathBuf,

        /// Simulate a push to this branch
        #[clap(long, value_name = "BRANCH", conflicts_with_all = ["pull_request", "dispatch"])]
        branch: Option<String>,

        /// Simulate a pull request targeting this branch
        #[clap(long, value_name = "BRANCH", conflicts_with = "dispatch")]
        pull_request: Option<String>,

        /// Trigger a manual dispatch
        #[clap(long)]
        dispatch: bool,

        /// Log level for a manual dispatch (info, warning, debug)
        #[clap(long, default_value = "info", requires = "dispatch")]
        log_level: LogLevel,

        /// Select the alternate test tag set (dispatch only)
        #[clap(long, requires = "dispatch")]
        alt_test_tags: bool,

        /// Run only specific jobs
        #[clap(short, long)]
        job: Vec<String>,

        /// Skip cache (producers always run)
        #[clap(long)]
        no_cache: bool,

        /// Dry run (show the plan without executing)
        #[clap(long)]
        dry_run: bool,

        /// Root directory for per-run sandboxes
        #[clap(long, value_name = "DIR")]
        sandbox: Option<PathBuf>,
    },

    /// Validate the pipeline definition
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = ".rosflow.yaml")]
        pipeline: PathBuf,
    },

    /// Show the job dependency graph
    Graph {
        /// Pipeline file
        #[clap(default_value = ".rosflow.yaml")]
        pipeline: PathBuf,

        /// Output format (text, dot, mermaid)
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Dependency cache management
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },
}

/// Cache management actions
#[derive(Subcommand, Debug, Clone)]
pub enum CacheAction {
    /// Show cache statistics
    Stats,

    /// Clear the cache
    Clear {
        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },

    /// List cached entries
    List,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}
