// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! # rosflow - ROS workspace CI orchestrator
//!
//! `rosflow` drives build/test matrices for ROS catkin workspaces: it
//! expands jobs across QP solver backends, restores cached dependency
//! artifacts, fetches pinned sources, builds the workspace, and runs
//! ordered pytest sequences against a live roscore.
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the pipeline definition
//! rosflow validate
//!
//! # Show the job graph with matrix fan-out
//! rosflow graph
//!
//! # Run as a push to master
//! rosflow run --branch master
//!
//! # Manual dispatch with the debug escape hatch armed
//! rosflow run --dispatch --log-level debug
//! ```

pub mod cache;
pub mod cli;
pub mod errors;
pub mod ops;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use errors::{RosflowError, RosflowResult};
pub use pipeline::{PipelineDefinition, PipelineRunner, RunOptions, TriggerEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
