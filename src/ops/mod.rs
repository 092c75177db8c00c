// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! External collaborator seams
//!
//! The process-backed services the orchestrator consumes are capability
//! traits with observable success/failure only: source fetching, workspace
//! building, the test harness, and the middleware core launcher (the
//! dependency cache has its own seam in `cache`). Implementations live in
//! the submodules; tests substitute fakes.

mod catkin;
mod git;
mod harness;

pub use catkin::{write_ignore_marker, CatkinBuilder, IGNORE_MARKER};
pub use git::GitFetcher;
pub use harness::{PytestHarness, RoscoreLauncher};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::RosflowError;
use crate::pipeline::TestTarget;

/// A built, sourceable workspace environment
#[derive(Debug, Clone)]
pub struct Environment {
    /// Workspace root
    pub root: PathBuf,
    /// Environment variables tests run under
    pub env: HashMap<String, String>,
}

/// Outcome of one test-target process
#[derive(Debug, Clone)]
pub struct TestRun {
    pub target: TestTarget,
    pub exit_code: i32,
    pub duration: Duration,
    pub stderr: String,
}

impl TestRun {
    pub fn passed(&self) -> bool {
        self.exit_code == 0
    }
}

/// Materializes repository trees
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Materialize `repo` at `reference` into `dest`, optionally recursing
    /// into nested sub-trees
    async fn fetch(
        &self,
        repo: &str,
        reference: &str,
        dest: &Path,
        submodules: bool,
    ) -> Result<(), RosflowError>;

    /// Check the underlying tool is available
    async fn check_available(&self) -> Result<bool, RosflowError>;
}

/// Builds the aggregated workspace
#[async_trait]
pub trait WorkspaceBuilder: Send + Sync {
    /// Build every fetched source root under `workspace` into a sourceable
    /// environment. All-or-nothing: one failing sub-package fails the build.
    async fn build(
        &self,
        workspace: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Environment, RosflowError>;

    async fn check_available(&self) -> Result<bool, RosflowError>;
}

/// Runs one test target as an independent process
#[async_trait]
pub trait TestHarness: Send + Sync {
    async fn run(
        &self,
        environment: &Environment,
        target: &TestTarget,
    ) -> Result<TestRun, RosflowError>;
}

/// Starts the background coordination process tests depend on
#[async_trait]
pub trait CoreLauncher: Send + Sync {
    async fn start(&self, environment: &Environment) -> Result<CoreHandle, RosflowError>;
}

/// Handle to a backgrounded middleware core
pub struct CoreHandle {
    child: Option<tokio::process::Child>,
}

impl CoreHandle {
    /// Wrap a spawned core process
    pub fn from_child(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    /// Handle with no underlying process (test doubles)
    pub fn detached() -> Self {
        Self { child: None }
    }

    /// Terminate the core process, if one is attached
    pub async fn stop(mut self) -> Result<(), RosflowError> {
        if let Some(child) = self.child.as_mut() {
            child.start_kill().map_err(|e| RosflowError::Core {
                message: format!("failed to stop core: {}", e),
            })?;
            let _ = child.wait().await;
        }
        Ok(())
    }
}
