// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Test harness and middleware core launcher
//!
//! Each test target runs as its own pytest process against the built
//! environment; the core is a backgrounded roscore the tests coordinate
//! through.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

use super::{CoreHandle, CoreLauncher, Environment, TestHarness, TestRun};
use crate::errors::RosflowError;
use crate::pipeline::TestTarget;

/// Test harness shelling out to pytest, one process per target
pub struct PytestHarness;

impl PytestHarness {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PytestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestHarness for PytestHarness {
    async fn run(
        &self,
        environment: &Environment,
        target: &TestTarget,
    ) -> Result<TestRun, RosflowError> {
        let start = Instant::now();

        tracing::info!(test = %target, "running test target");

        let output = Command::new("python3")
            .arg("-m")
            .arg("pytest")
            .arg(&target.0)
            .current_dir(&environment.root)
            .envs(&environment.env)
            .output()
            .await
            .map_err(|e| RosflowError::Harness {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        Ok(TestRun {
            target: target.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Launches roscore in the background
pub struct RoscoreLauncher;

impl RoscoreLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CoreLauncher for RoscoreLauncher {
    async fn start(&self, environment: &Environment) -> Result<CoreHandle, RosflowError> {
        let child = Command::new("roscore")
            .current_dir(&environment.root)
            .envs(&environment.env)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RosflowError::Core {
                message: e.to_string(),
            })?;

        tracing::debug!("middleware core started");

        Ok(CoreHandle::from_child(child))
    }
}
