// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! catkin-backed workspace builder
//!
//! Builds the aggregated source tree in one shot. Sub-package exclusion is
//! handled before invocation by dropping ignore marker files into the
//! excluded package directories.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::process::Command;

use super::{Environment, WorkspaceBuilder};
use crate::errors::RosflowError;

/// Marker file name that excludes a package from a catkin build
pub const IGNORE_MARKER: &str = "CATKIN_IGNORE";

/// Workspace builder shelling out to catkin-tools
pub struct CatkinBuilder;

impl CatkinBuilder {
    pub fn new() -> Self {
        Self
    }
}

/// Place an ignore marker so the named sub-package is excluded from the build
///
/// Must happen before `build` is invoked; the builder itself never looks at
/// robot parameters.
pub async fn write_ignore_marker(workspace: &Path, package: &str) -> Result<(), RosflowError> {
    let mut found = false;

    let src = workspace.join("src");
    let mut stack = vec![src];
    while let Some(dir) = stack.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(package) {
                tokio::fs::write(path.join(IGNORE_MARKER), b"").await?;
                found = true;
            } else {
                stack.push(path);
            }
        }
    }

    if !found {
        tracing::warn!(package, "ignore marker target not found in workspace");
    }

    Ok(())
}

#[async_trait]
impl WorkspaceBuilder for CatkinBuilder {
    async fn build(
        &self,
        workspace: &Path,
        env: &HashMap<String, String>,
    ) -> Result<Environment, RosflowError> {
        tracing::debug!(workspace = %workspace.display(), "building workspace");

        let output = Command::new("catkin")
            .arg("build")
            .arg("--no-status")
            .current_dir(workspace)
            .envs(env)
            .output()
            .await
            .map_err(|e| RosflowError::Build {
                stderr: e.to_string(),
                help: Some("Is catkin-tools installed and on PATH?".to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(RosflowError::build_failed(stderr));
        }

        let mut built_env = env.clone();
        built_env.insert(
            "ROS_WORKSPACE".to_string(),
            workspace.to_string_lossy().to_string(),
        );

        Ok(Environment {
            root: workspace.to_path_buf(),
            env: built_env,
        })
    }

    async fn check_available(&self) -> Result<bool, RosflowError> {
        Ok(which::which("catkin").is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ignore_marker_written() {
        let ws = TempDir::new().unwrap();
        let pkg = ws.path().join("src").join("giskardpy").join("giskardpy_examples");
        tokio::fs::create_dir_all(&pkg).await.unwrap();

        write_ignore_marker(ws.path(), "giskardpy_examples")
            .await
            .unwrap();

        assert!(pkg.join(IGNORE_MARKER).exists());
    }

    #[tokio::test]
    async fn test_ignore_marker_missing_package_is_not_fatal() {
        let ws = TempDir::new().unwrap();
        tokio::fs::create_dir_all(ws.path().join("src")).await.unwrap();

        let result = write_ignore_marker(ws.path(), "no_such_pkg").await;
        assert!(result.is_ok());
    }
}
