// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! git-backed source fetcher
//!
//! Shallow-clones a repository at a pinned ref. Fetches into disjoint
//! destinations never interfere; ordering for nested destinations is the
//! executor's concern (steps run in declaration order).

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use super::SourceFetcher;
use crate::errors::RosflowError;

/// Source fetcher shelling out to git
pub struct GitFetcher;

impl GitFetcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SourceFetcher for GitFetcher {
    async fn fetch(
        &self,
        repo: &str,
        reference: &str,
        dest: &Path,
        submodules: bool,
    ) -> Result<(), RosflowError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new("git");
        cmd.arg("clone")
            .arg("--depth=1")
            .arg("--branch")
            .arg(reference)
            .arg(repo)
            .arg(dest);

        if submodules {
            cmd.arg("--recurse-submodules").arg("--shallow-submodules");
        }

        tracing::debug!(repo, reference, dest = %dest.display(), "fetching source");

        let output = cmd.output().await.map_err(|e| RosflowError::Fetch {
            repo: repo.to_string(),
            reference: reference.to_string(),
            message: e.to_string(),
            help: Some("Is git installed and on PATH?".to_string()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(RosflowError::fetch_failed(repo, reference, stderr));
        }

        Ok(())
    }

    async fn check_available(&self) -> Result<bool, RosflowError> {
        Ok(which::which("git").is_ok())
    }
}
