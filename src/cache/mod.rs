// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Dependency cache
//!
//! A key → artifact store shared across job instantiations and outliving
//! individual runs. A hit short-circuits the fallback producer; a miss runs
//! the producer exactly once per instantiation and commits the result for
//! next time.

mod filesystem;
mod hash;

pub use filesystem::{copy_tree, FilesystemCache};
pub use hash::hash_key;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::errors::RosflowError;

/// Trait for dependency cache implementations
#[async_trait]
pub trait DependencyCache: Send + Sync {
    /// Path of a previously committed artifact for `key`, if any
    async fn lookup(&self, key: &str) -> Result<Option<PathBuf>, RosflowError>;

    /// Commit the artifact at `artifact` under `key`, returning the stored
    /// path. Population is staged and atomically renamed into place; a
    /// reader never observes a partial artifact.
    async fn store(&self, key: &str, artifact: &Path) -> Result<PathBuf, RosflowError>;

    /// Clear all cached artifacts
    async fn clear(&self) -> Result<(), RosflowError>;

    /// Get cache statistics
    async fn stats(&self) -> Result<CacheStats, RosflowError>;
}

/// Restore a cached artifact to `dest`, or run `producer` and commit the result
///
/// Returns whether the call was a cache hit. The producer writes the
/// artifact at `dest`; it is invoked exactly once, and only on a miss.
pub async fn restore_or_populate<F, Fut>(
    cache: &dyn DependencyCache,
    key: &str,
    dest: &Path,
    producer: F,
) -> Result<bool, RosflowError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<(), RosflowError>> + Send,
{
    if let Some(cached) = cache.lookup(key).await? {
        restore_tree(&cached, dest)?;
        tracing::debug!(key, "cache hit");
        return Ok(true);
    }

    tracing::debug!(key, "cache miss, running producer");
    producer().await?;
    cache.store(key, dest).await?;

    Ok(false)
}

/// Copy a committed entry into place, leaving the cache's own metadata behind
fn restore_tree(src: &Path, dest: &Path) -> Result<(), RosflowError> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_name().to_str() == Some(filesystem::META_FILE) {
            continue;
        }

        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of committed artifacts
    pub entries: usize,
    /// Total size in bytes
    pub size_bytes: u64,
    /// Oldest artifact timestamp
    pub oldest_entry: Option<SystemTime>,
    /// Newest artifact timestamp
    pub newest_entry: Option<SystemTime>,
}

impl CacheStats {
    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.size_bytes >= GB {
            format!("{:.2} GB", self.size_bytes as f64 / GB as f64)
        } else if self.size_bytes >= MB {
            format!("{:.2} MB", self.size_bytes as f64 / MB as f64)
        } else if self.size_bytes >= KB {
            format!("{:.2} KB", self.size_bytes as f64 / KB as f64)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}

/// Metadata written alongside each committed artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMeta {
    /// Original key string
    pub key: String,
    /// When the artifact was committed
    pub timestamp: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    async fn seeded_cache() -> (TempDir, FilesystemCache) {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(dir.path().join("store")).unwrap();
        (dir, cache)
    }

    #[tokio::test]
    async fn test_miss_runs_producer_exactly_once() {
        let (dir, cache) = seeded_cache().await;
        let dest = dir.path().join("artifact");
        let calls = AtomicUsize::new(0);

        let hit = restore_or_populate(&cache, "pip", &dest, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::create_dir_all(&dest).await?;
            tokio::fs::write(dest.join("wheel"), b"contents").await?;
            Ok(())
        })
        .await
        .unwrap();

        assert!(!hit);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hit_short_circuits_producer() {
        let (dir, cache) = seeded_cache().await;
        let dest = dir.path().join("artifact");

        tokio::fs::create_dir_all(&dest).await.unwrap();
        tokio::fs::write(dest.join("wheel"), b"contents").await.unwrap();
        cache.store("pip", &dest).await.unwrap();

        let restore_to = dir.path().join("restored");
        let hit = restore_or_populate(&cache, "pip", &restore_to, || async {
            panic!("producer must not run on a hit");
        })
        .await
        .unwrap();

        assert!(hit);
        assert_eq!(
            tokio::fs::read(restore_to.join("wheel")).await.unwrap(),
            b"contents"
        );
    }

    #[tokio::test]
    async fn test_restore_leaves_no_cache_bookkeeping() {
        let (dir, cache) = seeded_cache().await;
        let dest = dir.path().join("artifact");

        tokio::fs::create_dir_all(&dest).await.unwrap();
        tokio::fs::write(dest.join("wheel"), b"contents").await.unwrap();
        cache.store("pip", &dest).await.unwrap();

        let restore_to = dir.path().join("restored");
        restore_or_populate(&cache, "pip", &restore_to, || async {
            panic!("producer must not run on a hit");
        })
        .await
        .unwrap();

        assert!(restore_to.join("wheel").exists());
        // the entry's own metadata must not leak into the artifact
        assert!(!restore_to.join(".rosflow-meta.json").exists());
    }

    #[tokio::test]
    async fn test_formatted_size() {
        let stats = CacheStats {
            entries: 1,
            size_bytes: 3 * 1024 * 1024,
            oldest_entry: None,
            newest_entry: None,
        };
        assert_eq!(stats.formatted_size(), "3.00 MB");
    }
}
