// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Filesystem-based dependency cache
//!
//! Artifacts are directories committed under a blake3-keyed, sharded layout.
//! Population is copy-on-write: the artifact is staged next to its final
//! location and atomically renamed into place, so concurrent readers see
//! either a complete prior artifact or none. When two instantiations race
//! on the same miss, the first commit wins and the loser's staging is
//! discarded; no lock is taken.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{hash, CacheStats, DependencyCache, EntryMeta};
use crate::errors::RosflowError;

pub(super) const META_FILE: &str = ".rosflow-meta.json";

/// Filesystem-backed dependency cache
pub struct FilesystemCache {
    /// Cache root directory
    root: PathBuf,
}

impl FilesystemCache {
    /// Create a cache rooted at `root`
    pub fn new(root: PathBuf) -> Result<Self, RosflowError> {
        if !root.exists() {
            std::fs::create_dir_all(&root).map_err(|e| RosflowError::CacheError {
                message: format!("Failed to create cache directory: {}", e),
            })?;
        }

        Ok(Self { root })
    }

    /// Create a cache in the account-scoped data directory
    ///
    /// The cache is shared by every pipeline run under this account, not
    /// scoped to a single run.
    pub fn account_scoped() -> Result<Self, RosflowError> {
        let dirs = directories::ProjectDirs::from("", "", "rosflow").ok_or_else(|| {
            RosflowError::CacheError {
                message: "Could not determine account data directory".to_string(),
            }
        })?;

        Self::new(dirs.data_local_dir().join("cache"))
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let hashed = hash::hash_key(key);
        let (prefix, rest) = hash::shard(&hashed);
        self.root.join(prefix).join(rest)
    }

    fn staging_path(&self, entry: &Path) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let name = format!(
            "{}.staging-{}-{}",
            entry.file_name().and_then(|n| n.to_str()).unwrap_or("entry"),
            std::process::id(),
            nanos
        );
        entry.with_file_name(name)
    }

    pub fn list_entries(&self) -> Result<Vec<(PathBuf, Option<EntryMeta>)>, RosflowError> {
        let mut entries = Vec::new();

        if !self.root.exists() {
            return Ok(entries);
        }

        for prefix_dir in std::fs::read_dir(&self.root).map_err(|e| RosflowError::CacheError {
            message: format!("Failed to read cache directory: {}", e),
        })? {
            let prefix_dir = prefix_dir
                .map_err(|e| RosflowError::CacheError {
                    message: format!("Failed to read cache entry: {}", e),
                })?
                .path();

            if !prefix_dir.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&prefix_dir).map_err(|e| RosflowError::CacheError {
                message: format!("Failed to read cache shard: {}", e),
            })? {
                let entry = entry
                    .map_err(|e| RosflowError::CacheError {
                        message: format!("Failed to read cache entry: {}", e),
                    })?
                    .path();

                if !entry.is_dir() {
                    continue;
                }

                // In-flight staging directories are not entries
                if entry
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.contains(".staging-"))
                {
                    continue;
                }

                let meta = std::fs::read_to_string(entry.join(META_FILE))
                    .ok()
                    .and_then(|content| serde_json::from_str::<EntryMeta>(&content).ok());

                entries.push((entry, meta));
            }
        }

        Ok(entries)
    }

    fn dir_size(path: &Path) -> Result<u64, RosflowError> {
        let mut size = 0;

        if path.is_file() {
            return Ok(path.metadata().map(|m| m.len()).unwrap_or(0));
        }

        for entry in std::fs::read_dir(path).map_err(|e| RosflowError::CacheError {
            message: format!("Failed to read directory: {}", e),
        })? {
            let entry = entry.map_err(|e| RosflowError::CacheError {
                message: format!("Failed to read entry: {}", e),
            })?;

            let path = entry.path();
            if path.is_dir() {
                size += Self::dir_size(&path)?;
            } else {
                size += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        Ok(size)
    }
}

#[async_trait]
impl DependencyCache for FilesystemCache {
    async fn lookup(&self, key: &str) -> Result<Option<PathBuf>, RosflowError> {
        let entry = self.entry_path(key);

        if entry.is_dir() {
            Ok(Some(entry))
        } else {
            Ok(None)
        }
    }

    async fn store(&self, key: &str, artifact: &Path) -> Result<PathBuf, RosflowError> {
        let entry = self.entry_path(key);
        let staging = self.staging_path(&entry);

        if let Some(parent) = entry.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                RosflowError::CacheError {
                    message: format!("Failed to create cache shard: {}", e),
                }
            })?;
        }

        copy_tree(artifact, &staging)?;

        let meta = EntryMeta {
            key: key.to_string(),
            timestamp: SystemTime::now(),
        };
        let json = serde_json::to_string_pretty(&meta)?;
        tokio::fs::write(staging.join(META_FILE), json).await.map_err(|e| {
            RosflowError::CacheError {
                message: format!("Failed to write cache metadata: {}", e),
            }
        })?;

        match tokio::fs::rename(&staging, &entry).await {
            Ok(()) => Ok(entry),
            Err(_) if entry.is_dir() => {
                // A sibling instantiation committed first; keep its artifact.
                let _ = tokio::fs::remove_dir_all(&staging).await;
                Ok(entry)
            }
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&staging).await;
                Err(RosflowError::CacheError {
                    message: format!("Failed to commit cache entry: {}", e),
                })
            }
        }
    }

    async fn clear(&self) -> Result<(), RosflowError> {
        if self.root.exists() {
            tokio::fs::remove_dir_all(&self.root).await.map_err(|e| {
                RosflowError::CacheError {
                    message: format!("Failed to clear cache: {}", e),
                }
            })?;

            tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
                RosflowError::CacheError {
                    message: format!("Failed to recreate cache directory: {}", e),
                }
            })?;
        }

        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, RosflowError> {
        let entries = self.list_entries()?;

        let mut stats = CacheStats {
            entries: entries.len(),
            size_bytes: 0,
            oldest_entry: None,
            newest_entry: None,
        };

        for (_, meta) in &entries {
            let Some(meta) = meta else { continue };

            match stats.oldest_entry {
                None => stats.oldest_entry = Some(meta.timestamp),
                Some(oldest) if meta.timestamp < oldest => {
                    stats.oldest_entry = Some(meta.timestamp)
                }
                _ => {}
            }

            match stats.newest_entry {
                None => stats.newest_entry = Some(meta.timestamp),
                Some(newest) if meta.timestamp > newest => {
                    stats.newest_entry = Some(meta.timestamp)
                }
                _ => {}
            }
        }

        if self.root.exists() {
            stats.size_bytes = Self::dir_size(&self.root)?;
        }

        Ok(stats)
    }
}

/// Recursively copy a directory tree (or single file)
pub fn copy_tree(src: &Path, dest: &Path) -> Result<(), RosflowError> {
    if src.is_file() {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dest)?;
        return Ok(());
    }

    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());

        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn artifact_in(dir: &Path) -> PathBuf {
        let artifact = dir.join("blob");
        tokio::fs::create_dir_all(artifact.join("nested")).await.unwrap();
        tokio::fs::write(artifact.join("nested").join("file"), b"data")
            .await
            .unwrap();
        artifact
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(dir.path().join("store")).unwrap();
        let artifact = artifact_in(dir.path()).await;

        assert!(cache.lookup("qpSWIFT").await.unwrap().is_none());

        let stored = cache.store("qpSWIFT", &artifact).await.unwrap();
        assert!(stored.join("nested").join("file").exists());

        let found = cache.lookup("qpSWIFT").await.unwrap().unwrap();
        assert_eq!(found, stored);
    }

    #[tokio::test]
    async fn test_store_twice_keeps_complete_artifact() {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(dir.path().join("store")).unwrap();
        let artifact = artifact_in(dir.path()).await;

        let first = cache.store("pip", &artifact).await.unwrap();
        let second = cache.store("pip", &artifact).await.unwrap();

        assert_eq!(first, second);
        assert!(second.join("nested").join("file").exists());
        // loser's staging directory must not linger as an entry
        assert_eq!(cache.stats().await.unwrap().entries, 1);
    }

    #[tokio::test]
    async fn test_clear_and_stats() {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(dir.path().join("store")).unwrap();
        let artifact = artifact_in(dir.path()).await;

        cache.store("pip", &artifact).await.unwrap();
        cache.store("bpb", &artifact).await.unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.size_bytes > 0);
        assert!(stats.oldest_entry.is_some());

        cache.clear().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().entries, 0);
    }

    #[tokio::test]
    async fn test_keys_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let cache = FilesystemCache::new(dir.path().join("store")).unwrap();
        let artifact = artifact_in(dir.path()).await;

        cache.store("pip", &artifact).await.unwrap();

        assert!(cache.lookup("pip").await.unwrap().is_some());
        assert!(cache.lookup("qpSWIFT").await.unwrap().is_none());
    }
}
