// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Cache key hashing
//!
//! Keys are stable strings (`pip`, `qpSWIFT`, `bpb`); BLAKE3 turns them into
//! filesystem-safe entry names.

use blake3::Hasher;

/// Hash a cache key string
pub fn hash_key(key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(key.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Shard a hash into a (prefix, rest) pair for directory layout
pub fn shard(hash: &str) -> (&str, &str) {
    hash.split_at(2.min(hash.len()))
}
