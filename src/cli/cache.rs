// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Cache command - manage the dependency cache

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};

use super::CacheAction;
use crate::cache::{DependencyCache, FilesystemCache};

/// Run the cache command
pub async fn run(action: CacheAction, _verbose: bool) -> Result<()> {
    let cache = FilesystemCache::account_scoped()
        .map_err(|e| miette::miette!("Failed to open cache: {}", e))?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats().await?;

            crate::utils::print_header("Cache Statistics");
            println!("  Location: {}", cache.root().display());
            println!("  Entries:  {}", stats.entries);
            println!("  Size:     {}", stats.formatted_size());

            if let Some(oldest) = stats.oldest_entry {
                if let Ok(duration) = oldest.elapsed() {
                    println!("  Oldest:   {} ago", format_duration(duration));
                }
            }

            if let Some(newest) = stats.newest_entry {
                if let Ok(duration) = newest.elapsed() {
                    println!("  Newest:   {} ago", format_duration(duration));
                }
            }

            Ok(())
        }

        CacheAction::Clear { yes } => {
            let stats = cache.stats().await?;

            if stats.entries == 0 {
                println!("{}", "Cache is already empty.".dimmed());
                return Ok(());
            }

            if !yes {
                print!(
                    "Clear {} cache entries ({})? [y/N] ",
                    stats.entries,
                    stats.formatted_size()
                );
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            cache.clear().await?;
            println!("{}", "Cache cleared.".green());

            Ok(())
        }

        CacheAction::List => {
            let entries = cache
                .list_entries()
                .map_err(|e| miette::miette!("Failed to list cache entries: {}", e))?;

            crate::utils::print_header("Cached Entries");

            if entries.is_empty() {
                println!("{}", "  No cached entries.".dimmed());
            } else {
                for (path, meta) in &entries {
                    match meta {
                        Some(meta) => println!("  {}", meta.key),
                        None => println!("  {}", path.display().to_string().dimmed()),
                    }
                }
                println!();
                println!(
                    "{}",
                    "  Run 'rosflow run --no-cache' to bypass cache.".dimmed()
                );
            }

            Ok(())
        }
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
