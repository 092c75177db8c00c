// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Run command - execute the pipeline for a trigger event

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::FilesystemCache;
use crate::ops::{CatkinBuilder, GitFetcher, PytestHarness, RoscoreLauncher};
use crate::pipeline::{
    LogLevel, PipelineDefinition, PipelineRunner, PipelineValidator, RunOptions, TriggerEvent,
};

/// Arguments to the run command, lifted out of the clap enum
pub struct RunArgs {
    pub pipeline: PathBuf,
    pub branch: Option<String>,
    pub pull_request: Option<String>,
    pub dispatch: bool,
    pub log_level: LogLevel,
    pub alt_test_tags: bool,
    pub jobs: Vec<String>,
    pub no_cache: bool,
    pub dry_run: bool,
    pub sandbox: Option<PathBuf>,
}

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    if !args.pipeline.exists() {
        return Err(crate::errors::RosflowError::PipelineNotFound {
            path: args.pipeline.clone(),
        }
        .into());
    }

    let pipeline = PipelineDefinition::from_file(&args.pipeline)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))?;

    let validation = PipelineValidator::validate(&pipeline)?;

    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
        return Err(miette::miette!("Pipeline configuration is invalid"));
    }

    if validation.has_warnings() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &validation.warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let event = trigger_event(&args)?;

    let mut runner = PipelineRunner::new(
        Arc::new(GitFetcher::new()),
        Arc::new(CatkinBuilder::new()),
        Arc::new(PytestHarness::new()),
        Arc::new(RoscoreLauncher::new()),
    );

    if !args.dry_run {
        let spinner = crate::utils::create_spinner("Checking required tools");
        let missing = runner
            .check_tools()
            .await
            .map_err(|e| miette::miette!("Tool check failed: {}", e))?;
        spinner.finish_and_clear();

        if let Some(tool) = missing.first() {
            return Err(crate::errors::RosflowError::tool_not_found(tool).into());
        }
    }

    if !args.dry_run && !args.no_cache && pipeline.cache.enabled {
        let cache = match &pipeline.cache.directory {
            Some(dir) => FilesystemCache::new(dir.clone()),
            None => FilesystemCache::account_scoped(),
        }
        .map_err(|e| miette::miette!("Failed to open cache: {}", e))?;
        runner = runner.with_cache(Arc::new(cache));
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        no_cache: args.no_cache,
        jobs: args.jobs,
        verbose,
        sandbox_root: args
            .sandbox
            .unwrap_or_else(|| PathBuf::from(".rosflow/runs")),
    };

    let report = runner
        .execute(&pipeline, &event, &options)
        .await
        .map_err(miette::Report::new)?;

    if !report.success {
        return Err(miette::miette!("Pipeline run failed"));
    }

    Ok(())
}

/// Build the trigger event from the mutually exclusive event flags
fn trigger_event(args: &RunArgs) -> Result<TriggerEvent> {
    if let Some(branch) = &args.branch {
        return Ok(TriggerEvent::Push {
            branch: branch.clone(),
        });
    }

    if let Some(target) = &args.pull_request {
        return Ok(TriggerEvent::PullRequest {
            target: target.clone(),
        });
    }

    if args.dispatch {
        return Ok(TriggerEvent::Dispatch {
            log_level: args.log_level,
            alt_test_tags: args.alt_test_tags,
        });
    }

    Err(miette::miette!(
        "No trigger event given. Use --branch, --pull-request, or --dispatch."
    ))
}
