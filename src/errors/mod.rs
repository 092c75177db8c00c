// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Error types
//!
//! A single crate-wide error enum with diagnostic codes and help text,
//! covering pipeline loading, graph validation, the external collaborator
//! seams, and the dependency cache.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for rosflow operations
pub type RosflowResult<T> = Result<T, RosflowError>;

/// Main error type for rosflow
#[derive(Error, Debug, Diagnostic)]
pub enum RosflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(rosflow::pipeline_not_found),
        help("Point rosflow at a pipeline definition with '-p <file>'")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(rosflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(rosflow::circular_dependency),
        help("Review the 'needs' lists of your jobs to remove the cycle")
    )]
    CircularDependency { jobs: Vec<String> },

    #[error("Job '{job}' needs unknown job '{need}'")]
    #[diagnostic(
        code(rosflow::unknown_need),
        help("Check that '{need}' is defined in your pipeline")
    )]
    UnknownNeed { job: String, need: String },

    #[error("Job '{job}' references unknown template '{template}'")]
    #[diagnostic(
        code(rosflow::unknown_template),
        help("Define '{template}' under 'templates' or correct the reference")
    )]
    UnknownTemplate { job: String, template: String },

    #[error("Trigger event does not match the pipeline's trigger set")]
    #[diagnostic(
        code(rosflow::trigger_mismatch),
        help("The pipeline's 'on' section lists the branches and events that start it")
    )]
    TriggerMismatch,

    // ─────────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Fetch of '{repo}' at '{reference}' failed: {message}")]
    #[diagnostic(code(rosflow::fetch_failed))]
    Fetch {
        repo: String,
        reference: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Workspace build failed")]
    #[diagnostic(code(rosflow::build_failed))]
    Build {
        stderr: String,
        #[help]
        help: Option<String>,
    },

    #[error("Test harness failed to run '{target}': {message}")]
    #[diagnostic(code(rosflow::harness_failed))]
    Harness { target: String, message: String },

    #[error("Middleware core failed to start: {message}")]
    #[diagnostic(code(rosflow::core_failed))]
    Core { message: String },

    #[error("Tool '{tool}' not found")]
    #[diagnostic(code(rosflow::tool_not_found), help("{suggestion}"))]
    ToolNotFound { tool: String, suggestion: String },

    #[error("Step '{step}' failed: {message}")]
    #[diagnostic(code(rosflow::step_failed))]
    StepFailed {
        step: String,
        message: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Cache Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cache error: {message}")]
    #[diagnostic(code(rosflow::cache_error))]
    CacheError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File/IO Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(rosflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(rosflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(rosflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(rosflow::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for RosflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for RosflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for RosflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl RosflowError {
    /// Create a tool not found error with an installation suggestion
    pub fn tool_not_found(tool: &str) -> Self {
        let suggestion = match tool {
            "git" => "Install git and ensure it's in your PATH".to_string(),
            "catkin" => "Install catkin-tools: pip3 install catkin-tools".to_string(),
            "roscore" => "Source a ROS distribution before running rosflow".to_string(),
            _ => format!("Install {} and ensure it's in your PATH", tool),
        };

        Self::ToolNotFound {
            tool: tool.to_string(),
            suggestion,
        }
    }

    /// Create a fetch error with context from git output
    pub fn fetch_failed(repo: &str, reference: &str, stderr: String) -> Self {
        let help = if stderr.contains("not found") || stderr.contains("does not exist") {
            Some("The repository may be private or the URL misspelled.".to_string())
        } else if stderr.contains("couldn't find remote ref") {
            Some(
                "The pinned ref no longer exists upstream. Update the pin in the pipeline file."
                    .to_string(),
            )
        } else {
            None
        };

        Self::Fetch {
            repo: repo.to_string(),
            reference: reference.to_string(),
            message: stderr,
            help,
        }
    }

    /// Create a build error with context from build tool output
    pub fn build_failed(stderr: String) -> Self {
        let help = if stderr.contains("Unable to find source space") {
            Some("The workspace has no src/ directory. Check the fetch step destinations.".to_string())
        } else if stderr.contains("CMake Error") {
            Some(
                "A sub-package failed to configure. The build is all-or-nothing; \
                 fix the package or exclude it for this robot."
                    .to_string(),
            )
        } else {
            None
        };

        Self::Build { stderr, help }
    }
}
