// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Validate command - check the pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{JobKind, PipelineDefinition, PipelineValidator};
use crate::utils::{print_bullet, print_error, print_section, print_success, print_warning};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    if !pipeline_path.exists() {
        return Err(crate::errors::RosflowError::PipelineNotFound { path: pipeline_path }.into());
    }

    let pipeline = match PipelineDefinition::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            print_error("Failed to parse pipeline");
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };

    print_success("Pipeline file is valid YAML");

    let validation = PipelineValidator::validate(&pipeline)?;

    if !validation.errors.is_empty() {
        print_section("Errors");
        for error in &validation.errors {
            print_error(error);
        }
    }

    if !validation.warnings.is_empty() {
        print_section("Warnings");
        for warning in &validation.warnings {
            print_warning(warning);
        }
    }

    if verbose {
        print_section("Pipeline summary");
        println!("  Name: {}", pipeline.name);
        println!("  Templates: {}", pipeline.templates.len());
        println!("  Jobs: {}", pipeline.jobs.len());
        for job in &pipeline.jobs {
            let kind = match &job.kind {
                JobKind::Template { template, .. } => format!("template '{}'", template),
                JobKind::Inline { steps } => format!("{} inline steps", steps.len()),
            };
            let deps = if job.needs.is_empty() {
                String::new()
            } else {
                format!(" (needs: {})", job.needs.join(", "))
            };
            print_bullet(&format!("{}: {}{}", job.id, kind, deps));
        }
    }

    println!();

    if validation.is_valid() {
        println!("{}", "Pipeline is valid.".green().bold());
        Ok(())
    } else {
        Err(miette::miette!(
            "Pipeline has {} error(s)",
            validation.errors.len()
        ))
    }
}
