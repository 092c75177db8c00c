// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Graph command - visualize the job dependency graph

use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::{JobGraph, PipelineDefinition};

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    if !pipeline_path.exists() {
        return Err(crate::errors::RosflowError::PipelineNotFound { path: pipeline_path }.into());
    }

    let pipeline = PipelineDefinition::from_file(&pipeline_path)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))?;

    let graph = JobGraph::build(&pipeline)?;

    let output = match format {
        GraphFormat::Text => graph.to_text(&pipeline)?,
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
