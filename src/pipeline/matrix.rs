// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Pipeline matrix expansion
//!
//! Expands a template-referencing job across its matrix dimension into
//! independent instantiations, each with a fully bound, immutable parameter
//! set. Inline jobs expand to exactly one instantiation.

use std::collections::HashMap;

use crate::errors::RosflowError;
use crate::pipeline::condition::BoundParams;
use crate::pipeline::{
    JobDefinition, JobKind, PipelineDefinition, QpSolver, Step, TestTarget, TriggerEvent,
};

/// One concrete run of a job: bound parameters, steps, and slot list
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// Display identifier, e.g. `pr2 (qpSWIFT)`
    pub run_id: String,
    /// Owning job identifier
    pub job_id: String,
    /// Bound parameters, immutable for the lifetime of the run
    pub params: BoundParams,
    /// Ordered test-slot list (absent slots preserved)
    pub slots: Vec<Option<TestTarget>>,
    /// Steps in execution order
    pub steps: Vec<Step>,
    /// Environment exported to every step
    pub env: HashMap<String, String>,
}

impl Instantiation {
    /// Sandbox directory name for this instantiation
    pub fn sandbox_name(&self) -> String {
        match self.params.solver {
            Some(solver) => format!("{}-{}", self.job_id, solver),
            None => self.job_id.clone(),
        }
    }
}

/// Expand one job into its instantiations for a trigger event
///
/// A template job with a matrix of size k yields k instantiations whose
/// bindings are identical except for the solver value. Instantiations are
/// mutually non-interfering; each owns its parameters, steps, and env.
pub fn expand(
    pipeline: &PipelineDefinition,
    job: &JobDefinition,
    event: &TriggerEvent,
) -> Result<Vec<Instantiation>, RosflowError> {
    match &job.kind {
        JobKind::Inline { steps } => {
            let params = BoundParams {
                robot: None,
                solver: None,
                debug: event.debug_enabled(),
            };

            Ok(vec![Instantiation {
                run_id: job.id.clone(),
                job_id: job.id.clone(),
                params,
                slots: Vec::new(),
                steps: steps.clone(),
                env: base_env(pipeline, &params),
            }])
        }

        JobKind::Template { template, with } => {
            let tpl = pipeline.templates.get(template).ok_or_else(|| {
                RosflowError::UnknownTemplate {
                    job: job.id.clone(),
                    template: template.clone(),
                }
            })?;

            let slots = with.test_slots(event.alt_test_tags())?;
            let debug = with.debug || event.debug_enabled();

            let mut runs = Vec::with_capacity(tpl.matrix.solver.len());
            for solver in &tpl.matrix.solver {
                let params = BoundParams {
                    robot: with.robot,
                    solver: Some(*solver),
                    debug,
                };

                runs.push(Instantiation {
                    run_id: format!("{} ({})", job.id, solver),
                    job_id: job.id.clone(),
                    params,
                    slots: slots.clone(),
                    steps: tpl.steps.clone(),
                    env: base_env(pipeline, &params),
                });
            }

            Ok(runs)
        }
    }
}

fn base_env(pipeline: &PipelineDefinition, params: &BoundParams) -> HashMap<String, String> {
    let mut env = pipeline.env.clone();

    if let Some(solver) = params.solver {
        env.insert("QP_SOLVER".to_string(), solver.to_string());
    }
    if let Some(robot) = params.robot {
        env.insert("ROBOT".to_string(), robot.to_string());
    }

    env
}

/// Solver values an expansion would cover, for plan display
pub fn matrix_values(pipeline: &PipelineDefinition, job: &JobDefinition) -> Vec<QpSolver> {
    match &job.kind {
        JobKind::Template { template, .. } => pipeline
            .templates
            .get(template)
            .map(|t| t.matrix.solver.clone())
            .unwrap_or_default(),
        JobKind::Inline { .. } => Vec::new(),
    }
}
