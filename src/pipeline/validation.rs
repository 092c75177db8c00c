// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Pipeline validation
//!
//! Structural checks run before execution: duplicate job ids, unknown
//! needs and templates, cycles, empty test bindings, and guards that can
//! never match.

use std::collections::HashSet;

use crate::errors::RosflowError;
use crate::pipeline::{
    Guard, JobDefinition, JobGraph, JobKind, PipelineDefinition, Step, StepBody,
};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(pipeline: &PipelineDefinition) -> Result<ValidationResult, RosflowError> {
        let mut result = ValidationResult::new();

        if pipeline.jobs.is_empty() {
            result.add_error("Pipeline has no jobs defined");
        }

        if pipeline.triggers.push.is_empty()
            && pipeline.triggers.pull_request.is_empty()
            && !pipeline.triggers.dispatch
        {
            result.add_warning("Pipeline has no triggers; no event will ever start it");
        }

        let mut seen_ids = HashSet::new();
        for job in &pipeline.jobs {
            if !seen_ids.insert(&job.id) {
                result.add_error(&format!("Duplicate job id: '{}'", job.id));
            }
        }

        match JobGraph::build(pipeline) {
            Ok(_) => {}
            Err(RosflowError::CircularDependency { jobs }) => {
                result.add_error(&format!("Circular dependency: {}", jobs.join(" -> ")));
            }
            Err(RosflowError::UnknownNeed { job, need }) => {
                result.add_error(&format!("Job '{}' needs unknown job '{}'", job, need));
            }
            Err(e) => {
                result.add_error(&format!("Job graph error: {}", e));
            }
        }

        for job in &pipeline.jobs {
            Self::validate_job(job, pipeline, &mut result);
        }

        Ok(result)
    }

    fn validate_job(job: &JobDefinition, pipeline: &PipelineDefinition, result: &mut ValidationResult) {
        match &job.kind {
            JobKind::Template { template, with } => {
                let Some(tpl) = pipeline.templates.get(template) else {
                    result.add_error(&format!(
                        "Job '{}' references unknown template '{}'",
                        job.id, template
                    ));
                    return;
                };

                if tpl.matrix.solver.is_empty() {
                    result.add_error(&format!(
                        "Template '{}' has an empty solver matrix; job '{}' would expand to nothing",
                        template, job.id
                    ));
                }

                if with.robot.is_none() {
                    result.add_error(&format!("Job '{}': binding is missing 'robot'", job.id));
                }

                match with.test_slots(false) {
                    Err(e) => result.add_error(&format!("Job '{}': {}", job.id, e)),
                    Ok(slots) => {
                        if tpl.steps.iter().any(|s| matches!(s.body, StepBody::RunTests))
                            && !slots.iter().any(|s| s.is_some())
                        {
                            result.add_error(&format!(
                                "Job '{}': no test target bound (test1 is required)",
                                job.id
                            ));
                        }
                    }
                }

                for step in &tpl.steps {
                    Self::validate_step(step, &format!("template '{}'", template), result);
                }
            }

            JobKind::Inline { steps } => {
                if steps.is_empty() {
                    result.add_error(&format!("Job '{}' has no steps", job.id));
                }

                for step in steps {
                    Self::validate_step(step, &format!("job '{}'", job.id), result);

                    if let Some(guard) = &step.guard {
                        if guard_mentions_binding(guard) {
                            result.add_warning(&format!(
                                "Job '{}', step '{}': robot/solver guards never match in an inline job",
                                job.id, step.name
                            ));
                        }
                    }
                }
            }
        }
    }

    fn validate_step(step: &Step, context: &str, result: &mut ValidationResult) {
        match &step.body {
            StepBody::Shell { run, .. } if run.is_empty() => {
                result.add_error(&format!("{}, step '{}': shell command is empty", context, step.name));
            }
            StepBody::Cache { producer, .. } if producer.is_empty() => {
                result.add_error(&format!("{}, step '{}': cache producer is empty", context, step.name));
            }
            StepBody::Fetch { repo, reference, .. } => {
                if repo.is_empty() {
                    result.add_error(&format!("{}, step '{}': fetch repo is empty", context, step.name));
                }
                if reference.is_empty() {
                    result.add_error(&format!("{}, step '{}': fetch ref is empty", context, step.name));
                }
            }
            _ => {}
        }

        if step.always && !step.best_effort && matches!(step.body, StepBody::RunTests) {
            result.add_warning(&format!(
                "{}, step '{}': 'always' on a correctness-bearing test step; intended for diagnostics only",
                context, step.name
            ));
        }
    }
}

fn guard_mentions_binding(guard: &Guard) -> bool {
    match guard {
        Guard::Robot(_) | Guard::Solver(_) => true,
        Guard::Debug(_) => false,
        Guard::Not(inner) => guard_mentions_binding(inner),
        Guard::All(guards) | Guard::Any(guards) => guards.iter().any(guard_mentions_binding),
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        let pipeline = PipelineDefinition::from_yaml(yaml).unwrap();
        PipelineValidator::validate(&pipeline).unwrap()
    }

    #[test]
    fn test_valid_pipeline_passes() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
templates:
  t:
    steps:
      - name: fetch
        action: fetch
        repo: https://example.org/r.git
        ref: devel
        dest: ros_ws/src/r
      - name: tests
        action: run_tests
jobs:
  - id: pr2
    template: t
    with:
      robot: pr2
      test1: TestConstraints
"#,
        );

        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn test_empty_jobs_rejected() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
jobs: []
"#,
        );

        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no jobs"));
    }

    #[test]
    fn test_duplicate_job_ids_rejected() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
jobs:
  - id: dup
    steps:
      - name: s
        action: shell
        run: "true"
  - id: dup
    steps:
      - name: s
        action: shell
        run: "true"
"#,
        );

        assert!(result.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[test]
    fn test_missing_test_binding_rejected() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
templates:
  t:
    steps:
      - name: tests
        action: run_tests
jobs:
  - id: pr2
    template: t
    with:
      robot: pr2
"#,
        );

        assert!(result.errors.iter().any(|e| e.contains("test1 is required")));
    }

    #[test]
    fn test_unknown_template_rejected() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
jobs:
  - id: pr2
    template: nope
    with:
      robot: pr2
      test1: T
"#,
        );

        assert!(result.errors.iter().any(|e| e.contains("unknown template")));
    }

    #[test]
    fn test_robot_guard_in_inline_job_warns() {
        let result = validate(
            r#"
name: ci
on:
  push: [master]
jobs:
  - id: summary
    steps:
      - name: s
        if: { robot: hsr }
        action: shell
        run: "true"
"#,
        );

        assert!(result.is_valid());
        assert!(result.has_warnings());
    }

    #[test]
    fn test_no_triggers_warns() {
        let result = validate(
            r#"
name: ci
jobs:
  - id: a
    steps:
      - name: s
        action: shell
        run: "true"
"#,
        );

        assert!(result.warnings.iter().any(|w| w.contains("no triggers")));
    }
}
