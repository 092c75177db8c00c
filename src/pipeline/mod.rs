// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Pipeline model and execution
//!
//! The pipeline definition is a YAML document describing templates, jobs
//! and triggers. Jobs form a dependency graph; template jobs fan out
//! across the solver matrix into concurrent instantiations, each of
//! which walks its steps through the run state machine.

pub mod condition;
pub mod dag;
pub mod definition;
pub mod matrix;
pub mod run;
pub mod sequencer;
pub mod validation;

pub use condition::{BoundParams, StepDecision};
pub use dag::JobGraph;
pub use definition::{
    CacheConfig, Guard, JobDefinition, JobKind, LogLevel, MatrixDimension, ParameterBinding,
    PipelineDefinition, QpSolver, ReusableTemplate, RobotKind, Step, StepBody, TestTarget,
    TriggerEvent, TriggerSet,
};
pub use matrix::Instantiation;
pub use run::{
    FailedAt, JobStage, PipelineReport, PipelineRunner, RunOptions, RunRecord, RunStatus,
    StepRecord, StepStatus,
};
pub use sequencer::{SlotOutcome, SlotReport};
pub use validation::{PipelineValidator, ValidationResult};
