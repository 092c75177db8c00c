// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for rosflow pipeline files: triggers, jobs, the
//! reusable build-and-test template, and the parameter surface it exposes.
//! Definitions are immutable once loaded; everything runtime-varying lives
//! in `matrix::Instantiation`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::errors::RosflowError;

/// Pipeline definition loaded from a YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    /// Definition version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Events that start this pipeline
    #[serde(default, rename = "on")]
    pub triggers: TriggerSet,

    /// Reusable job templates by name
    #[serde(default)]
    pub templates: HashMap<String, ReusableTemplate>,

    /// Jobs in declaration order
    pub jobs: Vec<JobDefinition>,

    /// Global environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Dependency cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_version() -> String {
    "1".to_string()
}

impl PipelineDefinition {
    /// Load a pipeline definition from a YAML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, RosflowError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| RosflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, RosflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize the definition to YAML
    pub fn to_yaml(&self) -> Result<String, RosflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a job by identifier
    pub fn get_job(&self, id: &str) -> Option<&JobDefinition> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Get all job identifiers
    pub fn job_ids(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.id.as_str()).collect()
    }
}

/// Events that can start a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSet {
    /// Branches whose pushes trigger the pipeline
    #[serde(default)]
    pub push: Vec<String>,

    /// Target branches whose pull requests trigger the pipeline
    #[serde(default)]
    pub pull_request: Vec<String>,

    /// Whether manual dispatch is allowed
    #[serde(default)]
    pub dispatch: bool,
}

impl TriggerSet {
    /// Check whether a concrete event matches this trigger set
    pub fn matches(&self, event: &TriggerEvent) -> bool {
        match event {
            TriggerEvent::Push { branch } => self.push.iter().any(|b| b == branch),
            TriggerEvent::PullRequest { target } => {
                self.pull_request.iter().any(|b| b == target)
            }
            TriggerEvent::Dispatch { .. } => self.dispatch,
        }
    }
}

/// A concrete trigger event for one pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    /// Push to a branch
    Push { branch: String },
    /// Pull request targeting a branch
    PullRequest { target: String },
    /// Manual dispatch carrying the two user inputs
    Dispatch {
        log_level: LogLevel,
        alt_test_tags: bool,
    },
}

impl TriggerEvent {
    /// Whether the debug escape hatch is armed for this event
    pub fn debug_enabled(&self) -> bool {
        matches!(
            self,
            TriggerEvent::Dispatch {
                log_level: LogLevel::Debug,
                ..
            }
        )
    }

    /// Whether the alternate test tag set was requested
    pub fn alt_test_tags(&self) -> bool {
        matches!(self, TriggerEvent::Dispatch { alt_test_tags: true, .. })
    }
}

/// Log level selectable on manual dispatch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warning,
    Debug,
}

impl LogLevel {
    /// Map onto a tracing env-filter directive
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Info => "rosflow=info",
            Self::Warning => "rosflow=warn",
            Self::Debug => "rosflow=debug",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "debug" => Ok(Self::Debug),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// A single job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Job identifier (must be unique within the pipeline)
    pub id: String,

    /// Jobs that must succeed before this one runs
    #[serde(default)]
    pub needs: Vec<String>,

    /// Inline steps or a template reference
    #[serde(flatten)]
    pub kind: JobKind,
}

/// The body of a job: either inline steps or a template instantiation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobKind {
    /// Reference to a reusable template plus a parameter binding
    Template {
        template: String,
        with: ParameterBinding,
    },

    /// Inline step list
    Inline { steps: Vec<Step> },
}

/// A parameterized, reusable job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReusableTemplate {
    /// Matrix dimension the template is expanded along
    #[serde(default)]
    pub matrix: MatrixDimension,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

/// The axis along which one job definition becomes several parallel runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixDimension {
    /// QP solver backends to expand across
    #[serde(default = "default_solvers")]
    pub solver: Vec<QpSolver>,
}

impl Default for MatrixDimension {
    fn default() -> Self {
        Self { solver: default_solvers() }
    }
}

fn default_solvers() -> Vec<QpSolver> {
    vec![QpSolver::Qpalm, QpSolver::QpSwift]
}

/// Supported robot configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RobotKind {
    Pr2,
    Hsr,
    Tiago,
    Donbot,
}

impl std::fmt::Display for RobotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pr2 => write!(f, "pr2"),
            Self::Hsr => write!(f, "hsr"),
            Self::Tiago => write!(f, "tiago"),
            Self::Donbot => write!(f, "donbot"),
        }
    }
}

/// Supported QP solver backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum QpSolver {
    #[serde(rename = "qpalm")]
    Qpalm,
    #[serde(rename = "qpSWIFT")]
    QpSwift,
}

impl std::fmt::Display for QpSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Qpalm => write!(f, "qpalm"),
            Self::QpSwift => write!(f, "qpSWIFT"),
        }
    }
}

/// One test-target identifier (e.g. `test/test_integration_pr2.py::TestConstraints`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct TestTarget(pub String);

impl std::fmt::Display for TestTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Concrete parameter values for one template instantiation
///
/// The test list has two accepted spellings: an ordered `tests:` list
/// (preferred), or the numbered `test1:`, `test2:`, ... keys. An empty
/// string marks an absent slot in either spelling; absent slots are skipped
/// by the sequencer without disturbing later indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParameterBinding {
    /// Active robot configuration
    pub robot: Option<RobotKind>,

    /// Ordered test targets (preferred spelling)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,

    /// Alternate test targets selected by the dispatch tag-set input
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tagged_tests: Vec<String>,

    /// Arm the debug escape hatch for this binding
    #[serde(default)]
    pub debug: bool,

    /// Numbered `test<N>` keys (compatibility spelling)
    #[serde(default, flatten)]
    pub numbered: BTreeMap<String, String>,
}

impl ParameterBinding {
    /// Resolve the ordered slot list for this binding
    ///
    /// `alt` selects `tagged_tests` when that list is non-empty. Numbered
    /// keys are ordered by their numeric suffix, not lexically, so `test10`
    /// sorts after `test2`.
    pub fn test_slots(&self, alt: bool) -> Result<Vec<Option<TestTarget>>, RosflowError> {
        let list = if alt && !self.tagged_tests.is_empty() {
            &self.tagged_tests
        } else {
            &self.tests
        };

        if !list.is_empty() {
            return Ok(list.iter().map(|t| slot_from_str(t)).collect());
        }

        let mut numbered: Vec<(usize, &str)> = Vec::with_capacity(self.numbered.len());
        for (key, value) in &self.numbered {
            let index = parse_slot_key(key)?;
            numbered.push((index, value.as_str()));
        }
        numbered.sort_by_key(|(index, _)| *index);

        let mut slots = Vec::new();
        for (index, value) in numbered {
            // Unlisted intermediate numbers are absent slots
            while slots.len() < index - 1 {
                slots.push(None);
            }
            slots.push(slot_from_str(value));
        }

        Ok(slots)
    }

    /// Whether the binding carries at least one present test target
    pub fn has_tests(&self) -> bool {
        self.test_slots(false)
            .map(|slots| slots.iter().any(|s| s.is_some()))
            .unwrap_or(false)
    }
}

fn slot_from_str(value: &str) -> Option<TestTarget> {
    if value.is_empty() {
        None
    } else {
        Some(TestTarget(value.to_string()))
    }
}

fn parse_slot_key(key: &str) -> Result<usize, RosflowError> {
    let index = key
        .strip_prefix("test")
        .and_then(|n| n.parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .ok_or_else(|| RosflowError::InvalidPipeline {
            reason: format!("Unknown parameter '{}' in binding", key),
            help: Some("Bind tests either as a 'tests:' list or as numbered 'test1:', 'test2:', ... keys".to_string()),
        })?;
    Ok(index)
}

/// One step within a job or template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step name
    pub name: String,

    /// Guard predicate; the step is skipped when it doesn't match
    ///
    /// The flattened step body routes every field through serde's content
    /// buffer, which cannot see YAML enum tags, so the map form
    /// (`if: { robot: hsr }`) needs the singleton-map representation.
    #[serde(
        default,
        rename = "if",
        with = "serde_yaml::with::singleton_map_recursive"
    )]
    pub guard: Option<Guard>,

    /// Evaluate this step even after a required-step failure
    #[serde(default)]
    pub always: bool,

    /// Record this step's failure without failing the job
    #[serde(default)]
    pub best_effort: bool,

    /// Extra environment variables for this step
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Step body
    #[serde(flatten)]
    pub body: StepBody,
}

/// What a step actually does
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepBody {
    /// Dependency cache lookup with a fallback producer run on miss
    Cache {
        /// Stable cache key (e.g. `pip`, `qpSWIFT`, `bpb`)
        key: String,
        /// Path the artifact is restored to / produced at, inside the sandbox
        path: PathBuf,
        /// Shell fallback that materializes `path` on a miss
        producer: String,
    },

    /// Materialize a repository tree at a destination
    Fetch {
        repo: String,
        #[serde(rename = "ref")]
        reference: String,
        dest: PathBuf,
        #[serde(default)]
        submodules: bool,
    },

    /// Build the aggregated workspace
    Build {
        /// Workspace root, relative to the sandbox
        root: PathBuf,
        /// Sub-packages to exclude from the build, per robot
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        ignore: HashMap<RobotKind, Vec<String>>,
    },

    /// Start the middleware core in the background
    StartCore,

    /// Run the bound ordered test-slot list
    RunTests,

    /// Arbitrary shell command
    Shell {
        run: String,
        #[serde(default = "default_shell")]
        shell: String,
    },

    /// Suspend the job until a resume marker appears (debug escape hatch)
    DebugHold {
        #[serde(default = "default_resume_marker")]
        marker: PathBuf,
    },
}

fn default_shell() -> String {
    "bash".to_string()
}

fn default_resume_marker() -> PathBuf {
    PathBuf::from(".rosflow-resume")
}

impl Step {
    /// Short action name for display
    pub fn action_name(&self) -> &'static str {
        match &self.body {
            StepBody::Cache { .. } => "cache",
            StepBody::Fetch { .. } => "fetch",
            StepBody::Build { .. } => "build",
            StepBody::StartCore => "start_core",
            StepBody::RunTests => "run_tests",
            StepBody::Shell { .. } => "shell",
            StepBody::DebugHold { .. } => "debug_hold",
        }
    }
}

/// A typed guard predicate over instantiation parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    /// Active robot equals the given kind
    Robot(RobotKind),
    /// Active solver equals the given backend
    Solver(QpSolver),
    /// Debug escape hatch armed (or not)
    Debug(bool),
    /// Negation
    Not(Box<Guard>),
    /// Conjunction
    All(Vec<Guard>),
    /// Disjunction
    Any(Vec<Guard>),
}

/// Dependency cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable the dependency cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache root; defaults to the account-scoped data directory
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
        }
    }
}

fn default_true() -> bool {
    true
}
