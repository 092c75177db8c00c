// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Pipeline runner
//!
//! Walks the job graph in dependency order, expands template jobs across
//! the solver matrix, and drives each instantiation through its state
//! machine: Pending → FetchingDependencies → Building → Testing(slot) →
//! Succeeded | Failed. Matrix siblings run concurrently in isolated
//! sandboxes; a sibling's failure never cancels the others. There is no
//! retry logic anywhere; re-running is an operator decision.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio::process::Command;
use tokio::task::JoinSet;

use crate::cache::{hash_key, restore_or_populate, DependencyCache};
use crate::errors::RosflowError;
use crate::ops::{
    write_ignore_marker, CoreHandle, CoreLauncher, Environment, SourceFetcher, TestHarness,
    WorkspaceBuilder,
};
use crate::pipeline::condition::{evaluate, StepDecision};
use crate::pipeline::matrix::{self, Instantiation};
use crate::pipeline::sequencer::{self, SlotReport};
use crate::pipeline::{JobGraph, JobKind, PipelineDefinition, Step, StepBody, TriggerEvent};

/// Pipeline run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Only show the execution plan
    pub dry_run: bool,
    /// Skip cache lookups (producers always run)
    pub no_cache: bool,
    /// Only run specific jobs
    pub jobs: Vec<String>,
    /// Verbose output
    pub verbose: bool,
    /// Root directory for per-instantiation sandboxes
    pub sandbox_root: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            no_cache: false,
            jobs: Vec::new(),
            verbose: false,
            sandbox_root: PathBuf::from(".rosflow/runs"),
        }
    }
}

/// Stage a job instantiation is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Pending,
    FetchingDependencies,
    Building,
    Testing { slot: usize },
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::FetchingDependencies => write!(f, "fetching-dependencies"),
            Self::Building => write!(f, "building"),
            Self::Testing { slot } => write!(f, "testing(slot={})", slot),
        }
    }
}

/// Where a failed instantiation failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedAt {
    Fetch { step: String },
    Build,
    Testing { slot: usize },
    Step { step: String },
}

impl std::fmt::Display for FailedAt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fetch { step } => write!(f, "fetch '{}'", step),
            Self::Build => write!(f, "build"),
            Self::Testing { slot } => write!(f, "testing, slot {}", slot),
            Self::Step { step } => write!(f, "step '{}'", step),
        }
    }
}

/// Terminal status of one instantiation (or a skipped job)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed { at: FailedAt },
    /// Never started: a needed job did not succeed
    Skipped { unmet: Vec<String> },
}

/// Outcome of one executed (or skipped) step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Ok,
    CacheHit,
    Failed { message: String },
    Skipped,
}

/// Per-step record
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub name: String,
    pub action: &'static str,
    pub status: StepStatus,
    pub duration: Duration,
}

/// Externally visible record of one instantiation
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub job_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub slots: Vec<SlotReport>,
    pub duration: Duration,
}

impl RunRecord {
    fn skipped(job_id: &str, unmet: Vec<String>) -> Self {
        Self {
            run_id: job_id.to_string(),
            job_id: job_id.to_string(),
            status: RunStatus::Skipped { unmet },
            steps: Vec::new(),
            slots: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

/// Result of executing a whole pipeline
#[derive(Debug)]
pub struct PipelineReport {
    pub records: Vec<RunRecord>,
    pub duration: Duration,
    pub success: bool,
}

/// Pipeline runner over the five collaborator seams
pub struct PipelineRunner {
    fetcher: Arc<dyn SourceFetcher>,
    builder: Arc<dyn WorkspaceBuilder>,
    harness: Arc<dyn TestHarness>,
    core: Arc<dyn CoreLauncher>,
    cache: Option<Arc<dyn DependencyCache>>,
}

impl PipelineRunner {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        builder: Arc<dyn WorkspaceBuilder>,
        harness: Arc<dyn TestHarness>,
        core: Arc<dyn CoreLauncher>,
    ) -> Self {
        Self {
            fetcher,
            builder,
            harness,
            core,
            cache: None,
        }
    }

    /// Attach a dependency cache
    pub fn with_cache(mut self, cache: Arc<dyn DependencyCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Execute a pipeline for a trigger event
    pub async fn execute(
        &self,
        pipeline: &PipelineDefinition,
        event: &TriggerEvent,
        options: &RunOptions,
    ) -> Result<PipelineReport, RosflowError> {
        let start = Instant::now();

        if !pipeline.triggers.matches(event) {
            return Err(RosflowError::TriggerMismatch);
        }

        let graph = JobGraph::build(pipeline)?;
        let order = graph.topological_order()?;

        let selected: Vec<usize> = if options.jobs.is_empty() {
            order
        } else {
            order
                .into_iter()
                .filter(|&idx| options.jobs.contains(&pipeline.jobs[idx].id))
                .collect()
        };

        self.print_plan(pipeline, &selected, &graph, event, options)?;

        if options.dry_run {
            return Ok(PipelineReport {
                records: Vec::new(),
                duration: start.elapsed(),
                success: true,
            });
        }

        tokio::fs::create_dir_all(&options.sandbox_root).await?;

        let mut records: Vec<RunRecord> = Vec::new();
        let mut job_succeeded: HashMap<String, bool> = HashMap::new();

        for idx in selected {
            let job = &pipeline.jobs[idx];

            let unmet: Vec<String> = job
                .needs
                .iter()
                .filter(|need| !job_succeeded.get(need.as_str()).copied().unwrap_or(false))
                .cloned()
                .collect();

            if !unmet.is_empty() {
                println!(
                    "  {} {} {}",
                    "○".dimmed(),
                    job.id.bold(),
                    format!("(skipped: needs {})", unmet.join(", ")).dimmed()
                );
                job_succeeded.insert(job.id.clone(), false);
                records.push(RunRecord::skipped(&job.id, unmet));
                continue;
            }

            let instantiations = matrix::expand(pipeline, job, event)?;

            // Matrix siblings run concurrently in isolated sandboxes; one
            // element's failure must not cancel the others.
            let mut set = JoinSet::new();
            for inst in instantiations {
                let sandbox = options.sandbox_root.join(inst.sandbox_name());
                let worker = InstantiationWorker {
                    fetcher: Arc::clone(&self.fetcher),
                    builder: Arc::clone(&self.builder),
                    harness: Arc::clone(&self.harness),
                    core: Arc::clone(&self.core),
                    cache: if options.no_cache {
                        None
                    } else {
                        self.cache.clone()
                    },
                };
                set.spawn(async move { worker.run(inst, sandbox).await });
            }

            let mut job_records = Vec::new();
            while let Some(joined) = set.join_next().await {
                let record = joined.map_err(|e| RosflowError::Io {
                    message: format!("instantiation task panicked: {}", e),
                })?;
                job_records.push(record);
            }
            job_records.sort_by(|a, b| a.run_id.cmp(&b.run_id));

            let all_ok = job_records.iter().all(|r| r.succeeded());
            job_succeeded.insert(job.id.clone(), all_ok);
            records.extend(job_records);
        }

        let duration = start.elapsed();
        let success = !records
            .iter()
            .any(|r| matches!(r.status, RunStatus::Failed { .. }));

        self.print_summary(&records, duration, success, options.verbose);

        Ok(PipelineReport {
            records,
            duration,
            success,
        })
    }

    fn print_plan(
        &self,
        pipeline: &PipelineDefinition,
        selected: &[usize],
        graph: &JobGraph,
        event: &TriggerEvent,
        options: &RunOptions,
    ) -> Result<(), RosflowError> {
        println!();
        println!("{}: {}", "Pipeline".bold(), pipeline.name);
        println!("{}", "═".repeat(50));
        println!(
            "Execution plan ({} job{}):",
            selected.len(),
            if selected.len() == 1 { "" } else { "s" }
        );
        println!();

        for (i, &idx) in selected.iter().enumerate() {
            let job = &pipeline.jobs[idx];
            let needs = graph.needs_of(&job.id).unwrap_or_default();

            print!("  {}. {}", i + 1, job.id.bold());

            let solvers = matrix::matrix_values(pipeline, job);
            if !solvers.is_empty() {
                let values: Vec<String> = solvers.iter().map(|s| s.to_string()).collect();
                print!(" {}", format!("× [{}]", values.join(", ")).cyan());
            }

            if !needs.is_empty() {
                print!(" {}", format!("[needs: {}]", needs.join(", ")).dimmed());
            }

            println!();

            if options.verbose {
                let steps = match &job.kind {
                    JobKind::Template { template, .. } => {
                        pipeline.templates.get(template).map(|t| t.steps.as_slice())
                    }
                    JobKind::Inline { steps } => Some(steps.as_slice()),
                };
                for step in steps.unwrap_or_default() {
                    println!(
                        "       {} {} {}",
                        "·".dimmed(),
                        step.name,
                        format!("({})", step.action_name()).dimmed()
                    );
                }
            }
        }

        if event.alt_test_tags() {
            println!();
            println!("  {}", "(alternate test tag set selected)".dimmed());
        }

        println!();

        Ok(())
    }

    fn print_summary(&self, records: &[RunRecord], duration: Duration, success: bool, verbose: bool) {
        println!();
        for record in records {
            match &record.status {
                RunStatus::Succeeded => {
                    println!("  {} {}", "✓".green(), record.run_id.bold());
                    if verbose {
                        Self::print_step_records(record);
                    }
                }
                RunStatus::Failed { at } => {
                    println!("  {} {} {}", "✗".red(), record.run_id.bold(), format!("(failed at {})", at).dimmed());
                    if verbose {
                        Self::print_step_records(record);
                    }
                    for slot in &record.slots {
                        if let Some(target) = &slot.target {
                            let mark = match slot.outcome {
                                sequencer::SlotOutcome::Passed => "✓".green(),
                                sequencer::SlotOutcome::Failed { .. }
                                | sequencer::SlotOutcome::Error { .. } => "✗".red(),
                                _ => "○".dimmed(),
                            };
                            println!("      {} slot {}: {}", mark, slot.slot, target);
                        }
                    }
                }
                RunStatus::Skipped { .. } => {}
            }
        }

        println!();
        if success {
            println!(
                "{}",
                format!("Pipeline completed successfully in {:.2}s", duration.as_secs_f64())
                    .green()
            );
        } else {
            println!(
                "{}",
                format!("Pipeline failed after {:.2}s", duration.as_secs_f64()).red()
            );
        }
    }

    fn print_step_records(record: &RunRecord) {
        for step in &record.steps {
            let (mark, note) = match &step.status {
                StepStatus::Ok => ("✓".green(), ""),
                StepStatus::CacheHit => ("✓".green(), " (cached)"),
                StepStatus::Failed { .. } => ("✗".red(), ""),
                StepStatus::Skipped => ("○".dimmed(), " (skipped)"),
            };
            println!("      {} {}{}", mark, step.name, note.dimmed());
        }
    }

    /// Check the process-backed collaborators are available
    pub async fn check_tools(&self) -> Result<Vec<&'static str>, RosflowError> {
        let mut missing = Vec::new();

        if !self.fetcher.check_available().await? {
            missing.push("git");
        }
        if !self.builder.check_available().await? {
            missing.push("catkin");
        }

        Ok(missing)
    }
}

/// What a single executed step produced
enum StepEffect {
    Done,
    CacheHit,
    TestsFailed { slot: usize },
}

/// One instantiation's worth of collaborator handles, movable into a task
struct InstantiationWorker {
    fetcher: Arc<dyn SourceFetcher>,
    builder: Arc<dyn WorkspaceBuilder>,
    harness: Arc<dyn TestHarness>,
    core: Arc<dyn CoreLauncher>,
    cache: Option<Arc<dyn DependencyCache>>,
}

impl InstantiationWorker {
    /// Drive one instantiation through its state machine
    ///
    /// Collaborator failures become step records and a terminal Failed
    /// status; they are never swallowed and never retried.
    async fn run(&self, inst: Instantiation, sandbox: PathBuf) -> RunRecord {
        let start = Instant::now();
        let mut stage = JobStage::Pending;
        let mut steps: Vec<StepRecord> = Vec::new();
        let mut slots: Vec<SlotReport> = Vec::new();
        let mut failure: Option<FailedAt> = None;
        let mut environment: Option<Environment> = None;
        let mut core_handle: Option<CoreHandle> = None;

        if let Err(e) = tokio::fs::create_dir_all(&sandbox).await {
            return RunRecord {
                run_id: inst.run_id.clone(),
                job_id: inst.job_id.clone(),
                status: RunStatus::Failed {
                    at: FailedAt::Step { step: "sandbox".into() },
                },
                steps: vec![StepRecord {
                    name: "sandbox".into(),
                    action: "sandbox",
                    status: StepStatus::Failed { message: e.to_string() },
                    duration: Duration::ZERO,
                }],
                slots,
                duration: start.elapsed(),
            };
        }

        for step in &inst.steps {
            let decision = evaluate(
                step.guard.as_ref(),
                step.always,
                &inst.params,
                failure.is_some(),
            );

            if decision == StepDecision::Skip {
                steps.push(StepRecord {
                    name: step.name.clone(),
                    action: step.action_name(),
                    status: StepStatus::Skipped,
                    duration: Duration::ZERO,
                });
                continue;
            }

            let step_start = Instant::now();
            let mut env = inst.env.clone();
            env.extend(step.env.clone());

            let effect = self
                .run_step(step, &inst, &sandbox, &env, &mut stage, &mut environment, &mut core_handle, &mut slots)
                .await;

            let duration = step_start.elapsed();

            match effect {
                Ok(StepEffect::Done) => {
                    println!(
                        "  {} {} · {} ({:.2}s)",
                        "✓".green(),
                        inst.run_id,
                        step.name,
                        duration.as_secs_f64()
                    );
                    steps.push(StepRecord {
                        name: step.name.clone(),
                        action: step.action_name(),
                        status: StepStatus::Ok,
                        duration,
                    });
                }
                Ok(StepEffect::CacheHit) => {
                    println!(
                        "  {} {} · {} {}",
                        "✓".green(),
                        inst.run_id,
                        step.name,
                        "(cached)".dimmed()
                    );
                    steps.push(StepRecord {
                        name: step.name.clone(),
                        action: step.action_name(),
                        status: StepStatus::CacheHit,
                        duration,
                    });
                }
                Ok(StepEffect::TestsFailed { slot }) => {
                    println!(
                        "  {} {} · {} {}",
                        "✗".red(),
                        inst.run_id,
                        step.name,
                        format!("(slot {} failed)", slot).dimmed()
                    );
                    steps.push(StepRecord {
                        name: step.name.clone(),
                        action: step.action_name(),
                        status: StepStatus::Failed {
                            message: format!("test slot {} failed", slot),
                        },
                        duration,
                    });
                    if !step.best_effort && failure.is_none() {
                        failure = Some(FailedAt::Testing { slot });
                    }
                }
                Err(e) => {
                    println!("  {} {} · {} failed", "✗".red(), inst.run_id, step.name);
                    steps.push(StepRecord {
                        name: step.name.clone(),
                        action: step.action_name(),
                        status: StepStatus::Failed { message: e.to_string() },
                        duration,
                    });
                    if !step.best_effort && failure.is_none() {
                        failure = Some(match &step.body {
                            StepBody::Fetch { .. } | StepBody::Cache { .. } => {
                                FailedAt::Fetch { step: step.name.clone() }
                            }
                            StepBody::Build { .. } => FailedAt::Build,
                            // a run_tests error here is a precondition failure
                            // (no built environment), not a slot result
                            _ => FailedAt::Step { step: step.name.clone() },
                        });
                    }
                }
            }
        }

        if let Some(handle) = core_handle.take() {
            if let Err(e) = handle.stop().await {
                tracing::warn!(run = %inst.run_id, error = %e, "failed to stop middleware core");
            }
        }

        let status = match failure {
            None => RunStatus::Succeeded,
            Some(at) => RunStatus::Failed { at },
        };

        tracing::debug!(run = %inst.run_id, stage = %stage, ?status, "instantiation finished");

        RunRecord {
            run_id: inst.run_id,
            job_id: inst.job_id,
            status,
            steps,
            slots,
            duration: start.elapsed(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        step: &Step,
        inst: &Instantiation,
        sandbox: &Path,
        env: &HashMap<String, String>,
        stage: &mut JobStage,
        environment: &mut Option<Environment>,
        core_handle: &mut Option<CoreHandle>,
        slots: &mut Vec<SlotReport>,
    ) -> Result<StepEffect, RosflowError> {
        match &step.body {
            StepBody::Cache { key, path, producer } => {
                *stage = JobStage::FetchingDependencies;
                let dest = sandbox.join(path);

                // A changed producer must not restore an artifact built by
                // the old one, so the producer is part of the key.
                let cache_key = format!("{}-{}", key, &hash_key(producer)[..8]);

                match &self.cache {
                    Some(cache) => {
                        let hit = restore_or_populate(cache.as_ref(), &cache_key, &dest, || {
                            run_shell(&step.name, producer, "bash", sandbox, env)
                        })
                        .await?;
                        Ok(if hit { StepEffect::CacheHit } else { StepEffect::Done })
                    }
                    None => {
                        run_shell(&step.name, producer, "bash", sandbox, env).await?;
                        Ok(StepEffect::Done)
                    }
                }
            }

            StepBody::Fetch { repo, reference, dest, submodules } => {
                *stage = JobStage::FetchingDependencies;
                self.fetcher
                    .fetch(repo, reference, &sandbox.join(dest), *submodules)
                    .await?;
                Ok(StepEffect::Done)
            }

            StepBody::Build { root, ignore } => {
                *stage = JobStage::Building;
                let workspace = sandbox.join(root);

                // Exclusions are decided before the builder is invoked; the
                // builder itself never sees robot parameters.
                if let Some(robot) = inst.params.robot {
                    if let Some(packages) = ignore.get(&robot) {
                        for package in packages {
                            write_ignore_marker(&workspace, package).await?;
                        }
                    }
                }

                let built = self.builder.build(&workspace, env).await?;
                *environment = Some(built);
                Ok(StepEffect::Done)
            }

            StepBody::StartCore => {
                let built = environment.as_ref().ok_or_else(|| RosflowError::StepFailed {
                    step: step.name.clone(),
                    message: "no built environment; a build step must precede start_core".into(),
                    help: None,
                })?;
                *core_handle = Some(self.core.start(built).await?);
                Ok(StepEffect::Done)
            }

            StepBody::RunTests => {
                let built = environment.as_ref().ok_or_else(|| RosflowError::StepFailed {
                    step: step.name.clone(),
                    message: "no built environment; a build step must precede run_tests".into(),
                    help: None,
                })?;

                *stage = JobStage::Testing { slot: 1 };
                let reports = sequencer::run_slots(self.harness.as_ref(), built, &inst.slots).await;
                let failed = sequencer::first_failure(&reports);
                *slots = reports;

                match failed {
                    Some(slot) => {
                        *stage = JobStage::Testing { slot };
                        Ok(StepEffect::TestsFailed { slot })
                    }
                    None => Ok(StepEffect::Done),
                }
            }

            StepBody::Shell { run, shell } => {
                run_shell(&step.name, run, shell, sandbox, env).await?;
                Ok(StepEffect::Done)
            }

            StepBody::DebugHold { marker } => {
                let resume = sandbox.join(marker);
                tracing::warn!(
                    run = %inst.run_id,
                    marker = %resume.display(),
                    "job held for debugging; create the marker file to resume"
                );
                // Unbounded on purpose; timeouts belong to the external runner.
                while !resume.exists() {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                let _ = tokio::fs::remove_file(&resume).await;
                Ok(StepEffect::Done)
            }
        }
    }
}

async fn run_shell(
    step_name: &str,
    command: &str,
    shell: &str,
    cwd: &Path,
    env: &HashMap<String, String>,
) -> Result<(), RosflowError> {
    let output = Command::new(shell)
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env)
        .output()
        .await
        .map_err(|e| RosflowError::StepFailed {
            step: step_name.to_string(),
            message: e.to_string(),
            help: Some(format!("Shell '{}' may not be available", shell)),
        })?;

    if output.status.success() {
        Ok(())
    } else {
        Err(RosflowError::StepFailed {
            step: step_name.to_string(),
            message: String::from_utf8_lossy(&output.stderr).to_string(),
            help: None,
        })
    }
}
