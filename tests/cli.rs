// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! End-to-end CLI tests against the bundled giskard pipeline

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn rosflow() -> Command {
    let mut cmd = Command::cargo_bin("rosflow").expect("binary builds");
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd
}

#[test]
fn validate_accepts_bundled_pipeline() {
    rosflow()
        .args(["validate", "pipelines/giskard.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid"));
}

#[test]
fn validate_rejects_missing_file() {
    rosflow()
        .args(["validate", "pipelines/no-such.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn validate_rejects_unknown_need() {
    let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
    writeln!(
        file,
        r#"
name: broken
on:
  push: [master]
jobs:
  - id: a
    needs: [ghost]
    steps:
      - name: s
        action: shell
        run: "true"
"#
    )
    .unwrap();

    rosflow()
        .arg("validate")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("ghost"));
}

#[test]
fn graph_text_shows_matrix_fanout() {
    rosflow()
        .args(["graph", "pipelines/giskard.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pr2"))
        .stdout(predicate::str::contains("qpSWIFT"));
}

#[test]
fn graph_mermaid_output() {
    rosflow()
        .args(["graph", "pipelines/giskard.yaml", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph TD"));
}

#[test]
fn dry_run_prints_plan_without_executing() {
    rosflow()
        .args([
            "run",
            "-p",
            "pipelines/giskard.yaml",
            "--branch",
            "master",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution plan"))
        .stdout(predicate::str::contains("summary"));
}

#[test]
fn verbose_dry_run_lists_template_steps() {
    rosflow()
        .args([
            "-v",
            "run",
            "-p",
            "pipelines/giskard.yaml",
            "--branch",
            "master",
            "--dry-run",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch giskardpy"))
        .stdout(predicate::str::contains("run integration tests"));
}

#[test]
fn run_requires_a_trigger_event() {
    rosflow()
        .args(["run", "-p", "pipelines/giskard.yaml", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("trigger"));
}

#[test]
fn run_rejects_unmatched_branch() {
    rosflow()
        .args([
            "run",
            "-p",
            "pipelines/giskard.yaml",
            "--branch",
            "feature/nope",
            "--dry-run",
        ])
        .assert()
        .failure();
}
