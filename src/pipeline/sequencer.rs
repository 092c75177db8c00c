// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Test runner sequencer
//!
//! Evaluates the ordered test-slot list strictly in order against one built
//! environment. An absent slot is skipped without disturbing later indices;
//! a failing slot aborts the remainder. The output preserves slot identity
//! so reporting can show exactly which targets ran before a failure.

use std::time::{Duration, Instant};

use crate::ops::{Environment, TestHarness};
use crate::pipeline::TestTarget;

/// Outcome of one slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Slot was present and its process exited zero
    Passed,
    /// Slot was present and its process exited non-zero
    Failed { exit_code: i32 },
    /// Slot was present but its process could not be launched
    Error { message: String },
    /// Slot had no binding (empty sentinel)
    Absent,
    /// Slot was never reached because an earlier slot failed
    NotAttempted,
}

/// Per-slot report entry
#[derive(Debug, Clone)]
pub struct SlotReport {
    /// 1-based slot index
    pub slot: usize,
    /// Bound target, if the slot was present
    pub target: Option<TestTarget>,
    pub outcome: SlotOutcome,
    pub duration: Duration,
}

/// Run the ordered slot list against a built environment
///
/// Each present slot runs as an independent process. The returned list has
/// one entry per slot, in slot order, regardless of where execution stopped.
/// A harness launch failure is recorded as that slot's outcome rather than
/// propagated, so earlier results are never lost.
pub async fn run_slots(
    harness: &dyn TestHarness,
    environment: &Environment,
    slots: &[Option<TestTarget>],
) -> Vec<SlotReport> {
    let mut reports = Vec::with_capacity(slots.len());
    let mut aborted = false;

    for (index, slot) in slots.iter().enumerate() {
        let slot_number = index + 1;

        let Some(target) = slot else {
            reports.push(SlotReport {
                slot: slot_number,
                target: None,
                outcome: SlotOutcome::Absent,
                duration: Duration::ZERO,
            });
            continue;
        };

        if aborted {
            reports.push(SlotReport {
                slot: slot_number,
                target: Some(target.clone()),
                outcome: SlotOutcome::NotAttempted,
                duration: Duration::ZERO,
            });
            continue;
        }

        let started = Instant::now();
        let (outcome, duration) = match harness.run(environment, target).await {
            Ok(run) if run.passed() => (SlotOutcome::Passed, run.duration),
            Ok(run) => {
                aborted = true;
                (SlotOutcome::Failed { exit_code: run.exit_code }, run.duration)
            }
            Err(e) => {
                aborted = true;
                (SlotOutcome::Error { message: e.to_string() }, started.elapsed())
            }
        };

        reports.push(SlotReport {
            slot: slot_number,
            target: Some(target.clone()),
            outcome,
            duration,
        });
    }

    reports
}

/// First failed slot in a report list, if any
pub fn first_failure(reports: &[SlotReport]) -> Option<usize> {
    reports
        .iter()
        .find(|r| {
            matches!(
                r.outcome,
                SlotOutcome::Failed { .. } | SlotOutcome::Error { .. }
            )
        })
        .map(|r| r.slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RosflowError;
    use crate::ops::TestRun;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Harness double: fails or refuses the listed targets, records order
    struct FakeHarness {
        failing: Vec<&'static str>,
        erroring: Vec<&'static str>,
        invoked: Mutex<Vec<String>>,
    }

    impl FakeHarness {
        fn passing() -> Self {
            Self::failing(vec![])
        }

        fn failing(targets: Vec<&'static str>) -> Self {
            Self {
                failing: targets,
                erroring: vec![],
                invoked: Mutex::new(Vec::new()),
            }
        }

        fn erroring(targets: Vec<&'static str>) -> Self {
            Self {
                failing: vec![],
                erroring: targets,
                invoked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TestHarness for FakeHarness {
        async fn run(
            &self,
            _environment: &Environment,
            target: &TestTarget,
        ) -> Result<TestRun, RosflowError> {
            self.invoked.lock().unwrap().push(target.0.clone());

            if self.erroring.iter().any(|f| *f == target.0) {
                return Err(RosflowError::Harness {
                    target: target.0.clone(),
                    message: "failed to spawn".into(),
                });
            }

            let exit_code = if self.failing.iter().any(|f| *f == target.0) {
                1
            } else {
                0
            };

            Ok(TestRun {
                target: target.clone(),
                exit_code,
                duration: Duration::from_millis(1),
                stderr: String::new(),
            })
        }
    }

    fn env() -> Environment {
        Environment {
            root: std::path::PathBuf::from("."),
            env: HashMap::new(),
        }
    }

    fn present(name: &str) -> Option<TestTarget> {
        Some(TestTarget(name.to_string()))
    }

    #[tokio::test]
    async fn test_all_slots_pass_in_order() {
        // robot=pr2, solver=qpalm scenario: three targets, all green
        let harness = FakeHarness::passing();
        let slots = vec![
            present("TestConstraints"),
            present("TestCartGoals"),
            present("TestWorldManipulation"),
        ];

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.outcome == SlotOutcome::Passed));
        assert_eq!(
            *harness.invoked.lock().unwrap(),
            vec!["TestConstraints", "TestCartGoals", "TestWorldManipulation"]
        );
        assert!(first_failure(&reports).is_none());
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining_slots() {
        // robot=tiago scenario: slot 1 fails, slots 2..4 never attempted
        let harness = FakeHarness::failing(vec!["TestConstraints"]);
        let slots = vec![
            present("TestConstraints"),
            present("TestCartGoals"),
            present("TestJointGoals"),
            present("TestWorldManipulation"),
        ];

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports[0].outcome, SlotOutcome::Failed { exit_code: 1 });
        for report in &reports[1..] {
            assert_eq!(report.outcome, SlotOutcome::NotAttempted);
        }
        assert_eq!(harness.invoked.lock().unwrap().len(), 1);
        assert_eq!(first_failure(&reports), Some(1));
    }

    #[tokio::test]
    async fn test_absent_slot_does_not_corrupt_indices() {
        let harness = FakeHarness::passing();
        let slots = vec![present("a"), None, present("c")];

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports[0].outcome, SlotOutcome::Passed);
        assert_eq!(reports[1].outcome, SlotOutcome::Absent);
        assert_eq!(reports[1].slot, 2);
        // slot 3 still attempted
        assert_eq!(reports[2].outcome, SlotOutcome::Passed);
        assert_eq!(reports[2].slot, 3);
    }

    #[tokio::test]
    async fn test_absent_slots_after_failure_stay_absent() {
        let harness = FakeHarness::failing(vec!["a"]);
        let slots = vec![present("a"), None, present("c")];

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports[1].outcome, SlotOutcome::Absent);
        assert_eq!(reports[2].outcome, SlotOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn test_sequencing_is_deterministic() {
        let slots = vec![present("a"), None, present("c")];

        let first = run_slots(&FakeHarness::passing(), &env(), &slots).await;
        let second = run_slots(&FakeHarness::passing(), &env(), &slots).await;

        let outcomes: Vec<_> = first.iter().map(|r| r.outcome.clone()).collect();
        let outcomes2: Vec<_> = second.iter().map(|r| r.outcome.clone()).collect();
        assert_eq!(outcomes, outcomes2);
    }

    #[tokio::test]
    async fn test_launch_error_keeps_prior_slot_results() {
        // slot 1 passes, then the harness cannot even start slot 2;
        // the passed slot must stay in the report
        let harness = FakeHarness::erroring(vec!["TestCartGoals"]);
        let slots = vec![
            present("TestConstraints"),
            present("TestCartGoals"),
            present("TestJointGoals"),
        ];

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].outcome, SlotOutcome::Passed);
        assert!(matches!(reports[1].outcome, SlotOutcome::Error { .. }));
        assert_eq!(reports[2].outcome, SlotOutcome::NotAttempted);
        assert_eq!(first_failure(&reports), Some(2));
    }

    #[tokio::test]
    async fn test_no_ceiling_on_slot_count() {
        let harness = FakeHarness::passing();
        let names: Vec<String> = (1..=25).map(|i| format!("t{}", i)).collect();
        let slots: Vec<Option<TestTarget>> =
            names.iter().map(|n| present(n)).collect();

        let reports = run_slots(&harness, &env(), &slots).await;

        assert_eq!(reports.len(), 25);
        assert!(reports.iter().all(|r| r.outcome == SlotOutcome::Passed));
    }
}
