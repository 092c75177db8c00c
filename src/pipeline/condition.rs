// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 rosflow contributors

//! Conditional step evaluation
//!
//! A pure, deterministic decision: given a step's guard, the bound
//! parameters, and whether a required step already failed, decide whether
//! the step runs. `always` is the only escape from the default
//! skip-after-failure policy.

use crate::pipeline::{Guard, QpSolver, RobotKind};

/// Parameters a guard can be evaluated against
///
/// Inline jobs carry no robot/solver binding; robot and solver guards never
/// match there (validation warns about them).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundParams {
    pub robot: Option<RobotKind>,
    pub solver: Option<QpSolver>,
    pub debug: bool,
}

/// Outcome of evaluating a step's guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDecision {
    Run,
    Skip,
}

/// Decide whether a step executes
///
/// Evaluated once per step; `BoundParams` is immutable per instantiation so
/// re-evaluation can never change the answer.
pub fn evaluate(
    guard: Option<&Guard>,
    always: bool,
    params: &BoundParams,
    prior_failure: bool,
) -> StepDecision {
    if prior_failure && !always {
        return StepDecision::Skip;
    }

    match guard {
        Some(g) if !g.matches(params) => StepDecision::Skip,
        _ => StepDecision::Run,
    }
}

impl Guard {
    /// Check this predicate against the bound parameters
    pub fn matches(&self, params: &BoundParams) -> bool {
        match self {
            Guard::Robot(kind) => params.robot == Some(*kind),
            Guard::Solver(solver) => params.solver == Some(*solver),
            Guard::Debug(expected) => params.debug == *expected,
            Guard::Not(inner) => !inner.matches(params),
            Guard::All(guards) => guards.iter().all(|g| g.matches(params)),
            Guard::Any(guards) => guards.iter().any(|g| g.matches(params)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hsr_qpalm() -> BoundParams {
        BoundParams {
            robot: Some(RobotKind::Hsr),
            solver: Some(QpSolver::Qpalm),
            debug: false,
        }
    }

    #[test]
    fn test_robot_guard() {
        let params = hsr_qpalm();

        assert!(Guard::Robot(RobotKind::Hsr).matches(&params));
        assert!(!Guard::Robot(RobotKind::Pr2).matches(&params));
    }

    #[test]
    fn test_composite_guards() {
        let params = hsr_qpalm();

        let both = Guard::All(vec![
            Guard::Robot(RobotKind::Hsr),
            Guard::Solver(QpSolver::Qpalm),
        ]);
        assert!(both.matches(&params));

        let either = Guard::Any(vec![
            Guard::Robot(RobotKind::Pr2),
            Guard::Solver(QpSolver::Qpalm),
        ]);
        assert!(either.matches(&params));

        let negated = Guard::Not(Box::new(Guard::Solver(QpSolver::QpSwift)));
        assert!(negated.matches(&params));
    }

    #[test]
    fn test_guards_never_match_unbound_params() {
        let params = BoundParams::default();

        assert!(!Guard::Robot(RobotKind::Hsr).matches(&params));
        assert!(!Guard::Solver(QpSolver::Qpalm).matches(&params));
        assert!(Guard::Debug(false).matches(&params));
    }

    #[test]
    fn test_skip_after_failure_unless_always() {
        let params = hsr_qpalm();

        assert_eq!(evaluate(None, false, &params, true), StepDecision::Skip);
        assert_eq!(evaluate(None, true, &params, true), StepDecision::Run);
        assert_eq!(evaluate(None, false, &params, false), StepDecision::Run);
    }

    #[test]
    fn test_always_still_respects_guard() {
        let params = hsr_qpalm();
        let guard = Guard::Debug(true);

        // always bypasses the failure policy, not the predicate
        assert_eq!(
            evaluate(Some(&guard), true, &params, true),
            StepDecision::Skip
        );
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let params = hsr_qpalm();
        let guard = Guard::Any(vec![
            Guard::Robot(RobotKind::Hsr),
            Guard::Debug(true),
        ]);

        let first = evaluate(Some(&guard), false, &params, false);
        let second = evaluate(Some(&guard), false, &params, false);
        assert_eq!(first, second);
    }
}
