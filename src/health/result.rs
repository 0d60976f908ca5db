// src/health/result.rs
use crate::probe::{ProbeKind, ProbeSpec};
use std::time::Duration;

/// What happened to one launched probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub kind: ProbeKind,
    pub identifier: String,
    pub succeeded: bool,
    /// Aborted because a sibling failed first. Never part of the failure list.
    pub cancelled: bool,
    pub message: Option<String>,
}

impl ProbeOutcome {
    pub fn passed(spec: &ProbeSpec) -> Self {
        Self {
            kind: spec.kind(),
            identifier: spec.identifier(),
            succeeded: true,
            cancelled: false,
            message: None,
        }
    }

    pub fn failed(spec: &ProbeSpec, message: String) -> Self {
        Self {
            kind: spec.kind(),
            identifier: spec.identifier(),
            succeeded: false,
            cancelled: false,
            message: Some(message),
        }
    }

    pub fn cancelled(spec: &ProbeSpec) -> Self {
        Self {
            kind: spec.kind(),
            identifier: spec.identifier(),
            succeeded: false,
            cancelled: true,
            message: Some("cancelled after a sibling probe failed".to_string()),
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.succeeded, self.cancelled) {
            (true, _) => "passed",
            (false, true) => "cancelled",
            (false, false) => "failed",
        }
    }
}

/// Aggregate outcome of one check pass.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub succeeded: bool,
    pub elapsed: Duration,
    pub outcomes: Vec<ProbeOutcome>,
    /// Failure messages in the order they were recorded.
    pub failures: Vec<String>,
}

impl CheckResult {
    pub fn new(outcomes: Vec<ProbeOutcome>, failures: Vec<String>, elapsed: Duration) -> Self {
        Self {
            succeeded: failures.is_empty(),
            elapsed,
            outcomes,
            failures,
        }
    }

    /// A pass that never produced probe outcomes.
    pub fn aborted(message: String) -> Self {
        Self::new(Vec::new(), vec![message], Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_follows_failure_list() {
        let spec = ProbeSpec::Tcp {
            address: "8080".to_string(),
        };

        let ok = CheckResult::new(vec![ProbeOutcome::passed(&spec)], vec![], Duration::from_millis(3));
        assert!(ok.succeeded);

        let failed = CheckResult::new(
            vec![ProbeOutcome::failed(&spec, "boom".to_string())],
            vec!["boom".to_string()],
            Duration::from_millis(3),
        );
        assert!(!failed.succeeded);

        let aborted = CheckResult::aborted("gone".to_string());
        assert!(!aborted.succeeded);
        assert_eq!(aborted.failures, vec!["gone"]);
    }

    #[test]
    fn test_outcome_labels() {
        let spec = ProbeSpec::Tcp {
            address: "8080".to_string(),
        };
        assert_eq!(ProbeOutcome::passed(&spec).label(), "passed");
        assert_eq!(ProbeOutcome::failed(&spec, "x".into()).label(), "failed");
        assert_eq!(ProbeOutcome::cancelled(&spec).label(), "cancelled");
    }
}
