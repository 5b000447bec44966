use std::time::Duration;

use super::step::{StepName, StepResult, StepStatus};

/// Aggregate verdict of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum ReportStatus {
    /// connect, ping, cluster_info and write_read all succeeded.
    Ok,
    /// At least one of them failed or was skipped.
    Failed,
}

/// Immutable outcome of one [`ProbeRunner::run`](super::ProbeRunner::run).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct Report {
    status: ReportStatus,
    steps: Vec<StepResult>,
}

impl Report {
    pub(crate) fn new(steps: Vec<StepResult>) -> Self {
        let verdict_ok = StepName::ALL
            .iter()
            .filter(|name| name.is_verdict())
            .all(|name| {
                steps
                    .iter()
                    .any(|s| s.name() == *name && s.status() == StepStatus::Ok)
            });
        let status = if verdict_ok {
            ReportStatus::Ok
        } else {
            ReportStatus::Failed
        };
        Self { status, steps }
    }

    /// Overall verdict. Cleanup never affects it.
    pub fn status(&self) -> ReportStatus {
        self.status
    }

    /// True if the overall verdict is ok.
    pub fn is_ok(&self) -> bool {
        self.status == ReportStatus::Ok
    }

    /// Step results in execution order.
    pub fn steps(&self) -> &[StepResult] {
        &self.steps
    }

    /// Result of a specific step.
    pub fn step(&self, name: StepName) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.name() == name)
    }

    /// Sum of step durations.
    pub fn elapsed(&self) -> Duration {
        self.steps.iter().map(StepResult::duration).sum()
    }
}
