use std::fmt;
use std::time::Duration;

use super::error::{ErrorKind, ProbeError};

/// One step of the fixed probe sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum StepName {
    /// Open the cluster connection.
    Connect,
    /// `PING`
    Ping,
    /// `CLUSTER INFO`
    ClusterInfo,
    /// `SET` then `GET` of the test key.
    WriteRead,
    /// `DEL` of the test key.
    Cleanup,
}

impl StepName {
    /// All steps in execution order.
    pub const ALL: [StepName; 5] = [
        StepName::Connect,
        StepName::Ping,
        StepName::ClusterInfo,
        StepName::WriteRead,
        StepName::Cleanup,
    ];

    /// Snake-case name used in output.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Connect => "connect",
            StepName::Ping => "ping",
            StepName::ClusterInfo => "cluster_info",
            StepName::WriteRead => "write_read",
            StepName::Cleanup => "cleanup",
        }
    }

    /// Whether the step counts toward the overall verdict.
    pub fn is_verdict(&self) -> bool {
        !matches!(self, StepName::Cleanup)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum StepStatus {
    /// The step ran and succeeded.
    Ok,
    /// The step ran and failed.
    Failed,
    /// The step was not executed.
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StepStatus::Ok => "ok",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        })
    }
}

/// Immutable record of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct StepResult {
    name: StepName,
    status: StepStatus,
    detail: String,
    #[cfg_attr(
        feature = "json",
        serde(rename = "duration_ms", serialize_with = "serialize_millis")
    )]
    duration: Duration,
    #[cfg_attr(feature = "json", serde(skip_serializing_if = "Option::is_none"))]
    error_kind: Option<ErrorKind>,
}

impl StepResult {
    pub(crate) fn ok(name: StepName, detail: impl Into<String>, duration: Duration) -> Self {
        Self {
            name,
            status: StepStatus::Ok,
            detail: detail.into(),
            duration,
            error_kind: None,
        }
    }

    pub(crate) fn failed(name: StepName, error: &ProbeError, duration: Duration) -> Self {
        Self {
            name,
            status: StepStatus::Failed,
            detail: error.to_string(),
            duration,
            error_kind: Some(error.kind()),
        }
    }

    pub(crate) fn skipped(name: StepName, reason: impl Into<String>) -> Self {
        Self {
            name,
            status: StepStatus::Skipped,
            detail: reason.into(),
            duration: Duration::ZERO,
            error_kind: None,
        }
    }

    /// Which step this is.
    pub fn name(&self) -> StepName {
        self.name
    }

    /// Outcome.
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// Short human-readable detail: the value read back, a summary, or the
    /// error text.
    pub fn detail(&self) -> &str {
        &self.detail
    }

    /// Time spent executing the step.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Failure category for failed steps.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error_kind
    }

    /// True if the step ran and succeeded.
    pub fn is_ok(&self) -> bool {
        self.status == StepStatus::Ok
    }
}

#[cfg(feature = "json")]
fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}
