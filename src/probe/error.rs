use std::time::Duration;

use thiserror::Error;

use super::step::StepName;

/// Category of a probe failure, recorded on each failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
#[cfg_attr(feature = "json", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// Invalid input; no I/O was attempted.
    Configuration,
    /// No seed could be reached or the handshake failed.
    Connectivity,
    /// The store rejected or failed a command.
    Command,
    /// A step exceeded its budget.
    Timeout,
}

/// Failure of a probe step, or of the probe configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// What is wrong.
        message: String,
    },

    /// Connecting to the cluster failed.
    #[error("connectivity error: {source}")]
    Connectivity {
        /// Underlying client error.
        source: crate::Error,
    },

    /// A command step failed.
    #[error("command error: {source}")]
    Command {
        /// Step that issued the command.
        step: StepName,
        /// Underlying client error, carrying the store's error text.
        source: crate::Error,
    },

    /// A step ran out of time.
    #[error("timeout error: {step} exceeded its {}ms budget", .budget.as_millis())]
    Timeout {
        /// Step that timed out.
        step: StepName,
        /// The budget that was exceeded.
        budget: Duration,
    },
}

impl ProbeError {
    /// Category of the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Configuration { .. } => ErrorKind::Configuration,
            ProbeError::Connectivity { .. } => ErrorKind::Connectivity,
            ProbeError::Command { .. } => ErrorKind::Command,
            ProbeError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// Classifies a client error raised while running `step`.
    pub(crate) fn from_step(step: StepName, source: crate::Error) -> Self {
        match step {
            StepName::Connect => ProbeError::Connectivity { source },
            step => ProbeError::Command { step, source },
        }
    }
}
