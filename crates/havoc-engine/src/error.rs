//! Engine and configuration errors.

use havoc_cluster::ClusterError;
use havoc_core::{DurationError, InstanceId, SelectorError};
use havoc_pacing::PolicyError;
use thiserror::Error;

use crate::engine::CycleReport;

pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal at startup: the configuration cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid selector in {field}: {source}")]
    Selector {
        field: &'static str,
        source: SelectorError,
    },

    #[error("invalid pattern in {field}: {source}")]
    Pattern {
        field: &'static str,
        source: regex::Error,
    },

    #[error("invalid duration in {field}: {source}")]
    Duration {
        field: &'static str,
        source: DurationError,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Why a cycle did not complete cleanly.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Listing failed; the cycle is abandoned and retried on the next tick.
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    /// Shutdown was requested. `report` is set when it arrived between
    /// victims and holds the ones already processed.
    #[error("cycle cancelled")]
    Cancelled { report: Option<Box<CycleReport>> },

    /// Deletes that failed for reasons other than the target being gone.
    /// The whole batch ran; `report` has every victim's result.
    #[error("{} termination(s) failed", .failures.len())]
    Termination {
        failures: Vec<(InstanceId, String)>,
        report: Box<CycleReport>,
    },
}

impl EngineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// What the cycle did before it failed, if it got as far as terminating.
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            Self::Cancelled { report } => report.as_deref(),
            Self::Termination { report, .. } => Some(report),
            Self::Cluster(_) => None,
        }
    }
}
