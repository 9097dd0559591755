//! Termination orchestration: delete one victim, then announce it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use havoc_cluster::{ClusterClient, Notifier};
use havoc_core::{Instance, InstanceId};
use havoc_metrics::ChaosMetrics;
use tracing::{info, warn};

/// What happened to a single victim's delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    Terminated,
    /// Dry-run: the delete was logged, not issued.
    Skipped,
    /// Already gone when the delete arrived.
    NotFound,
    Failed(String),
}

impl TerminationOutcome {
    /// Whether the victim should be announced.
    pub fn should_notify(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for TerminationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Terminated => f.write_str("terminated"),
            Self::Skipped => f.write_str("dry-run"),
            Self::NotFound => f.write_str("not found"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Per-victim record in a cycle report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationResult {
    pub instance: InstanceId,
    pub outcome: TerminationOutcome,
    pub notified: bool,
}

/// Issues deletes and notifications for selected victims.
pub struct Terminator {
    cluster: Arc<dyn ClusterClient>,
    notifier: Arc<dyn Notifier>,
    dry_run: bool,
    grace_period: Option<Duration>,
    pub(crate) metrics: Arc<ChaosMetrics>,
}

impl Terminator {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        notifier: Arc<dyn Notifier>,
        dry_run: bool,
        grace_period: Option<Duration>,
    ) -> Self {
        Self {
            cluster,
            notifier,
            dry_run,
            grace_period,
            metrics: Arc::new(ChaosMetrics::new()),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Delete `victim`, or only log it in dry-run mode. Never fails the batch.
    pub async fn terminate(&self, victim: &Instance) -> TerminationOutcome {
        let namespace = victim.namespace.as_str();
        let name = victim.name.as_str();

        if self.dry_run {
            info!(%namespace, %name, "dry run: would terminate instance");
            self.metrics.record_dry_run();
            return TerminationOutcome::Skipped;
        }

        match self
            .cluster
            .delete_instance(namespace, name, self.grace_period)
            .await
        {
            Ok(()) => {
                info!(%namespace, %name, grace_period = ?self.grace_period, "terminated instance");
                self.metrics.record_termination(namespace).await;
                TerminationOutcome::Terminated
            }
            Err(e) if e.is_not_found() => {
                warn!(%namespace, %name, "instance already gone");
                TerminationOutcome::NotFound
            }
            Err(e) => {
                warn!(%namespace, %name, error = %e, "failed to terminate instance");
                self.metrics.record_termination_failure();
                TerminationOutcome::Failed(e.to_string())
            }
        }
    }

    /// Announce `victim`; failures are logged and swallowed.
    pub async fn notify(&self, victim: &Instance) -> bool {
        match self.notifier.notify(victim).await {
            Ok(()) => true,
            Err(e) => {
                warn!(instance = %victim.key(), error = %e, "failed to notify");
                self.metrics.record_notify_failure();
                false
            }
        }
    }
}
