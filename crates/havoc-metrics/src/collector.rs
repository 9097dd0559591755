//! Metrics collector for chaos cycles.
//!
//! Counters are lock-free atomics; per-namespace termination counts sit
//! behind a lock since namespaces are only known at runtime.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::trace;

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub cycles: u64,
    pub cycle_errors: u64,
    /// Namespace → instances terminated there.
    pub terminations: BTreeMap<String, u64>,
    /// Victims only logged because dry-run is on.
    pub dry_runs: u64,
    pub termination_failures: u64,
    pub notify_failures: u64,
    pub interval_seconds: u64,
    pub eligible: u64,
}

/// Shared metrics sink for the engine and the `/metrics` endpoint.
#[derive(Debug, Default)]
pub struct ChaosMetrics {
    cycles: AtomicU64,
    cycle_errors: AtomicU64,
    terminations: RwLock<HashMap<String, u64>>,
    dry_runs: AtomicU64,
    termination_failures: AtomicU64,
    notify_failures: AtomicU64,
    interval_seconds: AtomicU64,
    eligible: AtomicU64,
}

impl ChaosMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished cycle; `failed` when it returned an error.
    pub fn record_cycle(&self, failed: bool) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.cycle_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub async fn record_termination(&self, namespace: &str) {
        let mut terminations = self.terminations.write().await;
        *terminations.entry(namespace.to_string()).or_insert(0) += 1;
        trace!(%namespace, "recorded termination");
    }

    pub fn record_dry_run(&self) {
        self.dry_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_termination_failure(&self) {
        self.termination_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notify_failure(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_interval(&self, interval: Duration) {
        self.interval_seconds.store(interval.as_secs(), Ordering::Relaxed);
    }

    pub fn set_eligible(&self, eligible: usize) {
        self.eligible.store(eligible as u64, Ordering::Relaxed);
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        let terminations = self
            .terminations
            .read()
            .await
            .iter()
            .map(|(ns, count)| (ns.clone(), *count))
            .collect();

        MetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            cycle_errors: self.cycle_errors.load(Ordering::Relaxed),
            terminations,
            dry_runs: self.dry_runs.load(Ordering::Relaxed),
            termination_failures: self.termination_failures.load(Ordering::Relaxed),
            notify_failures: self.notify_failures.load(Ordering::Relaxed),
            interval_seconds: self.interval_seconds.load(Ordering::Relaxed),
            eligible: self.eligible.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counters_accumulate() {
        let metrics = ChaosMetrics::new();
        metrics.record_cycle(false);
        metrics.record_cycle(true);
        metrics.record_termination("default").await;
        metrics.record_termination("default").await;
        metrics.record_termination("testing").await;
        metrics.record_dry_run();
        metrics.record_termination_failure();
        metrics.record_notify_failure();

        let snap = metrics.snapshot().await;
        assert_eq!(snap.cycles, 2);
        assert_eq!(snap.cycle_errors, 1);
        assert_eq!(snap.terminations["default"], 2);
        assert_eq!(snap.terminations["testing"], 1);
        assert_eq!(snap.dry_runs, 1);
        assert_eq!(snap.termination_failures, 1);
        assert_eq!(snap.notify_failures, 1);
    }

    #[tokio::test]
    async fn gauges_overwrite() {
        let metrics = ChaosMetrics::new();
        metrics.set_interval(Duration::from_secs(600));
        metrics.set_eligible(12);
        metrics.set_interval(Duration::from_secs(180));
        metrics.set_eligible(3);

        let snap = metrics.snapshot().await;
        assert_eq!(snap.interval_seconds, 180);
        assert_eq!(snap.eligible, 3);
    }
}
