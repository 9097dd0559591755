//! The chaos loop.
//!
//! One task drives cycles strictly one after another:
//!
//! ```text
//! Idle → Listing → Filtering ─┬─ Empty ─────────────────────────────→ Idle
//!                             └─ Deduping → Selecting → Terminating ⇄ Notifying → Idle
//! ```
//!
//! The shutdown signal is checked at every stage boundary and between
//! victims. A delete that is already in flight is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use havoc_cluster::{ClusterClient, Notifier};
use havoc_core::{Instance, InstanceId, NamespaceIndex};
use havoc_metrics::ChaosMetrics;
use havoc_select::{CandidateSet, dedupe_by_owner, eligible, filter, select_victims};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::Configuration;
use crate::error::{EngineError, EngineResult};
use crate::terminator::{TerminationOutcome, TerminationResult, Terminator};

/// Source of "now"; swapped for a fixed clock in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Listing,
    Filtering,
    Empty,
    Deduping,
    Selecting,
    Terminating,
    Notifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was eligible; not an error.
    NoVictim,
    Completed,
    /// Shutdown arrived between victims; the rest were skipped.
    Interrupted,
}

/// What one cycle saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub listed: usize,
    pub candidates: usize,
    pub outcome: CycleOutcome,
    /// One entry per victim, in selection order.
    pub results: Vec<TerminationResult>,
}

impl CycleReport {
    fn no_victim(listed: usize) -> Self {
        Self {
            listed,
            candidates: 0,
            outcome: CycleOutcome::NoVictim,
            results: Vec::new(),
        }
    }

    pub fn victims(&self) -> Vec<&InstanceId> {
        self.results.iter().map(|r| &r.instance).collect()
    }

    pub fn failures(&self) -> Vec<(InstanceId, String)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                TerminationOutcome::Failed(reason) => Some((r.instance.clone(), reason.clone())),
                _ => None,
            })
            .collect()
    }
}

fn check_cancelled(shutdown: &watch::Receiver<bool>) -> EngineResult<()> {
    if *shutdown.borrow() {
        return Err(EngineError::Cancelled { report: None });
    }
    Ok(())
}

/// Owns the configuration, collaborators, and random source of one loop.
pub struct ChaosEngine {
    config: Configuration,
    cluster: Arc<dyn ClusterClient>,
    terminator: Terminator,
    rng: StdRng,
    clock: Clock,
    metrics: Arc<ChaosMetrics>,
    phase: CyclePhase,
}

impl ChaosEngine {
    pub fn new(
        config: Configuration,
        cluster: Arc<dyn ClusterClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let terminator = Terminator::new(
            cluster.clone(),
            notifier,
            config.dry_run,
            config.grace_period,
        );
        let metrics = terminator.metrics.clone();
        Self {
            config,
            cluster,
            terminator,
            rng: StdRng::from_entropy(),
            clock: Arc::new(Utc::now),
            metrics,
            phase: CyclePhase::Idle,
        }
    }

    /// Fix the random source so cycles are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ChaosMetrics>) -> Self {
        self.terminator.metrics = metrics.clone();
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn metrics(&self) -> Arc<ChaosMetrics> {
        self.metrics.clone()
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    fn enter(&mut self, phase: CyclePhase) {
        trace!(from = ?self.phase, to = ?phase, "cycle phase");
        self.phase = phase;
    }

    async fn snapshot(&self) -> EngineResult<(Vec<Instance>, NamespaceIndex)> {
        let instances = self
            .cluster
            .list_instances(self.config.namespace_scope.as_deref())
            .await?;
        let namespaces = if self.config.criteria.needs_namespace_labels() {
            self.cluster.list_namespaces().await?
        } else {
            NamespaceIndex::new()
        };
        Ok((instances, namespaces))
    }

    /// Everything that may be terminated right now, blackout gate included.
    pub async fn candidates(&self, now: DateTime<Utc>) -> EngineResult<CandidateSet> {
        let (instances, namespaces) = self.snapshot().await?;
        Ok(filter(
            instances,
            &self.config.criteria,
            &self.config.policy,
            &namespaces,
            now,
        ))
    }

    /// Size of the pool for pacing, ignoring blackout windows.
    pub async fn eligible_count(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let (instances, namespaces) = self.snapshot().await?;
        Ok(eligible(instances, &self.config.criteria, &namespaces, now).len())
    }

    /// Run one list → filter → select → terminate pass.
    pub async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> EngineResult<CycleReport> {
        let result = self.cycle(shutdown).await;
        self.enter(CyclePhase::Idle);
        match &result {
            Err(e) if e.is_cancelled() => {}
            Err(_) => self.metrics.record_cycle(true),
            Ok(_) => self.metrics.record_cycle(false),
        }
        result
    }

    async fn cycle(&mut self, shutdown: &watch::Receiver<bool>) -> EngineResult<CycleReport> {
        check_cancelled(shutdown)?;
        self.enter(CyclePhase::Listing);
        let now = (self.clock)();
        let (instances, namespaces) = self.snapshot().await?;
        let listed = instances.len();

        check_cancelled(shutdown)?;
        self.enter(CyclePhase::Filtering);
        let candidates = filter(
            instances,
            &self.config.criteria,
            &self.config.policy,
            &namespaces,
            now,
        );

        if candidates.is_empty() {
            self.enter(CyclePhase::Empty);
            debug!(listed, "no victim this cycle");
            return Ok(CycleReport::no_victim(listed));
        }
        let candidate_count = candidates.len();

        check_cancelled(shutdown)?;
        self.enter(CyclePhase::Deduping);
        let deduped = dedupe_by_owner(candidates.into_vec(), &mut self.rng);

        self.enter(CyclePhase::Selecting);
        let victims = match select_victims(&deduped, self.config.max_kill, &mut self.rng) {
            Ok(victims) => victims,
            Err(e) => {
                debug!(reason = %e, "no victim this cycle");
                return Ok(CycleReport::no_victim(listed));
            }
        };
        info!(
            listed,
            candidates = candidate_count,
            victims = victims.len(),
            dry_run = self.terminator.is_dry_run(),
            "selected victims"
        );

        let mut report = CycleReport {
            listed,
            candidates: candidate_count,
            outcome: CycleOutcome::Completed,
            results: Vec::with_capacity(victims.len()),
        };
        for victim in &victims {
            if *shutdown.borrow() {
                info!(
                    processed = report.results.len(),
                    skipped = victims.len() - report.results.len(),
                    "shutdown between victims"
                );
                report.outcome = CycleOutcome::Interrupted;
                return Err(EngineError::Cancelled {
                    report: Some(Box::new(report)),
                });
            }
            self.enter(CyclePhase::Terminating);
            let outcome = self.terminator.terminate(victim).await;

            self.enter(CyclePhase::Notifying);
            let notified = outcome.should_notify() && self.terminator.notify(victim).await;
            report.results.push(TerminationResult {
                instance: victim.id(),
                outcome,
                notified,
            });
        }

        let failures = report.failures();
        if !failures.is_empty() {
            return Err(EngineError::Termination {
                failures,
                report: Box::new(report),
            });
        }
        Ok(report)
    }

    /// The wait before the next cycle.
    ///
    /// Lists the cluster only when the dynamic interval is enabled.
    pub async fn calculate_next_interval(
        &mut self,
        shutdown: &watch::Receiver<bool>,
    ) -> EngineResult<Duration> {
        check_cancelled(shutdown)?;
        let interval = if self.config.interval.is_dynamic() {
            let count = self.eligible_count((self.clock)()).await?;
            self.metrics.set_eligible(count);
            self.config.interval.next_interval(count)
        } else {
            self.config.interval.base()
        };
        self.metrics.set_interval(interval);
        Ok(interval)
    }

    /// Drive cycles until shutdown or `max_runtime` elapses.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let started = Instant::now();
        info!(
            dry_run = self.config.dry_run,
            max_kill = self.config.max_kill,
            dynamic_interval = self.config.interval.is_dynamic(),
            "chaos loop started"
        );

        loop {
            match self.run_cycle(&shutdown).await {
                Ok(report) => debug!(
                    outcome = ?report.outcome,
                    victims = report.results.len(),
                    "cycle finished"
                ),
                Err(e) if e.is_cancelled() => break,
                Err(e) => error!(
                    error = %e,
                    victims = e.report().map_or(0, |r| r.results.len()),
                    "cycle failed"
                ),
            }

            let mut interval = match self.calculate_next_interval(&shutdown).await {
                Ok(interval) => interval,
                Err(e) if e.is_cancelled() => break,
                Err(e) => {
                    warn!(error = %e, "interval calculation failed, using base interval");
                    self.config.interval.base()
                }
            };

            if let Some(max) = self.config.max_runtime {
                let elapsed = started.elapsed();
                if elapsed >= max {
                    info!(elapsed_secs = elapsed.as_secs(), "max runtime reached");
                    break;
                }
                interval = interval.min(max - elapsed);
            }

            debug!(interval_secs = interval.as_secs(), "sleeping until next cycle");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    info!("chaos loop shutting down");
                    break;
                }
            }
        }

        info!("chaos loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use havoc_cluster::{MemoryCluster, NoopNotifier};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 24, 15, 4, 5).unwrap()
    }

    async fn engine(config: Configuration, names: &[&str]) -> ChaosEngine {
        let cluster = Arc::new(MemoryCluster::new());
        for name in names {
            cluster
                .insert_instance(Instance::new("default", name, now() - chrono::TimeDelta::days(1)))
                .await;
        }
        ChaosEngine::new(config, cluster, Arc::new(NoopNotifier::new()))
            .with_seed(3)
            .with_clock(Arc::new(now))
    }

    #[tokio::test]
    async fn phase_returns_to_idle() {
        let (_tx, rx) = watch::channel(false);
        let mut engine = engine(Configuration::default(), &["foo"]).await;
        let report = engine.run_cycle(&rx).await.unwrap();
        assert_eq!(report.outcome, CycleOutcome::Completed);
        assert_eq!(engine.phase(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn cancelled_before_listing() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let mut engine = engine(Configuration::default(), &["foo"]).await;
        assert!(matches!(
            engine.run_cycle(&rx).await,
            Err(EngineError::Cancelled { report: None })
        ));
        assert!(matches!(
            engine.calculate_next_interval(&rx).await,
            Err(EngineError::Cancelled { report: None })
        ));
        assert_eq!(engine.metrics().snapshot().await.cycles, 0);
    }

    #[tokio::test]
    async fn fixed_interval_skips_listing() {
        let (_tx, rx) = watch::channel(false);
        let mut engine = engine(Configuration::default(), &["foo", "bar"]).await;
        assert_eq!(
            engine.calculate_next_interval(&rx).await.unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(engine.metrics().snapshot().await.interval_seconds, 600);
    }

    #[test]
    fn report_collects_failures() {
        let ok = TerminationResult {
            instance: InstanceId::new("default", "a"),
            outcome: TerminationOutcome::Terminated,
            notified: true,
        };
        let bad = TerminationResult {
            instance: InstanceId::new("default", "b"),
            outcome: TerminationOutcome::Failed("boom".to_string()),
            notified: false,
        };
        let report = CycleReport {
            listed: 2,
            candidates: 2,
            outcome: CycleOutcome::Completed,
            results: vec![ok, bad],
        };
        assert_eq!(report.victims().len(), 2);
        assert_eq!(
            report.failures(),
            vec![(InstanceId::new("default", "b"), "boom".to_string())]
        );
    }
}
