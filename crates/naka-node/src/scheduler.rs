//! One refresh pass over every registered network.
//!
//! Each network runs as an independent task: collector fetch (bounded by the
//! per-job timeout), then the engine unless the collector reported a
//! precomputed coefficient. A [`Semaphore`] caps simultaneous jobs. The
//! coordinator stops waiting at the cycle deadline or on shutdown; whatever
//! finished by then is kept and the rest are aborted and reported as failed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use naka_core::error::CollectorError;
use naka_core::traits::{CoefficientCalculator, Collected, Collector};
use naka_core::{CoefficientResult, ThresholdPolicy, Token};

use crate::registry::FreshRecord;

pub use naka_core::error::JobError;

/// One network's unit of work.
#[derive(Clone)]
pub struct Job {
    pub token: Token,
    pub chain_name: String,
    pub policy: ThresholdPolicy,
    pub collector: Arc<dyn Collector>,
}

/// Timing and concurrency bounds for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub job_timeout: Duration,
    pub cycle_deadline: Duration,
    pub max_concurrent_jobs: usize,
}

/// A network that produced no fresh record this cycle, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureEvent {
    pub token: Token,
    #[serde(serialize_with = "serialize_display")]
    pub cause: JobError,
}

fn serialize_display<S: Serializer>(cause: &JobError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(cause)
}

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Tokens with a fresh record, ascending.
    pub succeeded: Vec<Token>,
    /// Failures, ascending by token.
    pub failures: Vec<FailureEvent>,
    /// Shutdown interrupted the cycle before every job finished.
    pub cancelled: bool,
}

/// Fresh records to merge plus the cycle's report.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub fresh: Vec<FreshRecord>,
    pub report: CycleReport,
}

pub struct Scheduler {
    jobs: Vec<Job>,
    calculator: Arc<dyn CoefficientCalculator>,
    settings: SchedulerSettings,
}

type JobOutput = (Token, String, Result<CoefficientResult, JobError>);

impl Scheduler {
    pub fn new(
        jobs: Vec<Job>,
        calculator: Arc<dyn CoefficientCalculator>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            jobs,
            calculator,
            settings,
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Run every job once and collect the outcome.
    ///
    /// Never fails as a whole: each job's error is caught at its boundary
    /// and reported as a [`FailureEvent`].
    pub async fn run_cycle(&self, cycle: u64, mut shutdown: watch::Receiver<bool>) -> CycleOutcome {
        let started_at = Utc::now();
        let deadline = Instant::now() + self.settings.cycle_deadline;
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_jobs.max(1)));

        info!(cycle, jobs = self.jobs.len(), "refresh cycle started");

        let mut set: JoinSet<JobOutput> = JoinSet::new();
        let mut pending = HashMap::new();
        for job in &self.jobs {
            let handle = set.spawn(run_job(
                job.clone(),
                Arc::clone(&self.calculator),
                Arc::clone(&permits),
                self.settings.job_timeout,
            ));
            pending.insert(handle.id(), job.token.clone());
        }

        let mut fresh = Vec::new();
        let mut succeeded = Vec::new();
        let mut failures = Vec::new();
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    cancelled = true;
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(cycle, outstanding = pending.len(), "cycle deadline reached");
                    break;
                }
                joined = set.join_next_with_id() => match joined {
                    None => break,
                    Some(Ok((id, (token, chain_name, outcome)))) => {
                        pending.remove(&id);
                        match outcome {
                            Ok(mut result) => {
                                debug!(%token, coefficient = result.coefficient, "job succeeded");
                                result.token = token.clone();
                                succeeded.push(token);
                                fresh.push(FreshRecord { chain_name, result });
                            }
                            Err(cause) => {
                                warn!(%token, "job failed: {cause}");
                                failures.push(FailureEvent { token, cause });
                            }
                        }
                    }
                    Some(Err(err)) => {
                        if let Some(token) = pending.remove(&err.id()) {
                            warn!(%token, "job panicked: {err}");
                            failures.push(FailureEvent {
                                token,
                                cause: JobError::Panicked(err.to_string()),
                            });
                        }
                    }
                }
            }
        }

        set.abort_all();
        let leftover_cause = if cancelled {
            JobError::Cancelled
        } else {
            JobError::DeadlineExceeded
        };
        failures.extend(pending.into_values().map(|token| FailureEvent {
            token,
            cause: leftover_cause.clone(),
        }));

        succeeded.sort();
        failures.sort_by(|a, b| a.token.cmp(&b.token));
        fresh.sort_by(|a, b| a.result.token.cmp(&b.result.token));

        let finished_at = Utc::now();
        let report = CycleReport {
            cycle,
            started_at,
            finished_at,
            succeeded,
            failures,
            cancelled,
        };
        info!(
            cycle,
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            cancelled,
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "refresh cycle finished"
        );
        CycleOutcome { fresh, report }
    }
}

async fn run_job(
    job: Job,
    calculator: Arc<dyn CoefficientCalculator>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
) -> JobOutput {
    let Job {
        token,
        chain_name,
        policy,
        collector,
    } = job;

    let outcome = match permits.acquire_owned().await {
        Ok(_permit) => collect_and_compute(&token, &policy, collector.as_ref(), calculator.as_ref(), job_timeout).await,
        Err(_) => Err(JobError::Cancelled),
    };
    (token, chain_name, outcome)
}

async fn collect_and_compute(
    token: &Token,
    policy: &ThresholdPolicy,
    collector: &dyn Collector,
    calculator: &dyn CoefficientCalculator,
    job_timeout: Duration,
) -> Result<CoefficientResult, JobError> {
    let collected = tokio::time::timeout(job_timeout, collector.fetch(token))
        .await
        .map_err(|_| CollectorError::Timeout)??;

    match collected {
        Collected::Distribution(distribution) => {
            debug!(%token, entries = distribution.len(), "computing coefficient");
            Ok(calculator.compute(&distribution, policy)?)
        }
        Collected::Precomputed(result) if result.coefficient == 0 => Err(JobError::Collector(
            CollectorError::Malformed("upstream reported a coefficient of 0".into()),
        )),
        Collected::Precomputed(result) => Ok(result),
    }
}

/// Resolves once shutdown is signalled; never resolves if the sender is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use naka_core::error::EngineError;
    use naka_core::traits::MockCollector;
    use naka_core::{Comparison, Fraction, StakeDistribution, Weight, WeightMode};
    use naka_engine::ConcentrationEngine;

    /// Sleeps before returning a fixed distribution.
    struct SlowCollector {
        delay: Duration,
        weights: Vec<u64>,
    }

    #[async_trait]
    impl Collector for SlowCollector {
        async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
            tokio::time::sleep(self.delay).await;
            Ok(Collected::Distribution(distribution(token, &self.weights)))
        }
    }

    fn distribution(token: &Token, weights: &[u64]) -> StakeDistribution {
        let mut d = StakeDistribution::new(token.clone(), WeightMode::Absolute);
        for (i, w) in weights.iter().enumerate() {
            d.push(format!("v{i}"), Weight::from_u64(WeightMode::Absolute, *w));
        }
        d
    }

    fn policy() -> ThresholdPolicy {
        ThresholdPolicy::new(Fraction::new(33, 100).unwrap(), Comparison::StrictGreater)
    }

    fn job(token: &str, collector: Arc<dyn Collector>) -> Job {
        Job {
            token: Token::new(token),
            chain_name: format!("{token} chain"),
            policy: policy(),
            collector,
        }
    }

    fn slow(delay_secs: u64, weights: &[u64]) -> Arc<dyn Collector> {
        Arc::new(SlowCollector {
            delay: Duration::from_secs(delay_secs),
            weights: weights.to_vec(),
        })
    }

    fn scheduler(jobs: Vec<Job>) -> Scheduler {
        Scheduler::new(
            jobs,
            Arc::new(ConcentrationEngine),
            SchedulerSettings {
                job_timeout: Duration::from_secs(10),
                cycle_deadline: Duration::from_secs(120),
                max_concurrent_jobs: 4,
            },
        )
    }

    fn idle_shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_isolated_from_other_jobs() {
        let sched = scheduler(vec![
            job("ATOM", slow(1, &[50, 30, 20])),
            job("SOL", slow(60, &[1])),
        ]);
        let (_tx, rx) = idle_shutdown();
        let out = sched.run_cycle(1, rx).await;

        assert_eq!(out.report.succeeded, vec![Token::new("ATOM")]);
        assert_eq!(
            out.report.failures,
            vec![FailureEvent {
                token: Token::new("SOL"),
                cause: JobError::Collector(CollectorError::Timeout),
            }]
        );
        assert_eq!(out.fresh.len(), 1);
        assert_eq!(out.fresh[0].result.coefficient, 1);
        assert_eq!(out.fresh[0].chain_name, "ATOM chain");
        assert!(!out.report.cancelled);
    }

    #[tokio::test]
    async fn collector_and_engine_errors_are_reported_per_token() {
        let mut broken = MockCollector::new();
        broken
            .expect_fetch()
            .returning(|_| Err(CollectorError::Status { status: 503, url: "http://x".into() }));
        let mut empty = MockCollector::new();
        empty
            .expect_fetch()
            .returning(|t| Ok(Collected::Distribution(StakeDistribution::new(t.clone(), WeightMode::Absolute))));

        let sched = scheduler(vec![
            job("DOT", Arc::new(broken)),
            job("NEAR", Arc::new(empty)),
            job("SUI", slow(0, &[10; 10])),
        ]);
        let (_tx, rx) = idle_shutdown();
        let out = sched.run_cycle(7, rx).await;

        assert_eq!(out.report.cycle, 7);
        assert_eq!(out.report.succeeded, vec![Token::new("SUI")]);
        assert_eq!(out.fresh[0].result.coefficient, 4);
        let causes: Vec<_> = out.report.failures.iter().map(|f| (f.token.as_str(), f.cause.clone())).collect();
        assert_eq!(
            causes,
            vec![
                ("DOT", JobError::Collector(CollectorError::Status { status: 503, url: "http://x".into() })),
                ("NEAR", JobError::Engine(EngineError::InsufficientData)),
            ]
        );
    }

    #[tokio::test]
    async fn precomputed_bypasses_engine() {
        let mut direct = MockCollector::new();
        direct.expect_fetch().returning(|t| {
            Ok(Collected::Precomputed(CoefficientResult::precomputed(t.clone(), 23, Utc::now())))
        });
        let sched = scheduler(vec![job("ADA", Arc::new(direct))]);
        let (_tx, rx) = idle_shutdown();
        let out = sched.run_cycle(1, rx).await;
        assert_eq!(out.fresh[0].result.coefficient, 23);
        assert!(out.fresh[0].result.total_weight.is_none());
    }

    #[tokio::test]
    async fn precomputed_zero_is_a_failure() {
        let mut direct = MockCollector::new();
        direct.expect_fetch().returning(|t| {
            Ok(Collected::Precomputed(CoefficientResult::precomputed(t.clone(), 0, Utc::now())))
        });
        let sched = scheduler(vec![job("ADA", Arc::new(direct)), job("SOL", slow(0, &[10; 10]))]);
        let (_tx, rx) = idle_shutdown();
        let out = sched.run_cycle(1, rx).await;
        assert_eq!(out.report.succeeded, vec![Token::new("SOL")]);
        assert_eq!(out.report.failures.len(), 1);
        assert_eq!(out.report.failures[0].token, Token::new("ADA"));
        assert!(matches!(
            out.report.failures[0].cause,
            JobError::Collector(CollectorError::Malformed(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_outstanding_jobs() {
        let sched = Scheduler::new(
            vec![job("ATOM", slow(1, &[1])), job("SOL", slow(30, &[1]))],
            Arc::new(ConcentrationEngine),
            SchedulerSettings {
                job_timeout: Duration::from_secs(60),
                cycle_deadline: Duration::from_secs(5),
                max_concurrent_jobs: 2,
            },
        );
        let (_tx, rx) = idle_shutdown();
        let out = sched.run_cycle(1, rx).await;
        assert_eq!(out.report.succeeded, vec![Token::new("ATOM")]);
        assert_eq!(out.report.failures[0].cause, JobError::DeadlineExceeded);
        assert!(!out.report.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_keeps_completed_jobs() {
        let sched = scheduler(vec![job("ATOM", slow(1, &[1])), job("SOL", slow(8, &[1]))]);
        let (tx, rx) = idle_shutdown();
        let cycle = tokio::spawn(async move { sched.run_cycle(1, rx).await });

        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();
        let out = cycle.await.unwrap();

        assert!(out.report.cancelled);
        assert_eq!(out.report.succeeded, vec![Token::new("ATOM")]);
        assert_eq!(
            out.report.failures,
            vec![FailureEvent { token: Token::new("SOL"), cause: JobError::Cancelled }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn semaphore_bounds_concurrency() {
        // Four 5s jobs through two permits need two rounds.
        let jobs = ["A", "B", "C", "D"].iter().map(|t| job(t, slow(5, &[1]))).collect();
        let sched = Scheduler::new(
            jobs,
            Arc::new(ConcentrationEngine),
            SchedulerSettings {
                job_timeout: Duration::from_secs(10),
                cycle_deadline: Duration::from_secs(120),
                max_concurrent_jobs: 2,
            },
        );
        let (_tx, rx) = idle_shutdown();
        let start = Instant::now();
        let out = sched.run_cycle(1, rx).await;
        assert_eq!(out.report.succeeded.len(), 4);
        assert!(start.elapsed() >= Duration::from_secs(10));
    }

    #[test]
    fn failure_event_serializes_cause_as_text() {
        let event = FailureEvent {
            token: Token::new("SOL"),
            cause: JobError::DeadlineExceeded,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["token"], "SOL");
        assert_eq!(json["cause"], "cycle deadline exceeded");
    }
}
