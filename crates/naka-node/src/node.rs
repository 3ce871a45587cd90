//! Node context and refresh loop.
//!
//! [`Node`] is the one object handed to the HTTP layer and the binary. It
//! owns the scheduler, the registry handle, and the optional durable store,
//! and is the registry's only writer: refreshes are serialized by an async
//! mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use naka_collectors::{build_collector, HttpClient};
use naka_core::error::NakaError;
use naka_core::traits::{CoefficientCalculator, CoefficientStore};
use naka_core::{ChainRecord, Token};
use naka_engine::ConcentrationEngine;

use crate::config::NodeConfig;
use crate::registry::{FreshRecord, Registry, RegistryHandle};
use crate::scheduler::{shutdown_requested, CycleReport, Job, Scheduler, SchedulerSettings};
use crate::storage::RocksStore;

pub struct Node {
    config: NodeConfig,
    registry: RegistryHandle,
    scheduler: Scheduler,
    store: Option<Arc<dyn CoefficientStore>>,
    last_report: RwLock<Option<CycleReport>>,
    cycles: AtomicU64,
    refresh_lock: Mutex<()>,
}

impl Node {
    /// Open storage, build every enabled network's collector, and seed the
    /// registry from what was persisted.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NakaError> {
        let store = RocksStore::open(config.db_path())?;
        let client = HttpClient::new(config.job_timeout())?;

        let mut jobs = Vec::new();
        for network in config.enabled_networks() {
            let collector = build_collector(&network.collector, network.weight_mode, &client)?;
            jobs.push(Job {
                token: network.token.clone(),
                chain_name: network.chain_name.clone(),
                policy: network.policy(),
                collector,
            });
        }

        Ok(Self::with_parts(
            config,
            jobs,
            Arc::new(ConcentrationEngine),
            Some(Arc::new(store)),
        ))
    }

    /// Assemble a node from prebuilt parts.
    pub fn with_parts(
        config: NodeConfig,
        jobs: Vec<Job>,
        calculator: Arc<dyn CoefficientCalculator>,
        store: Option<Arc<dyn CoefficientStore>>,
    ) -> Arc<Self> {
        let initial = match &store {
            Some(store) => seed_registry(store.as_ref(), &jobs),
            None => Registry::new(),
        };
        info!(networks = jobs.len(), seeded = initial.len(), "node assembled");

        let settings = SchedulerSettings {
            job_timeout: config.job_timeout(),
            cycle_deadline: config.cycle_deadline(),
            max_concurrent_jobs: config.max_concurrent_jobs,
        };
        Arc::new(Self {
            registry: RegistryHandle::new(initial),
            scheduler: Scheduler::new(jobs, calculator, settings),
            store,
            config,
            last_report: RwLock::new(None),
            cycles: AtomicU64::new(0),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().clone()
    }

    /// Tokens this node refreshes, in configuration order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.scheduler.jobs().iter().map(|j| &j.token)
    }

    /// Run one cycle, publish the merged snapshot, then mirror it to storage.
    pub async fn refresh(&self, shutdown: watch::Receiver<bool>) -> CycleReport {
        let _writer = self.refresh_lock.lock().await;
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

        let outcome = self.scheduler.run_cycle(cycle, shutdown).await;
        let prior = self.with_stored_history(&self.registry.load(), &outcome.fresh);
        let published = self.registry.publish(prior.merged(outcome.fresh));
        info!(
            cycle,
            published = published.len(),
            carried_forward = published.len().saturating_sub(outcome.report.succeeded.len()),
            "snapshot published"
        );
        self.persist(&published, &outcome.report.succeeded).await;

        *self.last_report.write() = Some(outcome.report.clone());
        outcome.report
    }

    /// Refresh once immediately, then every `refresh_interval`, until
    /// shutdown is signalled. An in-flight cycle sees the same signal.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.refresh_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => {
                    info!("refresh loop stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.refresh(shutdown.clone()).await;
                    if report.cancelled {
                        break;
                    }
                }
            }
        }
    }

    /// For fresh tokens missing from `current`, backfill a record from the
    /// store so the stored value becomes this cycle's previous.
    fn with_stored_history(&self, current: &Registry, fresh: &[FreshRecord]) -> Registry {
        let Some(store) = &self.store else {
            return current.clone();
        };
        let backfill: Vec<ChainRecord> = fresh
            .iter()
            .filter(|f| current.get(&f.result.token).is_none())
            .filter_map(|f| {
                let stored = store.get_previous(&f.result.token);
                let current_coefficient = u32::try_from(stored).ok()?;
                debug!(token = %f.result.token, stored, "backfilling previous from store");
                Some(ChainRecord {
                    token: f.result.token.clone(),
                    chain_name: f.chain_name.clone(),
                    previous_coefficient: None,
                    current_coefficient,
                    last_success_at: f.result.computed_at,
                })
            })
            .collect();

        if backfill.is_empty() {
            return current.clone();
        }
        Registry::from_records(current.iter().cloned().chain(backfill))
    }

    /// Write the refreshed pairs through to the store on the blocking pool.
    async fn persist(&self, snapshot: &Registry, tokens: &[Token]) {
        let Some(store) = &self.store else {
            return;
        };
        let pairs: Vec<(Token, u32, Option<u32>)> = tokens
            .iter()
            .filter_map(|t| snapshot.get(t))
            .map(|r| (r.token.clone(), r.current_coefficient, r.previous_coefficient))
            .collect();
        let store = Arc::clone(store);
        let written = tokio::task::spawn_blocking(move || {
            for (token, current, previous) in pairs {
                if let Err(e) = store.upsert(&token, current, previous) {
                    warn!(%token, "persisting coefficient failed: {e}");
                }
            }
        })
        .await;
        if let Err(e) = written {
            warn!("persistence task failed: {e}");
        }
    }
}

/// Initial snapshot from persisted pairs, limited to configured networks.
fn seed_registry(store: &dyn CoefficientStore, jobs: &[Job]) -> Registry {
    let stored = match store.load_all() {
        Ok(stored) => stored,
        Err(e) => {
            warn!("loading persisted coefficients failed, starting empty: {e}");
            return Registry::new();
        }
    };
    let names: HashMap<&Token, &str> = jobs.iter().map(|j| (&j.token, j.chain_name.as_str())).collect();

    Registry::from_records(stored.into_iter().filter_map(|s| {
        let chain_name = names.get(&s.token)?;
        Some(ChainRecord {
            chain_name: chain_name.to_string(),
            previous_coefficient: s.previous,
            current_coefficient: s.current,
            last_success_at: DateTime::<Utc>::from_timestamp(s.updated_at, 0).unwrap_or_default(),
            token: s.token,
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::predicate::eq;
    use naka_core::constants::PREVIOUS_SENTINEL;
    use naka_core::error::{CollectorError, PersistenceError};
    use naka_core::traits::{Collected, Collector, MockCoefficientStore, MockCollector, StoredCoefficient};
    use naka_core::{CoefficientResult, Comparison, Fraction, ThresholdPolicy};

    struct Fixed(u32);

    #[async_trait]
    impl Collector for Fixed {
        async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
            Ok(Collected::Precomputed(CoefficientResult::precomputed(token.clone(), self.0, Utc::now())))
        }
    }

    fn job(token: &str, collector: Arc<dyn Collector>) -> Job {
        Job {
            token: Token::new(token),
            chain_name: format!("{token} chain"),
            policy: ThresholdPolicy::new(Fraction::new(1, 3).unwrap(), Comparison::StrictGreater),
            collector,
        }
    }

    fn failing() -> Arc<dyn Collector> {
        let mut c = MockCollector::new();
        c.expect_fetch().returning(|_| Err(CollectorError::Http("connection refused".into())));
        Arc::new(c)
    }

    fn shutdown() -> (watch::Sender<bool>, watch::Receiver<bool>) {
        watch::channel(false)
    }

    #[tokio::test]
    async fn seeds_from_store_and_advances_on_success() {
        let mut store = MockCoefficientStore::new();
        store.expect_load_all().returning(|| {
            Ok(vec![
                StoredCoefficient { token: Token::new("ATOM"), current: 7, previous: Some(6), updated_at: 1 },
                StoredCoefficient { token: Token::new("GONE"), current: 1, previous: None, updated_at: 1 },
            ])
        });
        store
            .expect_upsert()
            .with(eq(Token::new("ATOM")), eq(9u32), eq(Some(7u32)))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let node = Node::with_parts(
            NodeConfig::default(),
            vec![job("ATOM", Arc::new(Fixed(9)))],
            Arc::new(ConcentrationEngine),
            Some(Arc::new(store)),
        );
        assert_eq!(node.registry().len(), 1, "unconfigured tokens are not seeded");

        let (_tx, rx) = shutdown();
        let report = node.refresh(rx).await;
        assert_eq!(report.cycle, 1);
        let atom = node.registry().get(&Token::new("ATOM")).cloned().unwrap();
        assert_eq!((atom.previous_coefficient, atom.current_coefficient), (Some(7), 9));
        assert_eq!(atom.chain_name, "ATOM chain");
    }

    #[tokio::test]
    async fn persistence_failure_does_not_block_publish() {
        let mut store = MockCoefficientStore::new();
        store.expect_load_all().returning(|| Err(PersistenceError::Storage("corrupt".into())));
        store.expect_get_previous().return_const(PREVIOUS_SENTINEL);
        store
            .expect_upsert()
            .returning(|_, _, _| Err(PersistenceError::Storage("disk full".into())));

        let node = Node::with_parts(
            NodeConfig::default(),
            vec![job("SOL", Arc::new(Fixed(19)))],
            Arc::new(ConcentrationEngine),
            Some(Arc::new(store)),
        );
        let (_tx, rx) = shutdown();
        node.refresh(rx).await;
        let sol = node.registry().get(&Token::new("SOL")).cloned().unwrap();
        assert_eq!((sol.previous_coefficient, sol.current_coefficient), (None, 19));
    }

    #[tokio::test]
    async fn stored_value_becomes_previous_for_unseeded_token() {
        let mut store = MockCoefficientStore::new();
        store.expect_load_all().returning(|| Ok(Vec::new()));
        store.expect_get_previous().with(eq(Token::new("NEAR"))).return_const(11i64);
        store.expect_upsert().returning(|_, _, _| Ok(()));

        let node = Node::with_parts(
            NodeConfig::default(),
            vec![job("NEAR", Arc::new(Fixed(12)))],
            Arc::new(ConcentrationEngine),
            Some(Arc::new(store)),
        );
        let (_tx, rx) = shutdown();
        node.refresh(rx).await;
        let near = node.registry().get(&Token::new("NEAR")).cloned().unwrap();
        assert_eq!(near.previous_coefficient, Some(11));
        assert_eq!(near.change(), 1);
    }

    #[tokio::test]
    async fn failed_cycle_carries_record_forward() {
        let node = Node::with_parts(
            NodeConfig::default(),
            vec![job("ATOM", Arc::new(Fixed(5))), job("DOT", failing())],
            Arc::new(ConcentrationEngine),
            None,
        );
        let (_tx, rx) = shutdown();
        node.refresh(rx.clone()).await;
        let first = node.registry();

        let report = node.refresh(rx).await;
        assert_eq!(report.cycle, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(first.get(&Token::new("DOT")).is_none());
        let atom = node.registry().get(&Token::new("ATOM")).cloned().unwrap();
        assert_eq!(atom.previous_coefficient, Some(5));
        assert_eq!(node.last_report(), Some(report));
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_refreshes_until_shutdown() {
        let config = NodeConfig {
            refresh_interval_secs: 60,
            ..NodeConfig::default()
        };
        let node = Node::with_parts(config, vec![job("ATOM", Arc::new(Fixed(3)))], Arc::new(ConcentrationEngine), None);
        let (tx, rx) = shutdown();
        let handle = tokio::spawn(Arc::clone(&node).run(rx));

        tokio::time::sleep(std::time::Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        // Immediate pass plus ticks at 60s and 120s.
        assert_eq!(node.last_report().unwrap().cycle, 3);
    }
}
