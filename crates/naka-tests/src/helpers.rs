//! Shared builders for integration tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use naka_collectors::fixed::FixedEntry;
use naka_collectors::CollectorConfig;
use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{Comparison, Fraction, StakeDistribution, ThresholdPolicy, Token, Weight, WeightMode};
use naka_node_lib::scheduler::Job;
use naka_node_lib::{NetworkConfig, NodeConfig};

/// Integer weight in absolute mode.
pub fn abs(value: u64) -> Weight {
    Weight::from_u64(WeightMode::Absolute, value)
}

/// Absolute-mode distribution with one entry per weight, ids `v0`, `v1`, ...
pub fn distribution(token: &str, weights: &[u64]) -> StakeDistribution {
    let mut dist = StakeDistribution::new(Token::new(token), WeightMode::Absolute);
    for (i, w) in weights.iter().enumerate() {
        dist.push(format!("v{i}"), abs(*w));
    }
    dist
}

/// Policy from a ratio, with the default total tolerance.
pub fn policy(numerator: u64, denominator: u64, comparison: Comparison) -> ThresholdPolicy {
    ThresholdPolicy::new(Fraction::new(numerator, denominator).unwrap(), comparison)
}

/// A network served by a [`naka_collectors::fixed::FixedCollector`].
pub fn fixed_network(
    token: &str,
    chain_name: &str,
    weights: &[u64],
    threshold: &str,
    comparison: Comparison,
) -> NetworkConfig {
    NetworkConfig {
        token: Token::new(token),
        chain_name: chain_name.to_string(),
        enabled: true,
        collector: CollectorConfig::Fixed {
            entries: weights
                .iter()
                .enumerate()
                .map(|(i, w)| FixedEntry {
                    entity_id: format!("{token}-{i}"),
                    weight: w.to_string(),
                })
                .collect(),
            total: None,
        },
        threshold: threshold.parse().unwrap(),
        comparison,
        weight_mode: WeightMode::Absolute,
        total_tolerance_bps: 500,
    }
}

/// Node configuration rooted at `data_dir` with short timeouts.
pub fn test_config(data_dir: &Path, networks: Vec<NetworkConfig>) -> NodeConfig {
    NodeConfig {
        data_dir: data_dir.to_path_buf(),
        job_timeout_secs: 1,
        cycle_deadline_secs: 5,
        max_concurrent_jobs: 4,
        networks,
        ..NodeConfig::default()
    }
}

/// One scripted response of a [`Scripted`] collector.
#[derive(Debug, Clone)]
pub enum Step {
    /// Serve an absolute-mode distribution with these weights.
    Weights(Vec<u64>),
    /// Fail with a transport error.
    Fail,
    /// Never answer.
    Hang,
}

/// Collector that plays back a fixed list of responses, one per fetch.
/// Fails once the script runs out.
pub struct Scripted {
    steps: Mutex<VecDeque<Step>>,
}

impl Scripted {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
        })
    }
}

#[async_trait]
impl Collector for Scripted {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Weights(w)) => Ok(Collected::Distribution(distribution(token.as_str(), &w))),
            Some(Step::Fail) => Err(CollectorError::Http("connection refused".into())),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(CollectorError::Http("script exhausted".into())),
        }
    }
}

pub fn job(token: &str, chain_name: &str, policy: ThresholdPolicy, collector: Arc<dyn Collector>) -> Job {
    Job {
        token: Token::new(token),
        chain_name: chain_name.to_string(),
        policy,
        collector,
    }
}
