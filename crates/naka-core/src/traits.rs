//! Trait interfaces between crates:
//! - [`Collector`] — per-network stake source (naka-collectors implements)
//! - [`CoefficientCalculator`] — concentration math (naka-engine implements)
//! - [`CoefficientStore`] — durable mirror of the registry (naka-node implements)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CollectorError, EngineError, PersistenceError};
use crate::policy::ThresholdPolicy;
use crate::types::{CoefficientResult, StakeDistribution, Token};

/// What a collector hands back for one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Collected {
    /// Canonical stake list; the engine derives the coefficient.
    Distribution(StakeDistribution),
    /// The upstream API already reports a coefficient; the engine is bypassed.
    Precomputed(CoefficientResult),
}

/// Normalizes one network's upstream API into [`Collected`].
///
/// Implementations own their network's quirks (pagination, GraphQL vs REST,
/// numeric encodings, filtering of jailed or inactive validators). The
/// scheduler bounds every call with a timeout, so implementations need not.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Collector: Send + Sync {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError>;
}

/// Pure computation of the concentration coefficient.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CoefficientCalculator: Send + Sync {
    /// Minimum number of top holders whose combined weight satisfies `policy`.
    fn compute(
        &self,
        distribution: &StakeDistribution,
        policy: &ThresholdPolicy,
    ) -> Result<CoefficientResult, EngineError>;
}

/// A coefficient pair as mirrored to durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCoefficient {
    pub token: Token,
    pub current: u32,
    pub previous: Option<u32>,
    /// Unix seconds of the write.
    pub updated_at: i64,
}

/// Best-effort durable mirror of the registry.
///
/// The in-memory registry stays authoritative; callers log and continue on
/// write errors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CoefficientStore: Send + Sync {
    /// Insert or overwrite the pair for `token`.
    fn upsert(
        &self,
        token: &Token,
        current: u32,
        previous: Option<u32>,
    ) -> Result<(), PersistenceError>;

    /// Last stored *current* coefficient for `token`, i.e. the value that
    /// becomes "previous" on the next update.
    ///
    /// Returns [`PREVIOUS_SENTINEL`](crate::constants::PREVIOUS_SENTINEL)
    /// when nothing is stored or the read fails. Never errors.
    fn get_previous(&self, token: &Token) -> i64;

    /// Every stored pair, used to seed the registry at startup.
    fn load_all(&self) -> Result<Vec<StoredCoefficient>, PersistenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PREVIOUS_SENTINEL;
    use crate::weight::WeightMode;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn mock_collector_returns_distribution() {
        let mut collector = MockCollector::new();
        collector
            .expect_fetch()
            .with(eq(Token::new("ATOM")))
            .returning(|t| {
                Ok(Collected::Distribution(StakeDistribution::new(
                    t.clone(),
                    WeightMode::Absolute,
                )))
            });

        let got = collector.fetch(&Token::new("atom")).await.unwrap();
        match got {
            Collected::Distribution(d) => assert_eq!(d.token, Token::new("ATOM")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mock_store_sentinel_contract() {
        let mut store = MockCoefficientStore::new();
        store.expect_get_previous().return_const(PREVIOUS_SENTINEL);
        assert_eq!(store.get_previous(&Token::new("UNKNOWN")), -1);
    }
}
