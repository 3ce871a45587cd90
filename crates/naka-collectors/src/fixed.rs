//! A distribution written directly into configuration.
//!
//! Useful for networks whose validator set changes rarely and for local
//! runs without upstream access.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use naka_core::error::CollectorError;
use naka_core::traits::{Collected, Collector};
use naka_core::{StakeDistribution, StakeEntry, Token, Weight, WeightMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedEntry {
    pub entity_id: String,
    /// Decimal string, e.g. `"1500000"` or `"0.125"`.
    pub weight: String,
}

pub struct FixedCollector {
    mode: WeightMode,
    entries: Vec<StakeEntry>,
    total: Option<Weight>,
}

impl FixedCollector {
    /// Weights are parsed eagerly so bad configuration fails at startup.
    pub fn new(
        mode: WeightMode,
        entries: &[FixedEntry],
        total: Option<&str>,
    ) -> Result<Self, CollectorError> {
        let entries = entries
            .iter()
            .map(|e| Ok(StakeEntry::new(e.entity_id.clone(), Weight::parse(mode, &e.weight)?)))
            .collect::<Result<Vec<_>, CollectorError>>()?;
        let total = total.map(|t| Weight::parse(mode, t)).transpose()?;
        Ok(Self { mode, entries, total })
    }
}

#[async_trait]
impl Collector for FixedCollector {
    async fn fetch(&self, token: &Token) -> Result<Collected, CollectorError> {
        let mut dist = StakeDistribution::new(token.clone(), self.mode);
        dist.entries = self.entries.clone();
        dist.total_weight = self.total.clone();
        Ok(Collected::Distribution(dist))
    }
}
