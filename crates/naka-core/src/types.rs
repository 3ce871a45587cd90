//! Canonical stake and coefficient types shared by collectors, the engine,
//! and the registry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::weight::{Weight, WeightMode};

/// Ticker identifying a network, e.g. `ATOM` for Cosmos Hub.
///
/// Always stored upper-case so lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Token(String);

impl Token {
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(symbol.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Token> for String {
    fn from(t: Token) -> Self {
        t.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One stake holder. `entity_id` is not guaranteed unique within a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeEntry {
    pub entity_id: String,
    pub weight: Weight,
}

impl StakeEntry {
    pub fn new(entity_id: impl Into<String>, weight: Weight) -> Self {
        Self {
            entity_id: entity_id.into(),
            weight,
        }
    }
}

/// A network's stake snapshot as normalized by its collector.
///
/// Entry order carries no meaning. When `total_weight` is absent the engine
/// derives it by exact summation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeDistribution {
    pub token: Token,
    pub mode: WeightMode,
    pub entries: Vec<StakeEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_weight: Option<Weight>,
}

impl StakeDistribution {
    pub fn new(token: Token, mode: WeightMode) -> Self {
        Self {
            token,
            mode,
            entries: Vec::new(),
            total_weight: None,
        }
    }

    /// Append an entry. Duplicated ids are kept as separate entries.
    pub fn push(&mut self, entity_id: impl Into<String>, weight: Weight) {
        self.entries.push(StakeEntry::new(entity_id, weight));
    }

    /// Attach the total reported by the upstream source.
    pub fn with_total(mut self, total: Weight) -> Self {
        self.total_weight = Some(total);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of one coefficient computation.
///
/// `total_weight` and `threshold_value` are absent when the upstream source
/// reported the coefficient directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoefficientResult {
    pub token: Token,
    pub coefficient: u32,
    pub total_weight: Option<Weight>,
    pub threshold_value: Option<Weight>,
    pub computed_at: DateTime<Utc>,
}

impl CoefficientResult {
    /// A coefficient reported by the upstream API rather than computed here.
    pub fn precomputed(token: Token, coefficient: u32, computed_at: DateTime<Utc>) -> Self {
        Self {
            token,
            coefficient,
            total_weight: None,
            threshold_value: None,
            computed_at,
        }
    }
}

/// Previous/current coefficient for one network.
///
/// `previous_coefficient` only moves when a new successful computation
/// lands; failed cycles carry the whole record forward untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainRecord {
    pub token: Token,
    pub chain_name: String,
    pub previous_coefficient: Option<u32>,
    pub current_coefficient: u32,
    pub last_success_at: DateTime<Utc>,
}

impl ChainRecord {
    /// Record created on the first successful computation for a token.
    pub fn first(chain_name: impl Into<String>, result: &CoefficientResult) -> Self {
        Self {
            token: result.token.clone(),
            chain_name: chain_name.into(),
            previous_coefficient: None,
            current_coefficient: result.coefficient,
            last_success_at: result.computed_at,
        }
    }

    /// Successor record: this record's current value becomes the previous one.
    pub fn advance(&self, result: &CoefficientResult) -> Self {
        Self {
            token: self.token.clone(),
            chain_name: self.chain_name.clone(),
            previous_coefficient: Some(self.current_coefficient),
            current_coefficient: result.coefficient,
            last_success_at: result.computed_at,
        }
    }

    /// `current - previous`, treating a missing previous value as zero.
    pub fn change(&self) -> i64 {
        i64::from(self.current_coefficient) - i64::from(self.previous_coefficient.unwrap_or(0))
    }
}
