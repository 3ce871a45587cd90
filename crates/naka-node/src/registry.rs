//! Immutable registry snapshots and their atomic publication.
//!
//! A [`Registry`] is never mutated once built. Each refresh cycle derives a
//! new one from the prior snapshot via [`Registry::merged`] and publishes it
//! with a single pointer swap through [`RegistryHandle`]. Readers load an
//! `Arc<Registry>` without locking and keep a consistent view for as long as
//! they hold it.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use naka_core::{ChainRecord, CoefficientResult, Token};

/// A fresh, successful result for one network, tagged with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshRecord {
    pub chain_name: String,
    pub result: CoefficientResult,
}

/// Token → record map, ordered by token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    records: BTreeMap<Token, ChainRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = ChainRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.token.clone(), r)).collect(),
        }
    }

    pub fn get(&self, token: &Token) -> Option<&ChainRecord> {
        self.records.get(token)
    }

    /// Records in ascending token order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The successor snapshot after one cycle.
    ///
    /// Tokens with a fresh result advance (previous ← old current); every
    /// other record is carried forward unchanged. A fresh result for an
    /// unseen token starts a record with no previous value.
    pub fn merged(&self, fresh: impl IntoIterator<Item = FreshRecord>) -> Self {
        let mut records = self.records.clone();
        for FreshRecord { chain_name, result } in fresh {
            let next = match records.get(&result.token) {
                Some(prior) => {
                    let mut next = prior.advance(&result);
                    next.chain_name = chain_name;
                    next
                }
                None => ChainRecord::first(chain_name, &result),
            };
            records.insert(next.token.clone(), next);
        }
        Self { records }
    }
}

/// Shared, atomically swappable pointer to the current [`Registry`].
///
/// One writer (the node's refresh path) publishes; any number of readers
/// load concurrently.
#[derive(Debug)]
pub struct RegistryHandle {
    current: ArcSwap<Registry>,
}

impl RegistryHandle {
    pub fn new(initial: Registry) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// The latest published snapshot.
    pub fn load(&self) -> Arc<Registry> {
        self.current.load_full()
    }

    /// Replace the current snapshot, returning the one just published.
    pub fn publish(&self, next: Registry) -> Arc<Registry> {
        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        next
    }
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(Registry::new())
    }
}
