//! Error types for Nakamoto coefficient tracking.
use thiserror::Error;

use crate::weight::WeightMode;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WeightError {
    #[error("malformed weight: {0:?}")] Malformed(String),
    #[error("non-finite weight")] NonFinite,
    #[error("weight mode mismatch: expected {expected:?}, got {got:?}")] ModeMismatch { expected: WeightMode, got: WeightMode },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid threshold fraction: {0}")] InvalidFraction(String),
    #[error("unknown comparison: {0}")] UnknownComparison(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("insufficient data: distribution has no entries")] InsufficientData,
    #[error("invalid weight for {entity_id}: {reason}")] InvalidWeight { entity_id: String, reason: String },
    #[error("total mismatch: asserted {asserted}, summed {summed} (tolerance {tolerance_bps} bps)")] TotalMismatch { asserted: String, summed: String, tolerance_bps: u32 },
    #[error("effective total is zero")] ZeroTotal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error("http: {0}")] Http(String),
    #[error("timeout")] Timeout,
    #[error("unexpected status {status} from {url}")] Status { status: u16, url: String },
    #[error("malformed response: {0}")] Malformed(String),
    #[error("collector config: {0}")] Config(String),
    #[error(transparent)] Weight(#[from] WeightError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("storage: {0}")] Storage(String),
    #[error("codec: {0}")] Codec(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("load: {0}")] Load(String),
    #[error("invalid setting: {0}")] Invalid(String),
    #[error("duplicate network token: {0}")] DuplicateToken(String),
    #[error("network {token}: {reason}")] InvalidNetwork { token: String, reason: String },
    #[error(transparent)] Policy(#[from] PolicyError),
}

/// Why one network's job produced no fresh record this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("collector: {0}")] Collector(#[from] CollectorError),
    #[error("engine: {0}")] Engine(#[from] EngineError),
    #[error("cycle deadline exceeded")] DeadlineExceeded,
    #[error("cycle cancelled")] Cancelled,
    #[error("job panicked: {0}")] Panicked(String),
}

#[derive(Error, Debug)]
pub enum NakaError {
    #[error(transparent)] Weight(#[from] WeightError),
    #[error(transparent)] Policy(#[from] PolicyError),
    #[error(transparent)] Engine(#[from] EngineError),
    #[error(transparent)] Collector(#[from] CollectorError),
    #[error(transparent)] Persistence(#[from] PersistenceError),
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Job(#[from] JobError),
}
