//! # naka-core
//! Foundation types and traits for per-network Nakamoto coefficient tracking.

pub mod constants;
pub mod error;
pub mod policy;
pub mod traits;
pub mod types;
pub mod weight;

pub use policy::{Comparison, Fraction, ThresholdPolicy};
pub use types::{ChainRecord, CoefficientResult, StakeDistribution, StakeEntry, Token};
pub use weight::{Weight, WeightMode};
