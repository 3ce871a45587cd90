//! # naka-engine — Concentration coefficient engine.
//!
//! All calculations use exact arbitrary-precision integer arithmetic.
//!
//! - **Effective total**: the asserted total when present (cross-checked
//!   against the exact sum of entries), otherwise the exact sum.
//! - **Ranking**: stable descending sort on aligned integer weights.
//! - **Threshold walk**: the running sum is compared against
//!   `fraction * total` by cross-multiplication, never by division.

pub mod engine;
pub mod total;

pub use engine::{compute, compute_at, ConcentrationEngine};
pub use total::{effective_total, EffectiveTotal};
