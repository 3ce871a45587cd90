//! Concentration engine implementing the [`CoefficientCalculator`] trait.
//!
//! The coefficient is the 1-based count of top holders consumed at the first
//! point the running sum satisfies the policy's comparison against
//! `fraction * total`. When the threshold is never reached (an asserted total
//! that overstates the entries, or a fraction of 1 under strict comparison)
//! the result saturates at the number of entries.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_traits::Zero;
use tracing::debug;

use naka_core::constants::THRESHOLD_DISPLAY_DIGITS;
use naka_core::error::EngineError;
use naka_core::traits::CoefficientCalculator;
use naka_core::{CoefficientResult, StakeDistribution, ThresholdPolicy, Weight};

use crate::total::effective_total;

/// The production calculator. Stateless; the tolerance for asserted totals
/// travels with each network's [`ThresholdPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ConcentrationEngine;

impl ConcentrationEngine {
    pub fn new() -> Self {
        Self
    }
}

impl CoefficientCalculator for ConcentrationEngine {
    fn compute(
        &self,
        distribution: &StakeDistribution,
        policy: &ThresholdPolicy,
    ) -> Result<CoefficientResult, EngineError> {
        compute(distribution, policy)
    }
}

/// Compute the coefficient, stamping the result with the current time.
pub fn compute(
    distribution: &StakeDistribution,
    policy: &ThresholdPolicy,
) -> Result<CoefficientResult, EngineError> {
    compute_at(distribution, policy, Utc::now())
}

/// Compute the coefficient with an explicit timestamp.
///
/// Pure: the same inputs always give the same result.
pub fn compute_at(
    distribution: &StakeDistribution,
    policy: &ThresholdPolicy,
    computed_at: DateTime<Utc>,
) -> Result<CoefficientResult, EngineError> {
    let totals = effective_total(distribution, policy.total_tolerance_bps)?;

    // Stable: equal weights keep input order. Which of several equal holders
    // comes first is not meaningful, only the count is.
    let mut ranked = totals.weights;
    ranked.sort_by(|a, b| b.cmp(a));

    let numerator = BigInt::from(policy.fraction.numerator());
    let denominator = BigInt::from(policy.fraction.denominator());
    // running / total  vs  numerator / denominator, cross-multiplied.
    let target = &totals.total * &numerator;

    let mut running = BigInt::zero();
    let mut consumed = None;
    for (index, weight) in ranked.iter().enumerate() {
        running += weight;
        let ordering = (&running * &denominator).cmp(&target);
        if policy.comparison.is_satisfied(ordering) {
            consumed = Some(index + 1);
            break;
        }
    }

    let coefficient = match consumed {
        Some(n) => n,
        None => {
            debug!(
                token = %distribution.token,
                entries = ranked.len(),
                asserted_total = totals.asserted,
                "threshold never reached; saturating at entry count"
            );
            ranked.len()
        }
    };

    let total_weight = Weight::from_units(distribution.mode, totals.total, totals.scale);
    let threshold_value = total_weight.mul_ratio_floor(
        policy.fraction.numerator(),
        policy.fraction.denominator(),
        THRESHOLD_DISPLAY_DIGITS,
    );

    Ok(CoefficientResult {
        token: distribution.token.clone(),
        coefficient: u32::try_from(coefficient).unwrap_or(u32::MAX),
        total_weight: Some(total_weight),
        threshold_value: Some(threshold_value),
        computed_at,
    })
}
