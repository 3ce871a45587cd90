//! Entry validation and effective-total derivation.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use naka_core::constants::BPS_PRECISION;
use naka_core::error::EngineError;
use naka_core::{StakeDistribution, Weight};

/// Sentinel entity id used when the asserted total itself is invalid.
const TOTAL_ENTITY: &str = "<asserted total>";

/// A validated distribution with all weights aligned to one decimal scale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveTotal {
    /// Decimal scale shared by every value below.
    pub scale: u32,
    /// Entry weights at `scale`, in input order.
    pub weights: Vec<BigInt>,
    /// Exact sum of `weights`.
    pub summed: BigInt,
    /// Total used for the threshold: asserted if present, else `summed`.
    pub total: BigInt,
    /// Whether `total` came from the source rather than summation.
    pub asserted: bool,
}

/// Validate `distribution` and derive the total the threshold is taken of.
///
/// Fails with:
/// - [`EngineError::InsufficientData`] when there are no entries
/// - [`EngineError::InvalidWeight`] for a negative weight, or one whose mode
///   differs from the distribution's
/// - [`EngineError::TotalMismatch`] when an asserted total and the exact sum
///   differ by more than `tolerance_bps` of the asserted total
/// - [`EngineError::ZeroTotal`] when the effective total is zero
pub fn effective_total(
    distribution: &StakeDistribution,
    tolerance_bps: u32,
) -> Result<EffectiveTotal, EngineError> {
    if distribution.entries.is_empty() {
        return Err(EngineError::InsufficientData);
    }

    for entry in &distribution.entries {
        check_weight(distribution, &entry.entity_id, &entry.weight)?;
    }
    if let Some(total) = &distribution.total_weight {
        check_weight(distribution, TOTAL_ENTITY, total)?;
    }

    let scale = distribution
        .entries
        .iter()
        .map(|e| e.weight.scale())
        .chain(distribution.total_weight.iter().map(Weight::scale))
        .max()
        .unwrap_or(0);

    let weights: Vec<BigInt> = distribution
        .entries
        .iter()
        .map(|e| e.weight.units_at_scale(scale))
        .collect();
    let summed: BigInt = weights.iter().sum();

    let (total, asserted) = match &distribution.total_weight {
        Some(asserted) => {
            let asserted = asserted.units_at_scale(scale);
            cross_check(&asserted, &summed, scale, distribution, tolerance_bps)?;
            (asserted, true)
        }
        None => (summed.clone(), false),
    };

    if total.is_zero() {
        return Err(EngineError::ZeroTotal);
    }

    Ok(EffectiveTotal {
        scale,
        weights,
        summed,
        total,
        asserted,
    })
}

fn check_weight(
    distribution: &StakeDistribution,
    entity_id: &str,
    weight: &Weight,
) -> Result<(), EngineError> {
    if weight.mode() != distribution.mode {
        return Err(EngineError::InvalidWeight {
            entity_id: entity_id.to_string(),
            reason: format!(
                "mode {:?} does not match network mode {:?}",
                weight.mode(),
                distribution.mode
            ),
        });
    }
    if weight.is_negative() {
        return Err(EngineError::InvalidWeight {
            entity_id: entity_id.to_string(),
            reason: format!("negative weight {weight}"),
        });
    }
    Ok(())
}

/// `|asserted - summed| * BPS_PRECISION <= asserted * tolerance_bps`.
fn cross_check(
    asserted: &BigInt,
    summed: &BigInt,
    scale: u32,
    distribution: &StakeDistribution,
    tolerance_bps: u32,
) -> Result<(), EngineError> {
    let gap = (asserted - summed).abs() * BigInt::from(BPS_PRECISION);
    let allowed = asserted * BigInt::from(tolerance_bps);
    if gap > allowed {
        let render = |units: &BigInt| Weight::from_units(distribution.mode, units.clone(), scale).to_string();
        return Err(EngineError::TotalMismatch {
            asserted: render(asserted),
            summed: render(summed),
            tolerance_bps,
        });
    }
    Ok(())
}
