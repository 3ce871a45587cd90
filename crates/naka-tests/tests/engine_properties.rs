//! Property-based tests for the concentration engine.
//!
//! Properties checked under randomized distributions:
//! - the coefficient lies in `1..=len(entries)`
//! - raising the threshold fraction never lowers the coefficient
//! - identical inputs give identical results
//! - entry order does not matter
//! - `GreaterOrEqual` never needs more holders than `StrictGreater`

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use naka_core::error::EngineError;
use naka_core::{Comparison, Weight, WeightMode};
use naka_engine::{compute, compute_at};
use naka_tests::helpers::*;

fn weights() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..1_000_000, 1..64)
}

fn comparison() -> impl Strategy<Value = Comparison> {
    prop_oneof![Just(Comparison::StrictGreater), Just(Comparison::GreaterOrEqual)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn coefficient_is_within_bounds(w in weights(), num in 1u64..1000, cmp in comparison()) {
        let dist = distribution("ATOM", &w);
        let result = compute(&dist, &policy(num, 1000, cmp)).unwrap();
        prop_assert!(result.coefficient >= 1);
        prop_assert!(result.coefficient as usize <= w.len());
    }

    #[test]
    fn monotone_in_fraction(w in weights(), a in 1u64..1000, b in 1u64..1000, cmp in comparison()) {
        let (lo, hi) = (a.min(b), a.max(b));
        let dist = distribution("DOT", &w);
        let low = compute(&dist, &policy(lo, 1000, cmp)).unwrap();
        let high = compute(&dist, &policy(hi, 1000, cmp)).unwrap();
        prop_assert!(low.coefficient <= high.coefficient);
    }

    #[test]
    fn deterministic(w in weights(), num in 1u64..1000, cmp in comparison()) {
        let dist = distribution("SOL", &w);
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let p = policy(num, 1000, cmp);
        prop_assert_eq!(compute_at(&dist, &p, at).unwrap(), compute_at(&dist, &p, at).unwrap());
    }

    #[test]
    fn order_independent(w in weights(), num in 1u64..1000, cmp in comparison()) {
        let mut reversed = w.clone();
        reversed.reverse();
        let p = policy(num, 1000, cmp);
        let forward = compute(&distribution("NEAR", &w), &p).unwrap();
        let backward = compute(&distribution("NEAR", &reversed), &p).unwrap();
        prop_assert_eq!(forward.coefficient, backward.coefficient);
    }

    #[test]
    fn inclusive_boundary_never_needs_more(w in weights(), num in 1u64..1000) {
        let dist = distribution("TIA", &w);
        let strict = compute(&dist, &policy(num, 1000, Comparison::StrictGreater)).unwrap();
        let inclusive = compute(&dist, &policy(num, 1000, Comparison::GreaterOrEqual)).unwrap();
        prop_assert!(inclusive.coefficient <= strict.coefficient);
    }

    #[test]
    fn scaling_all_weights_keeps_coefficient(w in weights(), num in 1u64..1000) {
        // Absolute stakes in the smallest unit routinely exceed 64 bits.
        let scale = Weight::parse(WeightMode::Absolute, "1000000000000000000000000").unwrap();
        let mut big = distribution("NEAR", &[]);
        for (i, v) in w.iter().enumerate() {
            let units = scale.units() * *v;
            big.push(format!("v{i}"), Weight::from_units(WeightMode::Absolute, units, 0));
        }
        let p = policy(num, 1000, Comparison::StrictGreater);
        let small = compute(&distribution("NEAR", &w), &p).unwrap();
        prop_assert_eq!(compute(&big, &p).unwrap().coefficient, small.coefficient);
    }
}

#[test]
fn example_a_single_large_holder() {
    let result = compute(&distribution("A", &[50, 30, 20]), &policy(33, 100, Comparison::StrictGreater)).unwrap();
    assert_eq!(result.coefficient, 1);
    assert_eq!(result.total_weight, Some(abs(100)));
    assert_eq!(result.threshold_value, Some(abs(33)));
}

#[test]
fn example_b_ten_equal_holders() {
    let result = compute(&distribution("B", &[10; 10]), &policy(33, 100, Comparison::StrictGreater)).unwrap();
    assert_eq!(result.coefficient, 4);
}

#[test]
fn example_c_boundary_rule_matters() {
    let dist = distribution("C", &[25, 25, 25, 25]);
    let inclusive = compute(&dist, &policy(1, 2, Comparison::GreaterOrEqual)).unwrap();
    let strict = compute(&dist, &policy(1, 2, Comparison::StrictGreater)).unwrap();
    assert_eq!(inclusive.coefficient, 2);
    assert_eq!(strict.coefficient, 3);
}

#[test]
fn empty_distribution_is_insufficient() {
    let err = compute(&distribution("NONE", &[]), &policy(1, 3, Comparison::StrictGreater)).unwrap_err();
    assert_eq!(err, EngineError::InsufficientData);
}

#[test]
fn negative_weight_is_rejected() {
    let mut dist = distribution("NEG", &[10, 20]);
    dist.push("bad", Weight::parse(WeightMode::Absolute, "-5").unwrap());
    let err = compute(&dist, &policy(1, 3, Comparison::StrictGreater)).unwrap_err();
    assert!(matches!(err, EngineError::InvalidWeight { entity_id, .. } if entity_id == "bad"));
}
