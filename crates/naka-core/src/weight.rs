//! Exact decimal stake weights.
//!
//! A [`Weight`] is `units / 10^scale` with an arbitrary-precision signed
//! numerator. Arithmetic and comparison align scales first, so stake values
//! never pass through floating point. Negative values are representable so
//! that the engine can reject them explicitly rather than losing them at the
//! parse boundary.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::WeightError;

/// How a network reports stake. Fixed per network, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightMode {
    /// Raw stake in the chain's smallest unit. Routinely exceeds 64 bits.
    Absolute,
    /// Pre-normalized share of a known total (percent, basis points, fractions).
    Proportional,
}

/// Arbitrary-precision decimal stake quantity tagged with its [`WeightMode`].
///
/// Serialized as `{"mode": "absolute", "value": "123.45"}` so that large
/// values survive JSON without precision loss.
///
/// # Examples
///
/// ```
/// use naka_core::{Weight, WeightMode};
/// let a = Weight::parse(WeightMode::Absolute, "1000000000000000000000000").unwrap();
/// let b = Weight::parse(WeightMode::Absolute, "0.5").unwrap();
/// assert!(a > b);
/// assert_eq!(a.checked_add(&b).unwrap().to_string(), "1000000000000000000000000.5");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "WeightRepr", into = "WeightRepr")]
pub struct Weight {
    mode: WeightMode,
    units: BigInt,
    scale: u32,
}

#[derive(Serialize, Deserialize)]
struct WeightRepr {
    mode: WeightMode,
    value: String,
}

impl TryFrom<WeightRepr> for Weight {
    type Error = WeightError;

    fn try_from(repr: WeightRepr) -> Result<Self, Self::Error> {
        Weight::parse(repr.mode, &repr.value)
    }
}

impl From<Weight> for WeightRepr {
    fn from(weight: Weight) -> Self {
        WeightRepr {
            value: weight.to_string(),
            mode: weight.mode,
        }
    }
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

impl Weight {
    /// The zero weight in the given mode.
    pub fn zero(mode: WeightMode) -> Self {
        Self {
            mode,
            units: BigInt::zero(),
            scale: 0,
        }
    }

    /// Build a weight from a raw numerator and decimal scale (`units / 10^scale`).
    pub fn from_units(mode: WeightMode, units: impl Into<BigInt>, scale: u32) -> Self {
        Self {
            mode,
            units: units.into(),
            scale,
        }
        .normalized()
    }

    /// Integer weight.
    pub fn from_u64(mode: WeightMode, value: u64) -> Self {
        Self::from_units(mode, value, 0)
    }

    /// Integer weight beyond 64 bits.
    pub fn from_u128(mode: WeightMode, value: u128) -> Self {
        Self::from_units(mode, value, 0)
    }

    /// Parse a plain decimal string such as `"42"`, `"-3"`, or `"0.0125"`.
    ///
    /// Exponent notation, thousands separators, and empty input are rejected.
    pub fn parse(mode: WeightMode, input: &str) -> Result<Self, WeightError> {
        let malformed = || WeightError::Malformed(input.to_string());
        let raw = input.trim();
        let (negative, body) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };
        let (int_part, frac_part) = body.split_once('.').unwrap_or((body, ""));

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }
        let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(malformed());
        }

        let digits = format!("{int_part}{frac_part}");
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(malformed)?;
        let scale = u32::try_from(frac_part.len()).map_err(|_| malformed())?;
        let units = if negative { -magnitude } else { magnitude };

        Ok(Self { mode, units, scale }.normalized())
    }

    /// Convert a float reported by an upstream API.
    ///
    /// Uses the shortest decimal representation that round-trips to `value`,
    /// so `0.1` becomes exactly `1/10`. NaN and infinities are rejected.
    pub fn from_f64(mode: WeightMode, value: f64) -> Result<Self, WeightError> {
        if !value.is_finite() {
            return Err(WeightError::NonFinite);
        }
        // f64 Display never uses exponent notation.
        Self::parse(mode, &value.to_string())
    }

    pub fn mode(&self) -> WeightMode {
        self.mode
    }

    /// Raw numerator at [`scale`](Self::scale).
    pub fn units(&self) -> &BigInt {
        &self.units
    }

    /// Number of decimal places in the numerator.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn is_negative(&self) -> bool {
        self.units.is_negative()
    }

    pub fn is_zero(&self) -> bool {
        self.units.is_zero()
    }

    /// The numerator re-expressed at `scale` decimal places.
    ///
    /// Exact when `scale >= self.scale()`; truncates toward zero otherwise.
    pub fn units_at_scale(&self, scale: u32) -> BigInt {
        match scale.cmp(&self.scale) {
            Ordering::Equal => self.units.clone(),
            Ordering::Greater => &self.units * pow10(scale - self.scale),
            Ordering::Less => &self.units / pow10(self.scale - scale),
        }
    }

    /// Exact sum. Both operands must share a mode.
    pub fn checked_add(&self, other: &Weight) -> Result<Weight, WeightError> {
        self.ensure_mode(other.mode)?;
        let scale = self.scale.max(other.scale);
        let units = self.units_at_scale(scale) + other.units_at_scale(scale);
        Ok(Self::from_units(self.mode, units, scale))
    }

    /// Exact difference. Both operands must share a mode.
    pub fn checked_sub(&self, other: &Weight) -> Result<Weight, WeightError> {
        self.ensure_mode(other.mode)?;
        let scale = self.scale.max(other.scale);
        let units = self.units_at_scale(scale) - other.units_at_scale(scale);
        Ok(Self::from_units(self.mode, units, scale))
    }

    /// Absolute value, keeping the mode.
    pub fn abs(&self) -> Weight {
        Self {
            mode: self.mode,
            units: self.units.abs(),
            scale: self.scale,
        }
    }

    /// Exact sum of `weights`, all of which must be in `mode`.
    pub fn sum<'a, I>(mode: WeightMode, weights: I) -> Result<Weight, WeightError>
    where
        I: IntoIterator<Item = &'a Weight>,
    {
        let weights: Vec<&Weight> = weights.into_iter().collect();
        let scale = weights.iter().map(|w| w.scale).max().unwrap_or(0);
        let mut units = BigInt::zero();
        for w in weights {
            if w.mode != mode {
                return Err(WeightError::ModeMismatch {
                    expected: mode,
                    got: w.mode,
                });
            }
            units += w.units_at_scale(scale);
        }
        Ok(Self::from_units(mode, units, scale))
    }

    /// `self * numerator / denominator`, rounded down at `extra_digits` decimal
    /// places beyond this weight's own scale. Exact whenever the quotient fits.
    pub fn mul_ratio_floor(&self, numerator: u64, denominator: u64, extra_digits: u32) -> Weight {
        let scale = self.scale + extra_digits;
        let scaled = self.units_at_scale(scale) * BigInt::from(numerator);
        let units = if denominator == 0 {
            BigInt::zero()
        } else {
            scaled / BigInt::from(denominator)
        };
        Self::from_units(self.mode, units, scale)
    }

    fn ensure_mode(&self, other: WeightMode) -> Result<(), WeightError> {
        if self.mode == other {
            Ok(())
        } else {
            Err(WeightError::ModeMismatch {
                expected: self.mode,
                got: other,
            })
        }
    }

    /// Strip trailing fractional zeros so equal values share a representation.
    fn normalized(mut self) -> Self {
        if self.units.is_zero() {
            self.scale = 0;
            return self;
        }
        let ten = BigInt::from(10u32);
        while self.scale > 0 && (&self.units % &ten).is_zero() {
            self.units /= &ten;
            self.scale -= 1;
        }
        self
    }

    fn cmp_value(&self, other: &Weight) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.units_at_scale(scale).cmp(&other.units_at_scale(scale))
    }
}

impl PartialEq for Weight {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Weight {}

impl PartialOrd for Weight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Weight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_value(other).then(self.mode.cmp(&other.mode))
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.units);
        }
        let scale = self.scale as usize;
        let mut digits = self.units.abs().to_string();
        if digits.len() <= scale {
            digits = format!("{}{digits}", "0".repeat(scale + 1 - digits.len()));
        }
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        let sign = if self.units.is_negative() { "-" } else { "" };
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}
