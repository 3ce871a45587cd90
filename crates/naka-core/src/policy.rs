//! Per-network threshold policy: which fraction of total power must be
//! exceeded, and whether reaching it exactly counts.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_TOTAL_TOLERANCE_BPS, MAX_FRACTION_DIGITS};
use crate::error::PolicyError;

/// Exact rational in `(0, 1]`, stored in lowest terms.
///
/// Parsed from `"a/b"` or a plain decimal such as `"0.33"`.
///
/// # Examples
///
/// ```
/// use naka_core::Fraction;
/// let third: Fraction = "2/6".parse().unwrap();
/// assert_eq!((third.numerator(), third.denominator()), (1, 3));
/// let pct: Fraction = "0.33".parse().unwrap();
/// assert_eq!((pct.numerator(), pct.denominator()), (33, 100));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fraction {
    numerator: u64,
    denominator: u64,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

impl Fraction {
    pub fn new(numerator: u64, denominator: u64) -> Result<Self, PolicyError> {
        if numerator == 0 || denominator == 0 || numerator > denominator {
            return Err(PolicyError::InvalidFraction(format!(
                "{numerator}/{denominator} is not in (0, 1]"
            )));
        }
        let g = gcd(numerator, denominator);
        Ok(Self {
            numerator: numerator / g,
            denominator: denominator / g,
        })
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    fn parse_decimal(s: &str) -> Result<Self, PolicyError> {
        let invalid = || PolicyError::InvalidFraction(s.to_string());
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if frac_part.len() > MAX_FRACTION_DIGITS
            || (int_part.is_empty() && frac_part.is_empty())
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let denominator = 10u64.pow(frac_part.len() as u32);
        let int_value: u64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| invalid())?
        };
        let frac_value: u64 = if frac_part.is_empty() {
            0
        } else {
            frac_part.parse().map_err(|_| invalid())?
        };
        let numerator = int_value
            .checked_mul(denominator)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(invalid)?;
        Self::new(numerator, denominator)
    }
}

impl FromStr for Fraction {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('/') {
            Some((n, d)) => {
                let invalid = || PolicyError::InvalidFraction(s.to_string());
                let n: u64 = n.trim().parse().map_err(|_| invalid())?;
                let d: u64 = d.trim().parse().map_err(|_| invalid())?;
                Self::new(n, d)
            }
            None => Self::parse_decimal(s),
        }
    }
}

impl TryFrom<String> for Fraction {
    type Error = PolicyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Fraction> for String {
    fn from(f: Fraction) -> Self {
        f.to_string()
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Boundary rule applied when the running sum meets the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Running sum must exceed the threshold.
    StrictGreater,
    /// Reaching the threshold exactly is enough.
    GreaterOrEqual,
}

impl Comparison {
    /// Whether `running.cmp(threshold)` satisfies this rule.
    pub fn is_satisfied(self, ordering: Ordering) -> bool {
        match self {
            Self::StrictGreater => ordering == Ordering::Greater,
            Self::GreaterOrEqual => ordering != Ordering::Less,
        }
    }
}

impl FromStr for Comparison {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict_greater" | ">" | "gt" => Ok(Self::StrictGreater),
            "greater_or_equal" | ">=" | "ge" | "gte" => Ok(Self::GreaterOrEqual),
            other => Err(PolicyError::UnknownComparison(other.to_string())),
        }
    }
}

/// Threshold fraction plus boundary rule. Configured explicitly per network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    pub fraction: Fraction,
    pub comparison: Comparison,
    /// Allowed relative gap between an asserted total and the summed entries.
    #[serde(default = "default_tolerance_bps")]
    pub total_tolerance_bps: u32,
}

fn default_tolerance_bps() -> u32 {
    DEFAULT_TOTAL_TOLERANCE_BPS
}

impl ThresholdPolicy {
    pub fn new(fraction: Fraction, comparison: Comparison) -> Self {
        Self {
            fraction,
            comparison,
            total_tolerance_bps: DEFAULT_TOTAL_TOLERANCE_BPS,
        }
    }

    pub fn with_total_tolerance_bps(mut self, bps: u32) -> Self {
        self.total_tolerance_bps = bps;
        self
    }
}
