//! Shared constants. Durations are in seconds unless the name says otherwise.

/// Value returned by [`CoefficientStore::get_previous`](crate::traits::CoefficientStore::get_previous)
/// when no prior coefficient is stored or the read fails.
pub const PREVIOUS_SENTINEL: i64 = -1;

/// Denominator for basis-point quantities (1 bps = 1/10_000).
pub const BPS_PRECISION: u64 = 10_000;

/// Default relative tolerance between an asserted total and the summed entries.
pub const DEFAULT_TOTAL_TOLERANCE_BPS: u32 = 500;

/// Extra decimal digits used when `total * fraction` is not exactly representable.
///
/// Only affects the reported `threshold_value`; comparisons are always exact.
pub const THRESHOLD_DISPLAY_DIGITS: u32 = 18;

/// Maximum number of fractional digits accepted when parsing a decimal fraction,
/// so that the denominator fits in a `u64`.
pub const MAX_FRACTION_DIGITS: usize = 18;

/// Refresh period between scheduled cycles (6 hours).
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 6 * 60 * 60;

/// Upper bound on a single network's collect + compute job.
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 10;

/// Upper bound on a whole refresh cycle.
pub const DEFAULT_CYCLE_DEADLINE_SECS: u64 = 120;

/// Simultaneous outbound collector calls per cycle.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 16;

/// Default HTTP port for the query surface.
pub const DEFAULT_HTTP_PORT: u16 = 8080;
