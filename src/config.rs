//! Global configuration for svanno runtime behavior.
//!
//! Holds switches that affect interval semantics without threading a
//! settings struct through every hot loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag for strict half-open overlap of zero-length variant spans.
///
/// Breakends (and any variant whose stop equals its start) occupy no bases
/// under strict half-open semantics and could never overlap a feature. By
/// default such spans are widened to 1bp (`stop = start + 1`) before
/// feature-overlap tests. Setting strict mode disables the widening.
///
/// This is set once at startup and read during annotation.
static STRICT_INTERVALS: AtomicBool = AtomicBool::new(false);

/// Enable or disable strict zero-length semantics.
///
/// # Example
///
/// ```
/// use svanno::config;
///
/// config::set_strict_intervals(true);
/// assert_eq!(config::normalize_stop(500, 500), 500);
/// config::set_strict_intervals(false);
/// assert_eq!(config::normalize_stop(500, 500), 501);
/// ```
#[inline]
pub fn set_strict_intervals(enabled: bool) {
    STRICT_INTERVALS.store(enabled, Ordering::Release);
}

/// Check if strict zero-length semantics are enabled.
#[inline]
pub fn is_strict_intervals() -> bool {
    STRICT_INTERVALS.load(Ordering::Acquire)
}

/// Normalize a variant stop coordinate for overlap testing.
///
/// Returns `start + 1` for zero-length spans unless strict mode is on.
#[inline]
pub fn normalize_stop(start: u64, stop: u64) -> u64 {
    if !is_strict_intervals() && stop <= start {
        start + 1
    } else {
        stop
    }
}
