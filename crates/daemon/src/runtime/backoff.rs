//! Retry backoff policy.

use std::time::Duration;

/// Delay before the next cycle after `failures` consecutive failures.
///
/// Doubles from the base per failure and caps at `max_sec`. Failures
/// retry indefinitely; there is no hard cutoff that parks an agent.
pub fn backoff_delay(base_sec: u64, max_sec: u64, failures: u32) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }
    let factor = 1u64.checked_shl(failures - 1).unwrap_or(u64::MAX);
    let secs = base_sec.saturating_mul(factor).min(max_sec);
    Duration::from_secs(secs)
}
