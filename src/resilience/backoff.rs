//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Upper bound on any single delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before the attempt following `attempt` (1-based).
///
/// A zero `base` yields zero: retries are immediate.
pub fn calculate_backoff(attempt: u32, base: Duration) -> Duration {
    if attempt == 0 || base.is_zero() {
        return Duration::ZERO;
    }

    let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
    let delay = base
        .checked_mul(factor)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF);

    // Up to 10% jitter on top
    let jitter = delay / 10;
    if jitter.is_zero() {
        return delay;
    }
    delay + rand::thread_rng().gen_range(Duration::ZERO..jitter)
}
