//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry attempt `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `max_ms`, plus up to 10% jitter.
pub fn retry_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponent = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponent).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let d1 = retry_delay(1, 100, 2_000);
        assert!(d1.as_millis() >= 100 && d1.as_millis() <= 110);

        let d3 = retry_delay(3, 100, 2_000);
        assert!(d3.as_millis() >= 400 && d3.as_millis() <= 440);

        let capped = retry_delay(10, 100, 1_000);
        assert!(capped.as_millis() >= 1_000 && capped.as_millis() <= 1_100);
    }

    #[test]
    fn attempt_zero_has_no_delay() {
        assert_eq!(retry_delay(0, 100, 1_000), Duration::ZERO);
    }
}
