//! Randomized inter-action delays for detection avoidance.
//!
//! Timings are jittered so request cadence does not look mechanical.

use std::time::Duration;

/// Sleep for a uniformly jittered duration in `[min, max]`.
pub async fn sleep_between(min: Duration, max: Duration) {
    tokio::time::sleep(duration_between(min, max)).await;
}

/// Pick a duration in `[min, max]`. Degenerate ranges collapse to `min`.
pub fn duration_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span_ms = (max - min).as_millis() as u64;
    min + Duration::from_millis(jitter_ms(span_ms + 1))
}

/// Pick a random index into a collection of `len` elements.
/// Returns 0 for an empty collection.
pub fn random_index(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (jitter_ms(len as u64)) as usize
}

// Clock-seeded xorshift, good enough for pacing but not crypto.
fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}
