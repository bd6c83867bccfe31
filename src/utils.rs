//! Shared utility functions
//! Timestamps and record id generation used across the codebase

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds
/// Consistent implementation used throughout the codebase
#[inline]
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Synthesize a record id: kind prefix, millisecond timestamp, random suffix.
/// The suffix keeps ids unique when records are created in the same millisecond.
#[must_use]
pub fn new_record_id(kind: &str) -> String {
    use rand::Rng;
    let suffix: u16 = rand::thread_rng().gen();
    format!("{}_{}_{:04x}", kind, now_ms(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms() {
        let ts = now_ms();
        // Should be after 2024
        assert!(ts > 1_704_067_200_000);
    }

    #[test]
    fn test_record_ids_distinct_in_tight_loop() {
        let ids: std::collections::HashSet<String> =
            (0..64).map(|_| new_record_id("mem")).collect();
        assert!(ids.len() > 1);
        assert!(ids.iter().all(|id| id.starts_with("mem_")));
    }
}
