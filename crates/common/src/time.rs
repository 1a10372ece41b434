use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch. Clock errors collapse to zero.
#[must_use]
pub fn now_ms() -> u64 {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }
}
