use chrono::Utc;

/// Wall-clock time in Unix milliseconds.
///
/// All Atelier timestamps (`created_at`, `updated_at`, record timestamps and
/// minted id prefixes) use this unit.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01T00:00:00Z
        assert!(now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn now_is_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
