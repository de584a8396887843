use chrono::{DateTime, Utc};

/// Wall clock truncated to milliseconds, the precision the store keeps for
/// `timestamp` columns. Finer values would make cursors disagree with the
/// persisted clustering keys after a round trip.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_truncated_to_whole_milliseconds() {
        let now = now_millis();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
