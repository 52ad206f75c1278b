use serde::Serialize;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime, Time};

pub const HOUR_MS: u64 = 3_600_000;

/// Accounting period that trade counts and realized PnL accumulate over.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyBucket {
    pub key: String,
    pub cumulative_pnl: f64,
    pub trade_count: u64,
}

impl DailyBucket {
    /// Adopts the bucket key for `now_ms`. Returns `true` when the key changed,
    /// in which case the counters are zeroed.
    pub fn roll(&mut self, now_ms: u64, reset_hour_utc: u8) -> bool {
        let key = bucket_key(now_ms, reset_hour_utc);
        if self.key == key {
            return false;
        }

        self.key = key;
        self.clear_counters();
        true
    }

    pub fn clear_counters(&mut self) {
        self.cumulative_pnl = 0.0;
        self.trade_count = 0;
    }

    pub fn add_pnl(&mut self, pnl: f64) {
        self.cumulative_pnl += pnl;
    }

    pub fn add_trade(&mut self) {
        self.trade_count = self.trade_count.saturating_add(1);
    }
}

/// Bucket identifier `YYYY-MM-DD@H` for the period containing `now_ms`.
///
/// A period starts at `reset_hour_utc` on its date, so instants before the
/// reset hour belong to the previous day's bucket.
pub fn bucket_key(now_ms: u64, reset_hour_utc: u8) -> String {
    let shifted = utc_datetime(now_ms)
        .checked_sub(Duration::hours(i64::from(reset_hour_utc)))
        .unwrap_or_else(|| utc_datetime(now_ms));
    let date = shifted.date();

    format!(
        "{:04}-{:02}-{:02}@{reset_hour_utc}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

pub fn utc_datetime(ts_ms: u64) -> OffsetDateTime {
    let nanos = i128::from(ts_ms) * 1_000_000;
    // Timestamps beyond the supported calendar range all map to its last day.
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .unwrap_or_else(|_| PrimitiveDateTime::new(Date::MAX, Time::MIDNIGHT).assume_utc())
}

#[cfg(test)]
mod tests {
    use super::{bucket_key, DailyBucket, HOUR_MS};

    // 2024-05-01T00:00:00Z
    const MAY_FIRST_MS: u64 = 1_714_521_600_000;

    #[test]
    fn key_uses_utc_date_at_midnight_reset() {
        assert_eq!(bucket_key(MAY_FIRST_MS, 0), "2024-05-01@0");
        assert_eq!(bucket_key(MAY_FIRST_MS + 23 * HOUR_MS, 0), "2024-05-01@0");
        assert_eq!(bucket_key(MAY_FIRST_MS + 24 * HOUR_MS, 0), "2024-05-02@0");
    }

    #[test]
    fn instants_before_reset_hour_belong_to_previous_day() {
        assert_eq!(bucket_key(MAY_FIRST_MS + 7 * HOUR_MS, 8), "2024-04-30@8");
        assert_eq!(bucket_key(MAY_FIRST_MS + 8 * HOUR_MS, 8), "2024-05-01@8");
    }

    #[test]
    fn roll_reports_change_exactly_once_per_boundary() {
        let mut bucket = DailyBucket::default();
        assert!(bucket.roll(MAY_FIRST_MS, 0));

        bucket.add_pnl(12.5);
        bucket.add_trade();
        assert!(!bucket.roll(MAY_FIRST_MS + HOUR_MS, 0));
        assert!(!bucket.roll(MAY_FIRST_MS + 20 * HOUR_MS, 0));
        assert_eq!(bucket.trade_count, 1);
        assert_eq!(bucket.cumulative_pnl, 12.5);

        assert!(bucket.roll(MAY_FIRST_MS + 24 * HOUR_MS, 0));
        assert!(!bucket.roll(MAY_FIRST_MS + 25 * HOUR_MS, 0));
        assert_eq!(bucket.trade_count, 0);
        assert_eq!(bucket.cumulative_pnl, 0.0);
        assert_eq!(bucket.key, "2024-05-02@0");
    }
}
