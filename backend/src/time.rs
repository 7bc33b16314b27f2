use chrono::{DateTime, Utc};

/// Current wall-clock time in UTC.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Converts a unix timestamp (seconds) into a UTC datetime.
/// Returns `None` for values chrono cannot represent.
pub fn from_unix_secs(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Fractional hours elapsed from `earlier` to `later`.
/// Negative when `earlier` lies in the future.
pub fn hours_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 3_600_000.0
}
