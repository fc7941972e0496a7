use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Absolute expiry for a value written now and kept `max_age_seconds`
pub fn expires_after(max_age_seconds: u64) -> DateTime<Utc> {
    let secs = i64::try_from(max_age_seconds).unwrap_or(i64::MAX);
    TimeDelta::try_seconds(secs)
        .and_then(|delta| Utc::now().checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn get_instant() -> Instant {
    Instant::now()
}
