use chrono::{DateTime, Duration, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Unix-seconds expiry `ttl_seconds` after `from`.
pub fn expiry_after(from: DateTime<Utc>, ttl_seconds: i64) -> i64 {
    (from + Duration::seconds(ttl_seconds)).timestamp()
}
