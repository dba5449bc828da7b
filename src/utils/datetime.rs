//! UTC day keys and timestamp helpers
//!
//! Usage records are keyed by calendar day in UTC. The day key is the only
//! quota reset mechanism: a new day produces a new key and therefore a fresh
//! record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Source of "today" for quota bookkeeping
pub trait DayClock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl DayClock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one day, for tests and replay
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl DayClock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Format a day as its storage key (`YYYY-MM-DD`)
pub fn day_key(day: NaiveDate) -> String {
    day.format(DAY_KEY_FORMAT).to_string()
}

/// Format a timestamp for storage; fixed width so stored values sort as text
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a stored timestamp, accepting RFC 3339 or SQLite's `YYYY-MM-DD HH:MM:SS`
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
}
