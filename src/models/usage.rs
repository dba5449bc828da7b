use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One `(credential, day)` row of the usage ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub credential: String,
    pub day: NaiveDate,
    pub call_count: u32,
    pub exhausted: bool,
}

/// Change notification published by the usage ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageEvent {
    CallCounted {
        fingerprint: String,
        day: NaiveDate,
        call_count: u32,
    },
    Exhausted {
        fingerprint: String,
        day: NaiveDate,
    },
    Cleared,
}

/// Diagnostics view of one pool credential for a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialUsage {
    pub index: usize,
    pub fingerprint: String,
    pub call_count: u32,
    pub exhausted: bool,
    pub remaining: u32,
    pub is_current: bool,
}
