//! Durable stores backing the gateway
//!
//! Both repositories share one SQLite pool and never return errors to the
//! search path: a failed read is treated as empty and a failed write is
//! logged and dropped.

pub mod result_cache;
pub mod usage_ledger;

pub use result_cache::{normalize_query, ResultCache};
pub use usage_ledger::{UsageEventReceiver, UsageEventSender, UsageLedger};
