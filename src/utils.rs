//! Utility functions shared across the gateway
//!
//! - `utils::datetime` for UTC day keys and stored timestamps

pub mod datetime;

pub use datetime::{day_key, DayClock, FixedClock, SystemClock};
