//! Centralized error handling for the search gateway
//!
//! # Error Categories
//!
//! - **Repository Errors**: SQLite failures inside the usage ledger and result cache
//! - **Source Errors**: upstream transport and HTTP failures
//! - **Gateway Errors**: the typed failures a search can return to its caller
//!
//! # Usage
//!
//! ```rust
//! use tubesearch::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Repository Results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for Gateway Results
pub type GatewayResult<T> = Result<T, GatewayError>;
