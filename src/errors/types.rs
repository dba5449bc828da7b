//! Error type definitions for the search gateway
//!
//! Only [`GatewayError`] crosses the gateway boundary. Repository and source
//! errors are produced by the layers below it and absorbed there: the ledger
//! and cache degrade to safe defaults, and upstream failures drive key
//! rotation instead of surfacing per attempt.

use thiserror::Error;

/// Top-level application error type
///
/// Used by startup wiring and the binary. Library operations on the search
/// path return the narrower types below.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Upstream source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Gateway errors surfaced to callers
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction errors
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Store layer errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Cached payload could not be (de)serialized
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Upstream search endpoint errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// The request did not complete within the configured timeout
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Connection refused, DNS failure, reset and similar transport faults
    #[error("Network error: {message}")]
    Network { message: String },

    /// Non-success HTTP status from the provider
    #[error("HTTP error: {status} - {message}")]
    Http { status: u16, message: String },

    /// Success status but the body was not a search-result document
    #[error("Parse error: {source_type} - {message}")]
    ParseError { source_type: String, message: String },
}

/// Errors returned by [`crate::services::Gateway::search`]
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Every credential in the pool was skipped or failed within one call
    #[error("All {attempted} API credentials are exhausted or failing")]
    ExhaustedPool { attempted: usize },

    /// The provider answered with a success status and an unreadable body
    #[error("Malformed upstream response: {message}")]
    MalformedResponse { message: String },

    /// The caller's cancellation token fired before an attempt concluded
    #[error("Search cancelled")]
    Cancelled,
}

impl RepositoryError {
    /// Create a query failed error
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        Self::query_failed("sqlite", err.to_string())
    }
}

impl SourceError {
    /// Create a timeout error
    pub fn timeout<U: Into<String>>(url: U) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Create a network error
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse_error<S: Into<String>, M: Into<String>>(source_type: S, message: M) -> Self {
        Self::ParseError {
            source_type: source_type.into(),
            message: message.into(),
        }
    }

    /// Map a reqwest failure onto the transport taxonomy
    pub fn from_reqwest(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            Self::timeout(url)
        } else if let Some(status) = err.status() {
            Self::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::network(err.to_string())
        }
    }
}

impl GatewayError {
    /// True when the caller should stop a batch rather than retry the next query
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedPool { .. })
    }
}
