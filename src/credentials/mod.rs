//! API credentials: the rotation pool and where the key list is persisted
//!
//! The pool is purely in-memory. Loading and saving the key list goes through
//! an injected [`CredentialStore`] so the pool never reads global state.

use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

pub mod pool;
pub mod store;

pub use pool::{CredentialPool, PoolSnapshot};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

/// An opaque API key granting one daily quota allotment
///
/// `Debug` and `Display` print a fingerprint, never the secret.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(Arc<str>);

impl Credential {
    pub fn new<S: AsRef<str>>(secret: S) -> Self {
        Self(Arc::from(secret.as_ref()))
    }

    /// The raw key, for building requests and ledger keys only
    pub fn secret(&self) -> &str {
        &self.0
    }

    /// First 8 hex digits of the key's SHA-256
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", self.fingerprint())
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fingerprint())
    }
}

/// Drop blank entries and surrounding whitespace
pub fn sanitize_keys<I, S>(keys: I) -> Vec<Credential>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    keys.into_iter()
        .map(|key| key.as_ref().trim().to_string())
        .filter(|key| !key.is_empty())
        .map(Credential::new)
        .collect()
}
