use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Credential;

struct PoolState {
    credentials: Arc<Vec<Credential>>,
    cursor: usize,
    /// Bumped on every replacement so stale rotations can be ignored
    generation: u64,
}

/// Consistent view of the pool taken at the start of a search
#[derive(Debug, Clone)]
pub struct PoolSnapshot {
    pub credentials: Arc<Vec<Credential>>,
    pub start: usize,
    pub generation: u64,
}

impl PoolSnapshot {
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The `attempt`-th credential walking forward from the cursor
    pub fn slot(&self, attempt: usize) -> Option<(usize, &Credential)> {
        if self.credentials.is_empty() {
            return None;
        }
        let index = (self.start + attempt) % self.credentials.len();
        self.credentials.get(index).map(|credential| (index, credential))
    }
}

/// Ordered credential list plus the rotation cursor
///
/// All state sits behind one mutex. Callers never hold it across a network
/// request: they take a [`PoolSnapshot`], run the attempt, then report back
/// with [`CredentialPool::advance_past`].
pub struct CredentialPool {
    state: Mutex<PoolState>,
}

impl Default for CredentialPool {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                credentials: Arc::new(credentials),
                cursor: 0,
                generation: 0,
            }),
        }
    }

    /// Replace the pool and reset the cursor. An empty list is rejected and
    /// the previous state kept.
    pub async fn set_credentials(&self, credentials: Vec<Credential>) -> bool {
        if credentials.is_empty() {
            warn!("Attempted to set an empty credential list; keeping the current pool");
            return false;
        }

        let mut state = self.state.lock().await;
        let count = credentials.len();
        state.credentials = Arc::new(credentials);
        state.cursor = 0;
        state.generation += 1;
        info!(count, "Credential pool replaced");
        true
    }

    pub async fn credentials(&self) -> Vec<Credential> {
        self.state.lock().await.credentials.as_ref().clone()
    }

    /// Credential at the cursor, `None` when the pool is empty
    pub async fn current(&self) -> Option<Credential> {
        let state = self.state.lock().await;
        state.credentials.get(state.cursor).cloned()
    }

    pub async fn count(&self) -> usize {
        self.state.lock().await.credentials.len()
    }

    pub async fn current_index(&self) -> usize {
        self.state.lock().await.cursor
    }

    /// Unconditional step to the next credential; no-op on an empty pool
    pub async fn advance(&self) {
        let mut state = self.state.lock().await;
        let count = state.credentials.len();
        if count == 0 {
            return;
        }
        state.cursor = (state.cursor + 1) % count;
    }

    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        PoolSnapshot {
            credentials: Arc::clone(&state.credentials),
            start: state.cursor,
            generation: state.generation,
        }
    }

    /// Rotate past `index` after a concluded failed attempt.
    ///
    /// Only moves the cursor if it still points at `index` in the same pool
    /// generation, so two callers failing on the same credential rotate once.
    pub async fn advance_past(&self, index: usize, generation: u64) -> bool {
        let mut state = self.state.lock().await;
        let count = state.credentials.len();
        if count == 0 || state.generation != generation || state.cursor != index {
            debug!(
                index,
                cursor = state.cursor,
                "Cursor already moved by another caller; not rotating"
            );
            return false;
        }
        state.cursor = (index + 1) % count;
        true
    }
}
