use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::AppResult;

/// Where the API key list lives between runs
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Saved keys, blank entries removed; an absent store yields an empty list
    async fn load(&self) -> AppResult<Vec<String>>;

    async fn save(&self, keys: &[String]) -> AppResult<()>;
}

/// Comma-separated key list in a single file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> AppResult<Vec<String>> {
        if !fs::try_exists(&self.path).await? {
            debug!("No credential file at {}", self.path.display());
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).await?;
        Ok(split_keys(&contents))
    }

    async fn save(&self, keys: &[String]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(&self.path, keys.join(",")).await?;
        Ok(())
    }
}

/// In-process store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    keys: RwLock<Vec<String>>,
}

impl MemoryCredentialStore {
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: RwLock::new(keys.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> AppResult<Vec<String>> {
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|k| !k.trim().is_empty())
            .cloned()
            .collect())
    }

    async fn save(&self, keys: &[String]) -> AppResult<()> {
        *self.keys.write().await = keys.to_vec();
        Ok(())
    }
}

fn split_keys(contents: &str) -> Vec<String> {
    contents
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}
