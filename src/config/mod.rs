use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub youtube: YouTubeConfig,
    pub credentials: CredentialsConfig,
    pub thumbnails: ThumbnailConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    pub api_base_url: String,
    /// Counted calls allowed per credential per UTC day
    pub daily_quota: u32,
    pub request_timeout_secs: u64,
    pub default_max_results: u32,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub key_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    pub request_timeout_secs: u64,
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Six-field cron expression (seconds first)
    pub prune_cron: String,
    pub usage_retention_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_cache_max_age_days: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/tubesearch.db".to_string(),
                max_connections: Some(5),
            },
            youtube: YouTubeConfig {
                api_base_url: "https://www.googleapis.com/youtube/v3/search".to_string(),
                daily_quota: 10_000,
                request_timeout_secs: 15,
                default_max_results: 5,
                user_agent: format!("tubesearch/{}", env!("CARGO_PKG_VERSION")),
            },
            credentials: CredentialsConfig {
                key_file: PathBuf::from("./data/api_keys.env"),
            },
            thumbnails: ThumbnailConfig {
                request_timeout_secs: 10,
                max_bytes: 2 * 1024 * 1024,
            },
            maintenance: MaintenanceConfig {
                prune_cron: "0 15 3 * * *".to_string(),
                usage_retention_days: 7,
                search_cache_max_age_days: None,
            },
        }
    }
}

impl YouTubeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ThumbnailConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load from `CONFIG_FILE` (default `config.toml`), writing defaults on first run
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(&config_file)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::create_dir_all("./data")?;
            std::fs::write(path, contents)?;
            Ok(default_config)
        }
    }
}
