use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which path produced a record
///
/// Set by the gateway on every record it returns. Never persisted: a record
/// read back from the cache is re-tagged `FromCache` by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FromCache,
    #[default]
    FromUpstream,
    Synthetic,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::FromCache => "cache",
            Provenance::FromUpstream => "api",
            Provenance::Synthetic => "test",
        }
    }
}

/// One video returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub thumbnail_url: String,
    pub published_at: DateTime<Utc>,
    /// `HH:MM:SS`; the search endpoint does not report it, so upstream records carry zeros
    pub duration: String,
    pub view_count: u64,
    #[serde(skip)]
    pub provenance: Provenance,
}

impl ResultRecord {
    pub fn video_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Tag every record and cut the sequence to `max_results`
pub fn tag_and_truncate(
    records: Vec<ResultRecord>,
    provenance: Provenance,
    max_results: usize,
) -> Vec<ResultRecord> {
    records
        .into_iter()
        .take(max_results)
        .map(|record| record.with_provenance(provenance))
        .collect()
}

/// A stored search-cache row
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub normalized_query: String,
    pub results: Vec<ResultRecord>,
    pub created_at: DateTime<Utc>,
}

/// A stored thumbnail row
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailEntry {
    pub url: String,
    pub image_data: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

/// Row counts for the two caches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub search_entries: u64,
    pub thumbnail_entries: u64,
    pub thumbnail_bytes: u64,
}
