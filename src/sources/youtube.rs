//! YouTube Data API v3 search endpoint
//!
//! The transport only performs the HTTP exchange and reports the status and
//! body. Deciding what a status means for quota and rotation belongs to the
//! gateway, so a 403 is a successful transport call here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::YouTubeConfig;
use crate::credentials::Credential;
use crate::errors::{AppResult, SourceError, SourceResult};
use crate::models::{Provenance, ResultRecord};

/// Provider limit on `maxResults` for a single search page
pub const MAX_RESULTS_PER_REQUEST: u32 = 50;

const UPSTREAM_DURATION: &str = "00:00:00";

/// Status and raw body of one upstream exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 and 403 mean the key is invalid or out of quota for the day
    pub fn is_auth_or_quota_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// One live search request against the provider
///
/// `Err` means the exchange did not complete (timeout, connection failure)
/// and the call may never have reached the provider.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        max_results: u32,
    ) -> SourceResult<UpstreamResponse>;
}

pub struct YouTubeClient {
    client: Client,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(config: &YouTubeConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    /// Request URL for a search; the API key is one of the query parameters
    pub fn build_search_url(
        &self,
        credential: &Credential,
        query: &str,
        max_results: u32,
    ) -> SourceResult<Url> {
        let max_results = max_results.clamp(1, MAX_RESULTS_PER_REQUEST).to_string();
        Url::parse_with_params(
            &self.base_url,
            &[
                ("key", credential.secret()),
                ("part", "snippet"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("type", "video"),
            ],
        )
        .map_err(|e| SourceError::network(format!("Invalid API base URL {}: {}", self.base_url, e)))
    }
}

#[async_trait]
impl SearchTransport for YouTubeClient {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        max_results: u32,
    ) -> SourceResult<UpstreamResponse> {
        let url = self.build_search_url(credential, query, max_results)?;
        debug!(credential = %credential, query, "Requesting YouTube search");

        // the full URL carries the key, so errors are reported against the base URL
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::from_reqwest(e.without_url(), &self.base_url))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::from_reqwest(e.without_url(), &self.base_url))?;

        debug!(credential = %credential, status, bytes = body.len(), "YouTube search answered");
        Ok(UpstreamResponse { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: Option<SearchItemId>,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    channel_title: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    #[serde(default)]
    url: Option<String>,
}

impl Thumbnails {
    fn best_url(&self) -> String {
        [&self.high, &self.medium, &self.default]
            .into_iter()
            .flatten()
            .filter_map(|t| t.url.as_deref())
            .find(|url| !url.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Map a 2xx search body onto result records
///
/// Items without a video id (channels, playlists) or without a snippet are
/// skipped. Null text fields read as empty strings. View count
/// and duration are not part of the search payload and default to zero.
pub fn parse_search_response(body: &str) -> SourceResult<Vec<ResultRecord>> {
    let parsed: SearchListResponse = serde_json::from_str(body)
        .map_err(|e| SourceError::parse_error("youtube", e.to_string()))?;

    let now = Utc::now();
    let records = parsed
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id?.video_id.filter(|id| !id.is_empty())?;
            let snippet = item.snippet?;
            let published_at = snippet
                .published_at
                .as_deref()
                .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now);

            Some(ResultRecord {
                video_id,
                title: snippet.title.unwrap_or_default(),
                description: snippet.description.unwrap_or_default(),
                channel_title: snippet.channel_title.unwrap_or_default(),
                thumbnail_url: snippet
                    .thumbnails
                    .map(|thumbnails| thumbnails.best_url())
                    .unwrap_or_default(),
                published_at,
                duration: UPSTREAM_DURATION.to_string(),
                view_count: 0,
                provenance: Provenance::FromUpstream,
            })
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = r#"{
        "kind": "youtube#searchListResponse",
        "items": [
            {
                "id": {"kind": "youtube#video", "videoId": "fJ9rUzIMcZQ"},
                "snippet": {
                    "publishedAt": "2008-08-01T11:06:40Z",
                    "title": "Queen - Bohemian Rhapsody",
                    "description": "Official video",
                    "channelTitle": "Queen Official",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/default.jpg"},
                        "medium": {"url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/mqdefault.jpg"},
                        "high": {"url": "https://i.ytimg.com/vi/fJ9rUzIMcZQ/hqdefault.jpg"}
                    }
                }
            },
            {
                "id": {"kind": "youtube#channel", "channelId": "UCiMhD4jzUqG-IgPzUmmytRQ"},
                "snippet": {"title": "Queen Official"}
            },
            {
                "id": {"kind": "youtube#video", "videoId": "abc123"},
                "snippet": {
                    "publishedAt": "not a date",
                    "title": "Cover",
                    "thumbnails": {"default": {"url": "https://i.ytimg.com/vi/abc123/default.jpg"}}
                }
            }
        ]
    }"#;

    fn client(base_url: &str) -> YouTubeClient {
        let config = YouTubeConfig {
            api_base_url: base_url.to_string(),
            ..crate::config::Config::default().youtube
        };
        YouTubeClient::new(&config).unwrap()
    }

    #[test]
    fn test_parse_search_response() {
        let records = parse_search_response(SAMPLE).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.video_id, "fJ9rUzIMcZQ");
        assert_eq!(first.title, "Queen - Bohemian Rhapsody");
        assert_eq!(first.channel_title, "Queen Official");
        assert_eq!(
            first.thumbnail_url,
            "https://i.ytimg.com/vi/fJ9rUzIMcZQ/hqdefault.jpg"
        );
        assert_eq!(
            first.published_at,
            Utc.with_ymd_and_hms(2008, 8, 1, 11, 6, 40).unwrap()
        );
        assert_eq!(first.view_count, 0);
        assert_eq!(first.duration, "00:00:00");

        let second = &records[1];
        assert_eq!(second.thumbnail_url, "https://i.ytimg.com/vi/abc123/default.jpg");
        assert!(second.description.is_empty());
        assert!((Utc::now() - second.published_at).num_seconds().abs() < 60);
    }

    #[test]
    fn test_parse_empty_and_malformed() {
        assert!(parse_search_response(r#"{"items": []}"#).unwrap().is_empty());
        assert!(parse_search_response(r#"{"kind": "x"}"#).unwrap().is_empty());

        let err = parse_search_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, SourceError::ParseError { .. }));
        assert!(parse_search_response(r#"{"items": 5}"#).is_err());
    }

    #[test]
    fn test_null_snippet_fields_read_as_empty() {
        let body = r#"{"items": [
            {"id": {"videoId": "good"}, "snippet": {"title": "Good", "description": "fine", "channelTitle": "C"}},
            {"id": {"videoId": "nulls"}, "snippet": {"title": "Nulls", "description": null, "channelTitle": null, "thumbnails": null}}
        ]}"#;

        let records = parse_search_response(body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "fine");
        assert_eq!(records[1].video_id, "nulls");
        assert_eq!(records[1].title, "Nulls");
        assert!(records[1].description.is_empty());
        assert!(records[1].channel_title.is_empty());
        assert!(records[1].thumbnail_url.is_empty());
    }

    #[test]
    fn test_item_without_snippet_is_skipped() {
        let records = parse_search_response(r#"{"items":[{"id":{"videoId":"nosnip"}}]}"#).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_build_search_url() {
        let client = client("https://www.googleapis.com/youtube/v3/search");
        let url = client
            .build_search_url(&Credential::new("KEY"), "queen & bowie", 500)
            .unwrap();

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["key"], "KEY");
        assert_eq!(params["part"], "snippet");
        assert_eq!(params["maxResults"], "50");
        assert_eq!(params["q"], "queen & bowie");
        assert_eq!(params["type"], "video");

        let url = client
            .build_search_url(&Credential::new("KEY"), "q", 0)
            .unwrap();
        assert!(url.query_pairs().any(|(k, v)| k == "maxResults" && v == "1"));
    }

    #[test]
    fn test_client_build_failure_is_reported() {
        let config = YouTubeConfig {
            user_agent: "bad\nagent".to_string(),
            ..crate::config::Config::default().youtube
        };

        let err = YouTubeClient::new(&config).err().unwrap();
        assert!(matches!(err, crate::errors::AppError::Http(_)));
    }

    #[test]
    fn test_status_classification() {
        let ok = UpstreamResponse { status: 200, body: String::new() };
        let forbidden = UpstreamResponse { status: 403, body: String::new() };
        let unavailable = UpstreamResponse { status: 503, body: String::new() };

        assert!(ok.is_success());
        assert!(forbidden.is_auth_or_quota_failure());
        assert!(!unavailable.is_success());
        assert!(!unavailable.is_auth_or_quota_failure());
    }
}
