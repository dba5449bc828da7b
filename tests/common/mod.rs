#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tubesearch::config::{Config, YouTubeConfig};

pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

/// How the mock provider answers a given API key
#[derive(Clone)]
pub enum KeyBehavior {
    Videos(Vec<String>),
    Status(u16),
    Stall(Duration),
}

#[derive(Default)]
pub struct MockState {
    behaviors: Mutex<HashMap<String, KeyBehavior>>,
    search_calls: Mutex<Vec<HashMap<String, String>>>,
    thumbnail_hits: Mutex<usize>,
}

impl MockState {
    pub fn set(&self, key: &str, behavior: KeyBehavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(key.to_string(), behavior);
    }

    pub fn search_calls(&self) -> Vec<HashMap<String, String>> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn keys_used(&self) -> Vec<String> {
        self.search_calls()
            .into_iter()
            .map(|params| params.get("key").cloned().unwrap_or_default())
            .collect()
    }

    pub fn thumbnail_hits(&self) -> usize {
        *self.thumbnail_hits.lock().unwrap()
    }
}

pub struct MockProvider {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockProvider {
    pub fn search_url(&self) -> String {
        format!("http://{}/youtube/v3/search", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn youtube_config(&self, daily_quota: u32) -> YouTubeConfig {
        YouTubeConfig {
            api_base_url: self.search_url(),
            daily_quota,
            request_timeout_secs: 1,
            ..Config::default().youtube
        }
    }
}

fn search_body(ids: &[String]) -> String {
    let items: Vec<_> = ids
        .iter()
        .map(|id| {
            json!({
                "kind": "youtube#searchResult",
                "id": {"kind": "youtube#video", "videoId": id},
                "snippet": {
                    "publishedAt": "2019-05-01T10:00:00Z",
                    "title": format!("Video {id}"),
                    "description": "",
                    "channelTitle": "Mock Channel",
                    "thumbnails": {"medium": {"url": format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg")}}
                }
            })
        })
        .collect();
    json!({"kind": "youtube#searchListResponse", "items": items}).to_string()
}

async fn search(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.search_calls.lock().unwrap().push(params.clone());

    let key = params.get("key").cloned().unwrap_or_default();
    let behavior = state
        .behaviors
        .lock()
        .unwrap()
        .get(&key)
        .cloned()
        .unwrap_or_else(|| KeyBehavior::Videos(vec!["v1".into(), "v2".into(), "v3".into()]));

    match behavior {
        KeyBehavior::Videos(ids) => (StatusCode::OK, search_body(&ids)),
        KeyBehavior::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            json!({"error": {"code": code, "message": "quotaExceeded"}}).to_string(),
        ),
        KeyBehavior::Stall(delay) => {
            tokio::time::sleep(delay).await;
            (StatusCode::OK, search_body(&[]))
        }
    }
}

async fn thumbnail(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    *state.thumbnail_hits.lock().unwrap() += 1;
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES.to_vec())
}

/// PNG bytes repeated over several chunks with no Content-Length
pub const CHUNKED_PARTS: usize = 3;

async fn chunked_thumbnail(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    *state.thumbnail_hits.lock().unwrap() += 1;
    let chunks = (0..CHUNKED_PARTS).map(|_| Ok::<_, std::io::Error>(Bytes::from_static(PNG_BYTES)));
    (
        [(header::CONTENT_TYPE, "image/png")],
        Body::from_stream(futures::stream::iter(chunks)),
    )
}

async fn not_an_image(State(state): State<Arc<MockState>>) -> impl IntoResponse {
    *state.thumbnail_hits.lock().unwrap() += 1;
    ([(header::CONTENT_TYPE, "text/html")], "<html>gone</html>")
}

pub async fn spawn_provider() -> MockProvider {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/youtube/v3/search", get(search))
        .route("/vi/thumb.png", get(thumbnail))
        .route("/vi/missing.png", get(not_an_image))
        .route("/vi/chunked.png", get(chunked_thumbnail))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider { addr, state }
}
