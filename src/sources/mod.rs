//! Upstream search providers

pub mod youtube;

pub use youtube::{parse_search_response, SearchTransport, UpstreamResponse, YouTubeClient};
