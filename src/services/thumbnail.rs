use futures::StreamExt;
use image::ImageFormat;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ThumbnailConfig;
use crate::errors::AppResult;
use crate::repositories::ResultCache;

/// Cache-first thumbnail bytes for result display
///
/// Any failure yields `None` and the caller shows a placeholder. Only bytes
/// that sniff as a known image format are cached.
pub struct ThumbnailService {
    client: Client,
    cache: ResultCache,
    max_bytes: usize,
}

impl ThumbnailService {
    pub fn new(cache: ResultCache, config: &ThumbnailConfig) -> AppResult<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            cache,
            max_bytes: config.max_bytes,
        })
    }

    pub async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        if url.is_empty() {
            return None;
        }

        if let Some(bytes) = self.cache.lookup_thumbnail(url).await {
            debug!("Thumbnail cache hit: {}", url);
            return Some(bytes);
        }

        let bytes = self.download(url).await?;
        let Some(format) = sniff_image_format(&bytes) else {
            warn!("Thumbnail at {} is not a recognizable image", url);
            return None;
        };

        debug!("Downloaded {:?} thumbnail {} ({} bytes)", format, url, bytes.len());
        self.cache.store_thumbnail(url, &bytes).await;
        Some(bytes)
    }

    async fn download(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Failed to download thumbnail {}: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Thumbnail {} returned HTTP {}", url, response.status());
            return None;
        }

        if let Some(length) = response.content_length() {
            if length > self.max_bytes as u64 {
                warn!("Thumbnail {} too large ({} bytes)", url, length);
                return None;
            }
        }

        // Chunked responses carry no length, so the cap is enforced per chunk
        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!("Failed to read thumbnail body {}: {}", url, e);
                    return None;
                }
            };

            if body.len() + chunk.len() > self.max_bytes {
                warn!(
                    "Thumbnail {} exceeds {} bytes, abandoning download",
                    url, self.max_bytes
                );
                return None;
            }
            body.extend_from_slice(&chunk);
        }

        if body.is_empty() {
            None
        } else {
            Some(body)
        }
    }
}

/// Image format from magic bytes, `None` for anything the image crate does not recognize
pub fn sniff_image_format(data: &[u8]) -> Option<ImageFormat> {
    image::guess_format(data).ok()
}
