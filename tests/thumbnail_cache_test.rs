mod common;

use common::{spawn_provider, CHUNKED_PARTS, PNG_BYTES};
use tubesearch::{
    config::Config, database::Database, repositories::ResultCache, services::ThumbnailService,
};

#[tokio::test]
async fn test_thumbnail_downloaded_once_then_served_from_cache() {
    let provider = spawn_provider().await;
    let db = Database::in_memory().await.unwrap();
    let cache = ResultCache::new(db.pool());
    let service = ThumbnailService::new(cache.clone(), &Config::default().thumbnails).unwrap();
    let url = provider.url("/vi/thumb.png");

    assert_eq!(service.fetch(&url).await.as_deref(), Some(PNG_BYTES));
    assert_eq!(service.fetch(&url).await.as_deref(), Some(PNG_BYTES));

    assert_eq!(provider.state.thumbnail_hits(), 1);
    assert_eq!(cache.stats().await.thumbnail_entries, 1);
}

#[tokio::test]
async fn test_non_image_body_is_not_cached() {
    let provider = spawn_provider().await;
    let db = Database::in_memory().await.unwrap();
    let cache = ResultCache::new(db.pool());
    let service = ThumbnailService::new(cache.clone(), &Config::default().thumbnails).unwrap();
    let url = provider.url("/vi/missing.png");

    assert!(service.fetch(&url).await.is_none());
    assert!(service.fetch(&url).await.is_none());

    assert_eq!(provider.state.thumbnail_hits(), 2);
    assert!(cache.lookup_thumbnail(&url).await.is_none());
}

#[tokio::test]
async fn test_oversized_thumbnail_is_rejected() {
    let provider = spawn_provider().await;
    let db = Database::in_memory().await.unwrap();
    let mut config = Config::default().thumbnails;
    config.max_bytes = 4;
    let service = ThumbnailService::new(ResultCache::new(db.pool()), &config).unwrap();

    assert!(service.fetch(&provider.url("/vi/thumb.png")).await.is_none());
}

#[tokio::test]
async fn test_size_cap_applies_to_chunked_body() {
    let provider = spawn_provider().await;
    let db = Database::in_memory().await.unwrap();
    let cache = ResultCache::new(db.pool());
    let url = provider.url("/vi/chunked.png");
    let full_size = PNG_BYTES.len() * CHUNKED_PARTS;

    let mut config = Config::default().thumbnails;
    config.max_bytes = full_size - 1;
    let capped = ThumbnailService::new(cache.clone(), &config).unwrap();
    assert!(capped.fetch(&url).await.is_none());
    assert!(cache.lookup_thumbnail(&url).await.is_none());

    config.max_bytes = full_size;
    let service = ThumbnailService::new(cache.clone(), &config).unwrap();
    let bytes = service.fetch(&url).await.unwrap();
    assert_eq!(bytes.len(), full_size);
    assert!(bytes.starts_with(PNG_BYTES));
    assert_eq!(provider.state.thumbnail_hits(), 2);
}
