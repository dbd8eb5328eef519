//! Repository tests
//!
//! Cache-versus-network policy over a fake catalog and an in-memory cache.

mod common;

use std::sync::atomic::Ordering;

use clipdeck::cache::VideoCache;
use clipdeck::error::{DataError, RemoteError};
use clipdeck::models::VideoItem;
use clipdeck::repository::{DefaultVideoRepository, VideoRepository};

use common::{item, repository, FakeCatalog};

#[tokio::test]
async fn test_empty_cache_fetches_once_and_writes_rows() {
    let catalog = FakeCatalog::with_popular(vec![item(1), item(2), item(3)]);
    let (repo, cache) = repository(&catalog);

    let videos = repo.popular_videos().await.unwrap();

    assert_eq!(videos.len(), 3);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len().await.unwrap(), 3);
}

#[tokio::test]
async fn test_populated_cache_skips_network() {
    let catalog = FakeCatalog::with_popular(vec![item(9)]);
    let (repo, cache) = repository(&catalog);
    cache.upsert(item(1)).await.unwrap();
    cache.upsert(item(2)).await.unwrap();

    let videos = repo.popular_videos().await.unwrap();

    assert_eq!(videos, vec![item(1), item(2)]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_read_is_served_from_cache() {
    let catalog = FakeCatalog::with_popular(vec![item(1), item(2)]);
    let (repo, _cache) = repository(&catalog);

    repo.popular_videos().await.unwrap();
    let again = repo.popular_videos().await.unwrap();

    assert_eq!(again, vec![item(1), item(2)]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_always_hits_network_and_upserts() {
    let catalog = FakeCatalog::with_popular(vec![item(1)]);
    let (repo, cache) = repository(&catalog);
    let stale = VideoItem {
        title: "Stale".into(),
        ..item(1)
    };
    cache.upsert(stale).await.unwrap();

    let videos = repo.refresh_popular().await.unwrap();

    assert_eq!(videos, vec![item(1)]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.all().await.unwrap(), vec![item(1)]);
}

#[tokio::test]
async fn test_remote_failure_is_typed() {
    let catalog = FakeCatalog::with_popular(vec![]);
    catalog.fail(RemoteError::TooManyRequests);
    let (repo, cache) = repository(&catalog);

    let err = repo.popular_videos().await.unwrap_err();
    assert_eq!(err, DataError::Remote(RemoteError::TooManyRequests));
    assert!(err.is_remote());
    assert!(cache.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_page_size_is_forwarded() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let repo = DefaultVideoRepository::new(catalog.clone(), VideoCache::in_memory().unwrap())
        .with_page_size(25);

    repo.refresh_popular().await.unwrap();
    assert_eq!(catalog.last_per_page.load(Ordering::SeqCst), 25);
}

#[tokio::test]
async fn test_search_and_detail_pass_through() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (repo, _cache) = repository(&catalog);

    let results = repo.search("forest").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "forest");
    assert_eq!(*catalog.searches.lock().unwrap(), vec!["forest"]);

    let info = repo.video_info(42).await.unwrap();
    assert_eq!(info.media_link, "https://videos.pexels.com/42.mp4");
}

#[tokio::test]
async fn test_upsert_popular_writes_one_row() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (repo, _cache) = repository(&catalog);

    repo.upsert_popular(&item(5)).await.unwrap();
    repo.upsert_popular(&item(5)).await.unwrap();

    assert_eq!(repo.cached_popular().await.unwrap(), vec![item(5)]);
}
