//! List coordinator tests
//!
//! Popular loading, refresh, debounced search and selection over the real
//! repository with a fake catalog.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use clipdeck::error::{DataError, RemoteError};
use clipdeck::list::{ListAction, ListConfig, ListCoordinator, ListState};

use common::{item, repository, FakeCatalog};

const DEBOUNCE: Duration = Duration::from_millis(300);

fn spawn(catalog: &Arc<FakeCatalog>) -> (ListCoordinator, clipdeck::cache::VideoCache) {
    let (repo, cache) = repository(catalog);
    let list = ListCoordinator::spawn(
        repo,
        ListConfig {
            search_debounce: DEBOUNCE,
        },
    );
    (list, cache)
}

async fn wait_for(list: &ListCoordinator, predicate: impl Fn(&ListState) -> bool) -> ListState {
    let mut rx = list.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| predicate(s)))
        .await
        .expect("timed out waiting for list state")
        .expect("list coordinator stopped");
    state.clone()
}

// =============================================================================
// Popular
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_load_popular_empty_cache_fetches_once() {
    let catalog = FakeCatalog::with_popular(vec![item(1), item(2), item(3)]);
    let (list, cache) = spawn(&catalog);

    list.load_popular();
    let state = wait_for(&list, |s| !s.top_videos.is_empty()).await;

    assert!(!state.is_loading);
    assert_eq!(state.top_videos.len(), 3);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len().await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_load_popular_uses_populated_cache() {
    let catalog = FakeCatalog::with_popular(vec![item(9)]);
    let (list, cache) = spawn(&catalog);
    cache.upsert(item(1)).await.unwrap();

    list.load_popular();
    let state = wait_for(&list, |s| !s.top_videos.is_empty()).await;

    assert_eq!(state.top_videos, vec![item(1)]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_goes_to_network() {
    let catalog = FakeCatalog::with_popular(vec![item(4), item(5)]);
    let (list, cache) = spawn(&catalog);
    cache.upsert(item(1)).await.unwrap();

    list.refresh();
    let state = wait_for(&list, |s| s.top_videos.len() == 2).await;

    assert_eq!(state.top_videos, vec![item(4), item(5)]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len().await.unwrap(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_popular_failure_sets_error() {
    let catalog = FakeCatalog::with_popular(vec![]);
    catalog.fail(RemoteError::TooManyRequests);
    let (list, _cache) = spawn(&catalog);

    list.load_popular();
    let state = wait_for(&list, |s| s.error_message.is_some()).await;

    assert!(!state.is_loading);
    assert!(state.top_videos.is_empty());
    assert_eq!(
        state.error_message.as_deref(),
        Some("Oops, it seems your quota is exceeded.")
    );
    assert_eq!(
        state.error,
        Some(DataError::Remote(RemoteError::TooManyRequests))
    );
}

#[tokio::test(start_paused = true)]
async fn test_successful_reload_clears_error_kind() {
    let catalog = FakeCatalog::with_popular(vec![item(1)]);
    catalog.fail(RemoteError::NoInternet);
    let (list, _cache) = spawn(&catalog);

    list.load_popular();
    wait_for(&list, |s| s.error.is_some()).await;

    catalog.recover();
    list.refresh();
    let state = wait_for(&list, |s| !s.top_videos.is_empty()).await;

    assert!(state.error.is_none());
    assert!(state.error_message.is_none());
}

// =============================================================================
// Search
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_search_waits_for_debounce() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (list, _cache) = spawn(&catalog);
    let started = Instant::now();

    list.search("forest");
    let state = wait_for(&list, |s| !s.search_results.is_empty()).await;

    assert!(started.elapsed() >= DEBOUNCE);
    assert!(!state.is_searching);
    assert_eq!(state.search_results[0].title, "forest");
    assert_eq!(state.visible()[0].title, "forest");
}

#[tokio::test(start_paused = true)]
async fn test_new_search_cancels_pending_one() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (list, _cache) = spawn(&catalog);

    list.search("a");
    list.search("ab");
    let state = wait_for(&list, |s| !s.is_searching && !s.search_results.is_empty()).await;

    assert_eq!(state.query, "ab");
    assert_eq!(state.search_results[0].title, "ab");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(*catalog.searches.lock().unwrap(), vec!["ab"]);
    assert_eq!(list.state().search_results[0].title, "ab");
}

#[tokio::test(start_paused = true)]
async fn test_new_search_cancels_in_flight_request() {
    let catalog = FakeCatalog::with_popular(vec![]);
    catalog.set_search_delay(Duration::from_secs(1));
    let (list, _cache) = spawn(&catalog);

    list.search("a");
    tokio::time::sleep(DEBOUNCE + Duration::from_millis(100)).await;
    assert_eq!(catalog.search_count(), 1);

    list.search("ab");
    let state = wait_for(&list, |s| !s.is_searching && !s.search_results.is_empty()).await;
    assert_eq!(state.search_results[0].title, "ab");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(list.state().search_results[0].title, "ab");
}

#[tokio::test(start_paused = true)]
async fn test_empty_search_clears_without_request() {
    let catalog = FakeCatalog::with_popular(vec![item(1)]);
    let (list, _cache) = spawn(&catalog);
    list.load_popular();
    wait_for(&list, |s| !s.top_videos.is_empty()).await;

    list.search("cat");
    wait_for(&list, |s| !s.search_results.is_empty()).await;
    assert_eq!(catalog.search_count(), 1);

    list.search("  ");
    let state = wait_for(&list, |s| s.search_results.is_empty()).await;
    assert!(!state.is_searching);
    assert_eq!(state.visible(), &[item(1)]);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(catalog.search_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_search_failure_clears_results() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (list, _cache) = spawn(&catalog);

    list.search("cat");
    wait_for(&list, |s| !s.search_results.is_empty()).await;

    catalog.fail(RemoteError::Server(502));
    list.search("cats");
    let state = wait_for(&list, |s| s.error_message.is_some()).await;

    assert!(state.search_results.is_empty());
    assert!(!state.is_searching);
    assert_eq!(
        state.error_message.as_deref(),
        Some("Something went wrong on the server.")
    );
}

// =============================================================================
// Actions
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_swipe_without_query_refreshes() {
    let catalog = FakeCatalog::with_popular(vec![item(1)]);
    let (list, _cache) = spawn(&catalog);

    list.refresh_swipe();
    wait_for(&list, |s| !s.top_videos.is_empty()).await;

    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 1);
    assert_eq!(catalog.search_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_swipe_with_query_searches_again() {
    let catalog = FakeCatalog::with_popular(vec![item(1)]);
    let (list, _cache) = spawn(&catalog);

    list.dispatch(ListAction::ChangedText("sea".into()));
    wait_for(&list, |s| !s.search_results.is_empty()).await;

    list.refresh_swipe();
    wait_for(&list, |s| s.is_searching).await;
    wait_for(&list, |s| !s.is_searching).await;

    assert_eq!(*catalog.searches.lock().unwrap(), vec!["sea", "sea"]);
    assert_eq!(catalog.popular_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_select_records_video() {
    let catalog = FakeCatalog::with_popular(vec![]);
    let (list, _cache) = spawn(&catalog);

    list.select(42);
    let state = wait_for(&list, |s| s.selected.is_some()).await;
    assert_eq!(state.selected, Some(42));

    list.dispatch(ListAction::VideoClicked(7));
    wait_for(&list, |s| s.selected == Some(7)).await;
}
