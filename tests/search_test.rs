//! Tests for the search gateway

mod common;

use tempfile::TempDir;

use common::{create_codebase, hit, open_engine, wait_until};
use context_index::config::DEFAULT_MIN_SCORE;
use context_index::error::IndexError;
use context_index::index::IndexRequest;
use context_index::search::gateway::{build_extension_filter, truncate_preview};
use context_index::search::SearchRequest;

#[tokio::test]
async fn test_search_requires_an_index() {
    let state = TempDir::new().unwrap();
    let (engine, mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    let err = engine
        .gateway()
        .search(SearchRequest::new(&key, "auth handler"))
        .await
        .unwrap_err();
    assert_eq!(err, IndexError::NotIndexed { path: key });
    assert!(mock.last_search.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_search_ranks_and_clamps() {
    let state = TempDir::new().unwrap();
    let (engine, mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    engine
        .manager()
        .request_index(IndexRequest::new(&key))
        .await
        .unwrap();
    engine.manager().wait_for_indexing(&key).await.unwrap();

    *mock.hits.lock().unwrap() = vec![hit("src/a.rs", 1, 20, 0.91), hit("src/b.rs", 5, 9, 0.72)];

    let response = engine
        .gateway()
        .search(SearchRequest::new(&key, "  auth handler  ").limit(500))
        .await
        .unwrap();

    assert_eq!(response.query, "auth handler");
    assert!(!response.is_incomplete());
    assert_eq!(response.results.len(), 2);
    assert_eq!(response.results[0].rank, 1);
    assert_eq!(response.results[0].location(), "src/a.rs:1-20");
    assert_eq!(response.results[1].rank, 2);

    let call = mock.last_search.lock().unwrap().clone().unwrap();
    assert_eq!(call.limit, 50);
    assert_eq!(call.min_score, DEFAULT_MIN_SCORE);
    assert_eq!(call.filter, None);
}

#[tokio::test]
async fn test_search_defaults_and_filter() {
    let state = TempDir::new().unwrap();
    let (engine, mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    engine
        .manager()
        .request_index(IndexRequest::new(&key))
        .await
        .unwrap();
    engine.manager().wait_for_indexing(&key).await.unwrap();

    let request = SearchRequest {
        extension_filter: vec![".ts".to_string(), ".py".to_string()],
        ..SearchRequest::new(&key, "parser")
    };
    let response = engine.gateway().search(request).await.unwrap();
    assert!(response.results.is_empty());

    let call = mock.last_search.lock().unwrap().clone().unwrap();
    assert_eq!(call.limit, 10);
    assert_eq!(call.filter.as_deref(), Some(r#"fileExtension in [".ts", ".py"]"#));
}

#[tokio::test]
async fn test_search_while_indexing_is_flagged_incomplete() {
    let state = TempDir::new().unwrap();
    let (engine, mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    mock.hold_at(45);
    engine
        .manager()
        .request_index(IndexRequest::new(&key))
        .await
        .unwrap();
    assert!(wait_until(|| engine.store().get(&key).and_then(|r| r.percentage()) == Some(45)).await);

    *mock.hits.lock().unwrap() = vec![hit("src/a.rs", 1, 2, 0.5)];
    let response = engine
        .gateway()
        .search(SearchRequest::new(&key, "anything"))
        .await
        .unwrap();
    assert!(response.is_incomplete());
    assert_eq!(response.indexing_percentage, Some(45));
    assert_eq!(response.results.len(), 1);

    mock.release();
    engine.manager().wait_for_indexing(&key).await.unwrap();
}

#[tokio::test]
async fn test_search_validation() {
    let state = TempDir::new().unwrap();
    let (engine, _mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    let err = engine
        .gateway()
        .search(SearchRequest::new(&key, "   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");

    let request = SearchRequest {
        extension_filter: vec!["ts".to_string()],
        ..SearchRequest::new(&key, "parser")
    };
    let err = engine.gateway().search(request).await.unwrap_err();
    assert!(err.to_string().contains("ts"));
}

#[tokio::test]
async fn test_previews_are_truncated() {
    let state = TempDir::new().unwrap();
    let (engine, mock) = open_engine(&state);
    let (_dir, key) = create_codebase();

    engine
        .manager()
        .request_index(IndexRequest::new(&key))
        .await
        .unwrap();
    engine.manager().wait_for_indexing(&key).await.unwrap();

    let mut long = hit("src/big.rs", 1, 400, 0.8);
    long.content = "x".repeat(6000);
    *mock.hits.lock().unwrap() = vec![long];

    let response = engine
        .gateway()
        .search(SearchRequest::new(&key, "big"))
        .await
        .unwrap();
    assert_eq!(response.results[0].preview.chars().count(), 5000);
    assert!(response.results[0].truncated);
}

#[test]
fn test_filter_and_preview_helpers() {
    assert_eq!(build_extension_filter(&[]), None);
    assert_eq!(
        build_extension_filter(&[".rs".to_string()]).as_deref(),
        Some(r#"fileExtension in [".rs"]"#)
    );
    assert_eq!(truncate_preview("abc", 10), ("abc".to_string(), false));
}

#[tokio::test]
async fn test_effective_limit() {
    let state = TempDir::new().unwrap();
    let (engine, _mock) = open_engine(&state);
    let gateway = engine.gateway();
    assert_eq!(gateway.effective_limit(None), 10);
    assert_eq!(gateway.effective_limit(Some(0)), 1);
    assert_eq!(gateway.effective_limit(Some(25)), 25);
    assert_eq!(gateway.effective_limit(Some(51)), 50);
}
