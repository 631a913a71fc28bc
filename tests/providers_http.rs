// tests/providers_http.rs
//
// Adapters against a local mock API: exercises the real request path
// (auth, query, status handling) without leaving the machine.

use axum::{
    extract::{Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::collections::HashMap;
use std::net::SocketAddr;

use social_ingest::ingest::adapters::facebook::FacebookAdapter;
use social_ingest::ingest::adapters::rss::RssAdapter;
use social_ingest::ingest::adapters::twitter::TwitterAdapter;
use social_ingest::ingest::types::Source;
use social_ingest::{PlatformAdapter, ScrapeError};

const BLOG_XML: &str = include_str!("fixtures/blog_rss.xml");
const TWITTER_JSON: &str = include_str!("fixtures/twitter_timeline.json");
const FACEBOOK_JSON: &str = include_str!("fixtures/facebook_posts.json");

async fn tweets(
    Path(user_id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer good-token" {
        return (StatusCode::UNAUTHORIZED, r#"{"title":"Unauthorized"}"#.to_string());
    }
    // Clamped into the API's accepted range.
    if user_id != "42" || q.get("max_results").map(String::as_str) != Some("5") {
        return (StatusCode::BAD_REQUEST, "bad query".to_string());
    }
    (StatusCode::OK, TWITTER_JSON.to_string())
}

async fn page_posts(
    Path(page_id): Path<String>,
    Query(q): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if page_id != "123" || q.get("access_token").map(String::as_str) != Some("page-token") {
        return (StatusCode::FORBIDDEN, "denied".to_string());
    }
    (StatusCode::OK, FACEBOOK_JSON.to_string())
}

async fn spawn_mock() -> SocketAddr {
    let app = Router::new()
        .route("/feed.xml", get(|| async { BLOG_XML }))
        .route("/broken.xml", get(|| async { "<rss><channel><item>" }))
        .route("/users/{id}/tweets", get(tweets))
        .route("/graph/{page}/posts", get(page_posts));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn rss_adapter_fetches_and_parses_feed() {
    let addr = spawn_mock().await;
    let adapter = RssAdapter::new(reqwest::Client::new());

    let source = Source::new(1, "rss").with_setting("feedUrl", format!("http://{addr}/feed.xml"));
    let res = adapter.scrape(&source).await;
    assert!(res.success, "unexpected failure: {:?}", res.error);
    assert_eq!(res.posts.len(), 2);

    let broken = Source::new(2, "rss").with_setting("feedUrl", format!("http://{addr}/broken.xml"));
    let res = adapter.scrape(&broken).await;
    assert!(!res.success);
    assert!(res.posts.is_empty());
}

#[tokio::test]
async fn twitter_adapter_sends_bearer_and_clamps_max_results() {
    let addr = spawn_mock().await;
    let adapter = TwitterAdapter::new(reqwest::Client::new())
        .with_base_url(&format!("http://{addr}/"));

    let source = Source::new(1, "twitter")
        .with_token("good-token")
        .with_setting("userId", "42")
        .with_setting("maxResults", 1);
    let posts = adapter.fetch_posts(&source).await.expect("fetch ok");
    assert_eq!(posts.len(), 2);

    let bad = source.clone().with_token("stale-token");
    let err = adapter.fetch_posts(&bad).await.unwrap_err();
    match err {
        ScrapeError::Status { platform, status, body } => {
            assert_eq!(platform, "twitter");
            assert_eq!(status, 401);
            assert!(body.contains("Unauthorized"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn facebook_adapter_passes_token_in_query() {
    let addr = spawn_mock().await;
    let adapter = FacebookAdapter::new(reqwest::Client::new())
        .with_base_url(&format!("http://{addr}/graph"));

    let source = Source::new(1, "facebook")
        .with_token("page-token")
        .with_setting("pageId", "123");
    let res = adapter.scrape(&source).await;
    assert!(res.success, "unexpected failure: {:?}", res.error);
    assert_eq!(res.posts.len(), 2);

    let res = adapter.scrape(&source.clone().with_token("other")).await;
    assert!(!res.success);
    let err = res.error.unwrap_or_default();
    assert!(err.contains("HTTP 403"), "{err}");
    assert!(!err.contains("other"), "token leaked into error: {err}");
}

#[tokio::test]
async fn unreachable_host_is_a_transport_failure() {
    // Port 9 on localhost is closed in test environments.
    let adapter = RssAdapter::new(reqwest::Client::new());
    let source = Source::new(1, "rss").with_setting("feedUrl", "http://127.0.0.1:9/feed.xml");
    let err = adapter.fetch_posts(&source).await.unwrap_err();
    assert!(matches!(err, ScrapeError::Transport { platform: "rss", .. }));
}
