mod common;

use actix_web::cookie::Cookie;
use actix_web::test;
use async_trait::async_trait;
use authgate_server::auth::Identity;
use authgate_server::cache::{Content, SearchProvider, SearchRequest, SearchResults};
use authgate_server::error::ProxyError;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct StubProvider {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

#[async_trait]
impl SearchProvider for StubProvider {
    async fn search(&self, request: &SearchRequest) -> Result<SearchResults, ProxyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if request.query == "busy" {
            return Err(ProxyError::RateLimited);
        }

        Ok(SearchResults {
            contents: vec![Content {
                id: format!("{}-{}", request.query, request.page),
                src: "https://cdn.example.com/full.jpg".into(),
                width: 1280,
                height: 720,
                thumbnail: "https://cdn.example.com/thumb.jpg".into(),
                thumbnail_width: 160,
                thumbnail_height: 90,
                kind: request.kind,
            }],
            total: 1,
        })
    }
}

async fn access_cookie(state: &authgate_server::AppState) -> Cookie<'static> {
    let token = state
        .tokens
        .issue_access(&Identity::new("alice@example.com"))
        .await
        .unwrap();
    Cookie::new("access_token", token)
}

#[actix_web::test]
async fn test_search_is_cached() {
    let provider = Arc::new(StubProvider::default());
    let state = common::state(common::settings()).with_search_provider(provider.clone());
    let cookie = access_cookie(&state).await;
    let app = test_app!(state);

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let resp = test::TestRequest::get()
            .uri("/api/v1/content/image?query=cats&page=2")
            .cookie(cookie.clone())
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        bodies.push(body);
    }

    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[0]["contents"][0]["id"], "cats-2");
    assert_eq!(bodies[0]["contents"][0]["type"], "image");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // Page defaults to 1, which is a different key.
    let resp = test::TestRequest::get()
        .uri("/api/v1/content/video?query=cats")
        .cookie(cookie.clone())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["contents"][0]["id"], "cats-1");
    assert_eq!(body["contents"][0]["type"], "video");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[actix_web::test]
async fn test_search_errors() {
    let provider = Arc::new(StubProvider::default());
    let state = common::state(common::settings()).with_search_provider(provider.clone());
    let cookie = access_cookie(&state).await;
    let app = test_app!(state);

    let resp = test::TestRequest::get()
        .uri("/api/v1/content/image?query=busy")
        .cookie(cookie.clone())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);

    let resp = test::TestRequest::get()
        .uri("/api/v1/content/audio?query=cats")
        .cookie(cookie.clone())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 404);

    let resp = test::TestRequest::get()
        .uri("/api/v1/content/image?query=cats")
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_slow_upstream_times_out() {
    let provider = Arc::new(StubProvider {
        calls: AtomicUsize::new(0),
        delay: Some(Duration::from_millis(300)),
    });
    let mut config = common::settings();
    config.cache.producer_timeout_ms = 50;
    let state = common::state(config).with_search_provider(provider);
    let cookie = access_cookie(&state).await;
    let app = test_app!(state);

    let resp = test::TestRequest::get()
        .uri("/api/v1/content/image?query=cats")
        .cookie(cookie)
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 500);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["message"], "Internal server error");
}

#[actix_web::test]
async fn test_search_without_provider_is_not_found() {
    let state = common::state(common::settings());
    let cookie = access_cookie(&state).await;
    let app = test_app!(state);

    let resp = test::TestRequest::get()
        .uri("/api/v1/content/image?query=cats")
        .cookie(cookie)
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 404);
}
