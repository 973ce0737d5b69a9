mod common;

use actix_web::test;
use serde_json::{json, Value};

#[actix_web::test]
async fn test_brute_force_gate_blocks_sixth_attempt() {
    let app = test_app!(common::state(common::settings()));

    for _ in 0..5 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .peer_addr(common::client("10.0.0.1"))
            .set_json(json!({ "username": "alice@example.com", "password": "Passw0rd!" }))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 401);
    }

    let resp = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .peer_addr(common::client("10.0.0.1"))
        .set_json(json!({ "username": "alice@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    let retry_after: u64 = resp
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After header");
    assert!(retry_after > 300 && retry_after <= 900);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["status"], 429);

    // Registration shares the same budget.
    let resp = test::TestRequest::post()
        .uri("/api/v1/users/register")
        .peer_addr(common::client("10.0.0.1"))
        .set_json(json!({ "username": "carol@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);

    // Another client is unaffected.
    let resp = test::TestRequest::post()
        .uri("/api/v1/users/register")
        .peer_addr(common::client("10.0.0.2"))
        .set_json(json!({ "username": "carol@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 201);
}

#[actix_web::test]
async fn test_brute_force_gate_leaves_other_routes_alone() {
    let app = test_app!(common::state(common::settings()));

    for _ in 0..6 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .peer_addr(common::client("10.0.0.3"))
            .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
            .send_request(&app)
            .await;
        assert_ne!(resp.status(), 500);
    }

    let resp = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(common::client("10.0.0.3"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_ddos_gate_is_off_by_default() {
    let app = test_app!(common::state(common::settings()));

    for _ in 0..20 {
        let resp = test::TestRequest::get()
            .uri("/ping")
            .peer_addr(common::client("10.0.0.4"))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 200);
    }
}

#[actix_web::test]
async fn test_ddos_gate_when_enabled() {
    let mut config = common::settings();
    config.rate_limit.enabled = true;
    config.rate_limit.ddos.points = 5;
    config.rate_limit.ddos.duration_secs = 60;
    config.rate_limit.ddos.block_duration_secs = 120;
    let app = test_app!(common::state(config));

    for _ in 0..5 {
        let resp = test::TestRequest::get()
            .uri("/ping")
            .peer_addr(common::client("10.0.0.5"))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 200);
    }

    // Covers every path, known or not.
    for uri in ["/ping", "/api/v1/users/me", "/nowhere"] {
        let resp = test::TestRequest::get()
            .uri(uri)
            .peer_addr(common::client("10.0.0.5"))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 429, "{}", uri);
        assert!(resp.headers().contains_key("Retry-After"));
    }

    let resp = test::TestRequest::get()
        .uri("/ping")
        .peer_addr(common::client("10.0.0.6"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_forwarded_client_is_keyed_with_trust_proxy() {
    let mut config = common::settings();
    config.server.trust_proxy = true;
    let app = test_app!(common::state(config));

    // Same proxy peer, distinct forwarded clients.
    for _ in 0..6 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .peer_addr(common::client("10.0.0.7"))
            .insert_header(("X-Forwarded-For", "203.0.113.10"))
            .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
            .send_request(&app)
            .await;
        assert_ne!(resp.status(), 500);
    }

    let resp = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .peer_addr(common::client("10.0.0.7"))
        .insert_header(("X-Forwarded-For", "203.0.113.10"))
        .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);

    let resp = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .peer_addr(common::client("10.0.0.7"))
        .insert_header(("X-Forwarded-For", "203.0.113.11"))
        .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_forwarded_header_ignored_by_default() {
    let app = test_app!(common::state(common::settings()));

    // Rotating the header does not buy a fresh budget.
    for i in 0..5 {
        let resp = test::TestRequest::post()
            .uri("/api/v1/users/login")
            .peer_addr(common::client("10.0.0.8"))
            .insert_header(("X-Forwarded-For", format!("198.51.100.{}", i)))
            .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 401);
    }

    let resp = test::TestRequest::post()
        .uri("/api/v1/users/login")
        .peer_addr(common::client("10.0.0.8"))
        .insert_header(("X-Forwarded-For", "198.51.100.99"))
        .set_json(json!({ "username": "x@example.com", "password": "Passw0rd!" }))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
}
