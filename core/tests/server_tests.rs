mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::{json, Value};
use support::{proxy_entry, spawn_gluetun, spawn_solver, test_config};
use wnrake_core::config::{Config, RecoveryMode};
use wnrake_core::fetcher::Fetcher;
use wnrake_core::server::{AppState, Gateway};

async fn spawn_gateway(config: &Config) -> String {
    let fetcher = Arc::new(Fetcher::from_config(config).await.unwrap());
    let app = Gateway::router(AppState { fetcher });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{}", addr)
}

#[tokio::test]
async fn health_check() {
    let solver = spawn_solver().await;
    let gateway = spawn_gateway(&test_config(&solver, &[], RecoveryMode::Restart)).await;

    let body: Value = reqwest::get(format!("{}/healthz", gateway))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn fetch_returns_page_html() {
    let solver = spawn_solver().await;
    let gateway = spawn_gateway(&test_config(&solver, &[("vpn1", proxy_entry(9100, None))], RecoveryMode::Restart)).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/v1/fetch", gateway))
        .json(&json!({"url": "https://site/chapter/1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers()["content-type"].to_str().unwrap().starts_with("text/html"));
    assert_eq!(response.text().await.unwrap(), "page https://site/chapter/1");

    let response = client
        .post(format!("{}/v1/fetch", gateway))
        .json(&json!({"url": "https://site/search", "method": "post", "form": {"q": "x"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "page https://site/search q=x");
}

#[tokio::test]
async fn fetch_errors_map_to_status_codes() {
    let solver = spawn_solver().await;
    let gateway = spawn_gateway(&test_config(&solver, &[("vpn1", proxy_entry(9100, None))], RecoveryMode::Restart)).await;
    let client = reqwest::Client::new();
    let fetch = |body: Value| client.post(format!("{}/v1/fetch", gateway)).json(&body).send();

    let response = fetch(json!({"url": "not a url"})).await.unwrap();
    assert_eq!(response.status(), 400);

    let response = fetch(json!({"url": "https://site/a", "proxy": "vpn9"})).await.unwrap();
    assert_eq!(response.status(), 400);

    solver.state.status.store(404, Ordering::SeqCst);
    let response = fetch(json!({"url": "https://site/gone"})).await.unwrap();
    assert_eq!(response.status(), 502);
}

#[tokio::test]
async fn exhausted_pool_is_service_unavailable() {
    let solver = spawn_solver().await;
    solver.state.failures.store(100, Ordering::SeqCst);
    let mut config = test_config(
        &solver,
        &[("vpn1", proxy_entry(9100, None)), ("vpn2", proxy_entry(9101, None))],
        RecoveryMode::Rotate,
    );
    config.retry.attempts = 10;
    let gateway = spawn_gateway(&config).await;

    let response = reqwest::Client::new()
        .post(format!("{}/v1/fetch", gateway))
        .json(&json!({"url": "https://site/a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn proxies_listing_ip_and_restart() {
    let solver = spawn_solver().await;
    let gluetun = spawn_gluetun().await;
    let gateway = spawn_gateway(&test_config(
        &solver,
        &[
            ("vpn1", proxy_entry(9100, Some(&gluetun.url))),
            ("vpn2", proxy_entry(9101, None)),
        ],
        RecoveryMode::Restart,
    ))
    .await;
    let client = reqwest::Client::new();

    let proxies: Value = client
        .get(format!("{}/v1/proxies", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(proxies[0]["name"], "vpn1");
    assert_eq!(proxies[0]["active"], true);
    assert_eq!(proxies[0]["status"], "running");
    assert_eq!(proxies[1]["name"], "vpn2");
    assert_eq!(proxies[1]["status"], "unknown");

    let ip: Value = client
        .get(format!("{}/v1/proxies/vpn1/ip", gateway))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ip, json!({"name": "vpn1", "ip": "198.51.100.1"}));

    let response = client
        .get(format!("{}/v1/proxies/nope/ip", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .post(format!("{}/v1/proxies/vpn2/restart", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(format!("{}/v1/proxies/vpn1/restart", gateway))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(gluetun.state.puts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn post_with_cache_flag_is_not_cached() {
    let solver = spawn_solver().await;
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&solver, &[], RecoveryMode::Restart);
    config.cache = Some(dir.path().to_path_buf());
    let gateway = spawn_gateway(&config).await;
    let client = reqwest::Client::new();

    for query in ["alpha", "beta"] {
        let page = client
            .post(format!("{}/v1/fetch", gateway))
            .json(&json!({"url": "https://site/search", "method": "post", "form": {"q": query}, "cache": true}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(page, format!("page https://site/search q={}", query));
    }
    assert_eq!(solver.state.requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fetch_rejects_non_http_schemes() {
    let solver = spawn_solver().await;
    let gateway = spawn_gateway(&test_config(&solver, &[], RecoveryMode::Restart)).await;
    let client = reqwest::Client::new();

    for url in ["file:///etc/passwd", "data:text/html,hi", "ftp://site/a"] {
        let response = client
            .post(format!("{}/v1/fetch", gateway))
            .json(&json!({"url": url}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "{}", url);
    }
    assert_eq!(solver.state.requests.load(Ordering::SeqCst), 0);
}
