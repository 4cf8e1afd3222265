//! End-to-end tests with in-process (task) workers.

use std::time::Duration;

use axum::http::StatusCode;
use cluster_proxy::coordinator::WorkerMode;

mod common;

#[tokio::test]
async fn test_forwards_matching_request() {
    let (backend, mut seen) = common::start_recording_backend("ok").await;
    let config = common::config(&[("/api", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 2, WorkerMode::Task).await;

    let res = common::client()
        .get(format!("http://{}/api/foo", proxy))
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "ok");
    assert_eq!(seen.recv().await.unwrap(), "GET /api/foo HTTP/1.1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_any_method_is_forwarded_as_get_without_body() {
    let (backend, mut seen) = common::start_recording_backend("stored").await;
    let config = common::config(&[("/", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 1, WorkerMode::Task).await;

    let res = common::client()
        .post(format!("http://{}/items?draft=true", proxy))
        .body("payload that is never read")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "stored");
    assert_eq!(seen.recv().await.unwrap(), "GET /items?draft=true HTTP/1.1");

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_rule_is_404() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::config(&[("/api", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 2, WorkerMode::Task).await;

    let res = common::client()
        .get(format!("http://{}/other", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "No rule found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_upstream_is_500() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::config(&[("/api", &["missing", "u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 2, WorkerMode::Task).await;

    let res = common::client()
        .get(format!("http://{}/api/foo", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.text().await.unwrap(), "No upstream found");

    shutdown.trigger();
}

#[tokio::test]
async fn test_first_listed_rule_wins() {
    let short = common::start_mock_backend("short").await;
    let long = common::start_mock_backend("long").await;
    let config = common::config(
        &[("/api", &["short"]), ("/api/users", &["long"])],
        &[("short", short.to_string()), ("long", long.to_string())],
    );
    let (proxy, shutdown) = common::start_proxy(config, 2, WorkerMode::Task).await;

    let body = common::client()
        .get(format!("http://{}/api/users/7", proxy))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "short");

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_status_is_not_relayed() {
    let backend = common::start_programmable_backend(|_| async { (503, "busy".to_string()) }).await;
    let config = common::config(&[("/", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 1, WorkerMode::Task).await;

    let res = common::client()
        .get(format!("http://{}/", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "busy");

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_upstream_is_502_and_worker_survives() {
    let dead = common::dead_address().await;
    let alive = common::start_mock_backend("alive").await;
    let config = common::config(
        &[("/down", &["dead"]), ("/", &["alive"])],
        &[("dead", dead.to_string()), ("alive", alive.to_string())],
    );
    let (proxy, shutdown) = common::start_proxy(config, 1, WorkerMode::Task).await;
    let client = common::client();

    let res = client.get(format!("http://{}/down", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(res.text().await.unwrap(), "Upstream request failed");

    let res = client.get(format!("http://{}/up", proxy)).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "alive");

    shutdown.trigger();
}

#[tokio::test]
async fn test_concurrent_requests_on_one_worker_get_their_own_replies() {
    // Echo the request target back, with staggered delays so replies
    // leave the worker out of order.
    let backend = common::start_programmable_backend(|head| async move {
        let target = head.split_whitespace().nth(1).unwrap_or("").to_string();
        let n: u64 = target.rsplit('/').next().and_then(|s| s.parse().ok()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((n % 5) * 20)).await;
        (200, target)
    })
    .await;
    let config = common::config(&[("/echo", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 1, WorkerMode::Task).await;
    let client = common::client();

    let mut tasks = Vec::new();
    for i in 0..40 {
        let client = client.clone();
        let url = format!("http://{}/echo/{}", proxy, i);
        tasks.push(tokio::spawn(async move {
            let body = client.get(url).send().await.unwrap().text().await.unwrap();
            (i, body)
        }));
    }

    for task in tasks {
        let (i, body) = task.await.unwrap();
        assert_eq!(body, format!("/echo/{}", i), "request {} got someone else's reply", i);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_requests_spread_across_workers() {
    let backend = common::start_mock_backend("ok").await;
    let config = common::config(&[("/", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 4, WorkerMode::Task).await;
    let client = common::client();

    for _ in 0..20 {
        let res = client.get(format!("http://{}/", proxy)).send().await.unwrap();
        assert_eq!(res.text().await.unwrap(), "ok");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_chunked_upstream_body_is_reassembled() {
    let backend = common::start_chunked_backend(&["first,", "second,", "third"]).await;
    let config = common::config(&[("/", &["u1"])], &[("u1", backend.to_string())]);
    let (proxy, shutdown) = common::start_proxy(config, 1, WorkerMode::Task).await;

    let res = common::client()
        .get(format!("http://{}/stream", proxy))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "first,second,third");

    shutdown.trigger();
}
