//! Adapter round trips against fake provider servers on loopback.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use genbroker_core::job::MediaMode;
use genbroker_core::provider::ProviderId;
use genbroker_providers::adapter::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, TaskStatus,
};
use genbroker_providers::config::{FalConfig, KlingConfig};
use genbroker_providers::fal::FalImageAdapter;
use genbroker_providers::kling::KlingVideoAdapter;
use genbroker_providers::replicate::ReplicateAdapter;
use serde_json::json;

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn request(mode: MediaMode) -> AdapterRequest {
    AdapterRequest {
        mode,
        source_url: "https://x/img.png".into(),
        references: vec![],
        prompt: "portrait".into(),
        shot_type: None,
        settings: json!({}),
    }
}

fn poll() -> PollPolicy {
    PollPolicy::new(Duration::from_millis(5), 3)
}

#[tokio::test]
async fn fal_queue_submit_then_status_then_result() {
    let router = Router::new()
        .route(
            "/fal-ai/test",
            post(|headers: HeaderMap| async move {
                if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Key k") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "no key"})));
                }
                (StatusCode::OK, Json(json!({"request_id": "req-1"})))
            }),
        )
        .route(
            "/fal-ai/test/requests/{id}/status",
            get(|| async { Json(json!({"status": "COMPLETED"})) }),
        )
        .route(
            "/fal-ai/test/requests/{id}",
            get(|| async { Json(json!({"images": [{"url": "https://fal.media/out.png"}]})) }),
        );
    let addr = serve(router).await;

    let adapter = FalImageAdapter::new(
        reqwest::Client::new(),
        "k".into(),
        &FalConfig {
            api_key: Some("k".into()),
            base_url: format!("http://{addr}"),
            model: "fal-ai/test".into(),
            poll: poll(),
        },
    );
    assert_eq!(adapter.id(), ProviderId::FalImage);

    let result = adapter.submit(&request(MediaMode::Image)).await.unwrap();
    let task = assert_matches!(result, AdapterResult::Pending { task, .. } => task);
    assert_eq!(task.id, "req-1");

    let status = adapter.check_status(&task).await.unwrap();
    assert_eq!(
        status,
        TaskStatus::Succeeded {
            url: "https://fal.media/out.png".into()
        }
    );
}

#[tokio::test]
async fn fal_queue_urls_on_another_host_are_not_called() {
    let foreign_hits = Arc::new(AtomicUsize::new(0));
    let hits = foreign_hits.clone();
    let foreign = serve(Router::new().fallback(move || {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            Json(json!({"status": "COMPLETED", "images": [{"url": "https://evil/x.png"}]}))
        }
    }))
    .await;

    let router = Router::new()
        .route(
            "/fal-ai/test",
            post(move || async move {
                Json(json!({
                    "request_id": "req-1",
                    "status_url": format!("http://{foreign}/status"),
                    "response_url": format!("http://{foreign}/result"),
                }))
            }),
        )
        .route(
            "/fal-ai/test/requests/{id}/status",
            get(|| async { Json(json!({"status": "COMPLETED"})) }),
        )
        .route(
            "/fal-ai/test/requests/{id}",
            get(|| async { Json(json!({"images": [{"url": "https://fal.media/out.png"}]})) }),
        );
    let addr = serve(router).await;

    let adapter = FalImageAdapter::new(
        reqwest::Client::new(),
        "k".into(),
        &FalConfig {
            api_key: Some("k".into()),
            base_url: format!("http://{addr}"),
            model: "fal-ai/test".into(),
            poll: poll(),
        },
    );

    let result = adapter.submit(&request(MediaMode::Image)).await.unwrap();
    let task = assert_matches!(result, AdapterResult::Pending { task, .. } => task);
    let status = adapter.check_status(&task).await.unwrap();

    assert_eq!(
        status,
        TaskStatus::Succeeded {
            url: "https://fal.media/out.png".into()
        }
    );
    assert_eq!(foreign_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn replicate_upstream_error_carries_status_and_body() {
    let router = Router::new().route(
        "/predictions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "upstream down") }),
    );
    let addr = serve(router).await;

    let adapter = ReplicateAdapter::new(
        ProviderId::ReplicateImage,
        reqwest::Client::new(),
        "r8".into(),
        &format!("http://{addr}"),
        "v1".into(),
        poll(),
    );

    let err = adapter.submit(&request(MediaMode::Image)).await.unwrap_err();
    assert_matches!(err, AdapterError::Upstream { status: 503, .. });
    assert_eq!(err.to_string(), "503: upstream down");
}

#[tokio::test]
async fn replicate_prediction_polls_by_id() {
    let router = Router::new()
        .route(
            "/predictions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(
                    headers.get("authorization").and_then(|v| v.to_str().ok()),
                    Some("Bearer r8")
                );
                assert_eq!(body["version"], "v1");
                Json(json!({"id": "p-7", "status": "starting", "output": null}))
            }),
        )
        .route(
            "/predictions/{id}",
            get(|| async {
                Json(json!({"id": "p-7", "status": "succeeded", "output": ["https://r/o.png"]}))
            }),
        );
    let addr = serve(router).await;

    let adapter = ReplicateAdapter::new(
        ProviderId::ReplicateImage,
        reqwest::Client::new(),
        "r8".into(),
        &format!("http://{addr}/"),
        "v1".into(),
        poll(),
    );

    let task = assert_matches!(
        adapter.submit(&request(MediaMode::Image)).await.unwrap(),
        AdapterResult::Pending { task, .. } => task
    );
    assert_eq!(
        adapter.check_status(&task).await.unwrap(),
        TaskStatus::Succeeded {
            url: "https://r/o.png".into()
        }
    );
}

#[tokio::test]
async fn kling_submit_and_status() {
    let router = Router::new()
        .route(
            "/v1/videos/image2video",
            post(|| async {
                Json(json!({"code": 0, "message": "SUCCEED", "data": {"task_id": "t-1", "task_status": "submitted"}}))
            }),
        )
        .route(
            "/v1/videos/image2video/{id}",
            get(|| async {
                Json(json!({"code": 0, "data": {"task_id": "t-1", "task_status": "processing"}}))
            }),
        );
    let addr = serve(router).await;

    let adapter = KlingVideoAdapter::new(
        reqwest::Client::new(),
        "kk".into(),
        &KlingConfig {
            api_key: Some("kk".into()),
            base_url: format!("http://{addr}"),
            model: "kling-v1-6".into(),
            poll: poll(),
        },
    );

    let task = assert_matches!(
        adapter.submit(&request(MediaMode::Video)).await.unwrap(),
        AdapterResult::Pending { task, poll_interval } => {
            assert_eq!(poll_interval, Duration::from_millis(5));
            task
        }
    );
    assert_eq!(adapter.check_status(&task).await.unwrap(), TaskStatus::Pending);
}

#[tokio::test]
async fn unreachable_provider_is_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let adapter = KlingVideoAdapter::new(
        reqwest::Client::new(),
        "kk".into(),
        &KlingConfig {
            api_key: Some("kk".into()),
            base_url: format!("http://{addr}"),
            model: "kling-v1-6".into(),
            poll: poll(),
        },
    );
    let err = adapter.submit(&request(MediaMode::Video)).await.unwrap_err();
    assert_matches!(err, AdapterError::Request(_));
}
