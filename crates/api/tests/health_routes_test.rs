use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alive_api::{create_routes, HealthState};
use alive_core::{AliveConfig, AliveError, AliveResult, ProcessInfo, ProcessRegistry};
use alive_infrastructure::MemoryProcessRegistry;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;

fn process(identity: &str, hostname: &str, busy: u64) -> ProcessInfo {
    ProcessInfo {
        identity: identity.to_string(),
        hostname: hostname.to_string(),
        pid: 100,
        busy,
        concurrency: 10,
        queues: vec!["default".to_string()],
        beat: None,
    }
}

fn app(config: &AliveConfig, registry: &MemoryProcessRegistry) -> Router {
    create_routes(config, HealthState::new("web-1", Arc::new(registry.clone())))
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

struct BrokenRegistry;

#[async_trait]
impl ProcessRegistry for BrokenRegistry {
    async fn processes(&self) -> AliveResult<Vec<ProcessInfo>> {
        Err(AliveError::Store("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_liveness_probe_alive() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-1:100:abc", "web-1", 0)).await;

    let (status, body) = get(app(&AliveConfig::default(), &registry), "/liveness_probe").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Alive!");
}

#[tokio::test]
async fn test_liveness_probe_ignores_other_hosts() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-10:100:abc", "web-10", 3)).await;

    let (status, body) = get(app(&AliveConfig::default(), &registry), "/liveness_probe").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Can't find the alive key");
}

#[tokio::test]
async fn test_busy_count_sums_own_processes() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-1:100:a", "web-1", 2)).await;
    registry.upsert(process("web-1:101:b", "web-1", 5)).await;
    registry.upsert(process("web-2:100:c", "web-2", 7)).await;

    let (status, body) = get(app(&AliveConfig::default(), &registry), "/busy_count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "7");
}

#[tokio::test]
async fn test_busy_count_zero_without_processes() {
    let registry = MemoryProcessRegistry::new();
    let (status, body) = get(app(&AliveConfig::default(), &registry), "/busy_count").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "0");
}

#[tokio::test]
async fn test_unknown_path_not_found() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-1:100:a", "web-1", 0)).await;

    for uri in ["/", "/health", "/liveness_probe/extra"] {
        let (status, body) = get(app(&AliveConfig::default(), &registry), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body, "Not found");
    }
}

#[tokio::test]
async fn test_configured_paths() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-1:100:a", "web-1", 1)).await;
    let config = AliveConfig {
        liveness_probe_path: "/healthz".to_string(),
        sidekiq_busy_count_path: "/busy".to_string(),
        ..Default::default()
    };

    assert_eq!(
        get(app(&config, &registry), "/healthz").await,
        (StatusCode::OK, "Alive!".to_string())
    );
    assert_eq!(get(app(&config, &registry), "/busy").await, (StatusCode::OK, "1".to_string()));
    assert_eq!(get(app(&config, &registry), "/liveness_probe").await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_custom_probe_must_pass() {
    let registry = MemoryProcessRegistry::new();
    registry.upsert(process("web-1:100:a", "web-1", 0)).await;
    let healthy = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&healthy);

    let state = HealthState::new("web-1", Arc::new(registry.clone()))
        .with_custom_probe(Some(Arc::new(move || flag.load(Ordering::SeqCst))));
    let app = create_routes(&AliveConfig::default(), state);

    assert_eq!(get(app.clone(), "/liveness_probe").await.0, StatusCode::NOT_FOUND);
    healthy.store(true, Ordering::SeqCst);
    assert_eq!(get(app, "/liveness_probe").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_registry_failure() {
    let app = create_routes(
        &AliveConfig::default(),
        HealthState::new("web-1", Arc::new(BrokenRegistry)),
    );

    let (status, body) = get(app.clone(), "/liveness_probe").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.starts_with("Can't find the alive key"));
    assert!(body.contains("connection refused"));
    assert_eq!(get(app, "/busy_count").await.0, StatusCode::SERVICE_UNAVAILABLE);
}
