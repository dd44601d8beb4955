use std::sync::Arc;

use alive_api::{start_server, start_thread_server, HealthState};
use alive_core::{AliveConfig, ProcessInfo, ServerMode};
use alive_infrastructure::MemoryProcessRegistry;

fn config(port: u16) -> AliveConfig {
    AliveConfig {
        host: "127.0.0.1".to_string(),
        port,
        ..Default::default()
    }
}

async fn state() -> HealthState {
    let registry = MemoryProcessRegistry::new();
    registry
        .upsert(ProcessInfo {
            identity: "web-1:100:a".to_string(),
            hostname: "web-1".to_string(),
            pid: 100,
            busy: 4,
            concurrency: 10,
            queues: vec!["default".to_string()],
            beat: None,
        })
        .await;
    HealthState::new("web-1", Arc::new(registry))
}

#[tokio::test]
async fn test_thread_server_serves_and_stops() {
    let server = start_server(&config(0), state().await)
        .await
        .unwrap()
        .expect("port 0 always binds");
    assert_eq!(server.mode(), ServerMode::Thread);
    let addr = server.local_addr().unwrap();

    let client = reqwest::Client::new();
    let alive = client
        .get(format!("http://{addr}/liveness_probe"))
        .send()
        .await
        .unwrap();
    assert_eq!(alive.status(), reqwest::StatusCode::OK);
    assert_eq!(alive.text().await.unwrap(), "Alive!");

    let busy = client
        .get(format!("http://{addr}/busy_count"))
        .send()
        .await
        .unwrap();
    assert_eq!(busy.text().await.unwrap(), "4");

    server.stop().await.unwrap();
    assert!(client
        .get(format!("http://{addr}/liveness_probe"))
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn test_port_in_use_is_not_fatal() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let server = start_thread_server(&config(port), state().await).await.unwrap();
    assert!(server.is_none());
}

#[tokio::test]
async fn test_unknown_backend_falls_back() {
    let config = AliveConfig {
        server: "webrick".to_string(),
        ..config(0)
    };
    let server = start_thread_server(&config, state().await)
        .await
        .unwrap()
        .unwrap();
    server.stop().await.unwrap();
}
