// tests/admin_api_tests.rs
use rpc_fleet_controller::{
    registry::{BackendRecord, BackendRegistry, MemoryRegistry},
    server::{AdminHandler, ServerBuilder},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

async fn start(registry: Arc<MemoryRegistry>) -> (String, watch::Sender<bool>, tokio::task::JoinHandle<anyhow::Result<()>>) {
    let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let server = ServerBuilder::new(addr)
        .with_handler(AdminHandler::new(registry, "/metrics"))
        .bind()
        .await
        .unwrap();
    let base = format!("http://{}", server.local_addr().unwrap());
    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(server.serve(rx));
    (base, tx, task)
}

#[tokio::test]
async fn test_register_backend_over_http() {
    let registry = Arc::new(MemoryRegistry::new());
    let (base, shutdown, task) = start(registry.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/backends", base))
        .json(&serde_json::json!({"url": "https://node.example:8545", "is_leader": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: BackendRecord = response.json().await.unwrap();
    assert_eq!(created.url, "https://node.example:8545");

    let stored = registry.get("https://node.example:8545").await.unwrap().unwrap();
    assert_eq!(stored, created);

    let listed: Vec<BackendRecord> = client
        .get(format!("{}/backends", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed, vec![created]);

    shutdown.send(true).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_rejects_bad_requests() {
    let registry = Arc::new(MemoryRegistry::new());
    let (base, shutdown, task) = start(registry.clone()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/backends", base))
        .header("content-type", "application/json")
        .body("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["type"], "parse_error");

    let response = client
        .post(format!("{}/backends", base))
        .json(&serde_json::json!({"url": "not a url", "is_leader": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["type"], "validation_error");

    assert!(registry.is_empty());

    // No prometheus sink attached.
    let response = client.get(format!("{}/metrics", base)).send().await.unwrap();
    assert_eq!(response.status(), 404);

    shutdown.send(true).unwrap();
    task.await.unwrap().unwrap();
}
