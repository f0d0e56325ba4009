//! HTTP end-to-end tests: the real server on an ephemeral port, driven by reqwest.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use syncmesh_signal::SignalServer;
use tokio::net::TcpListener;

struct TestServer {
    base_url: String,
    client: Client,
    _handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start(client_ttl: Duration) -> Self {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = SignalServer::new(client_ttl);
        let handle = tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            client: Client::builder().no_proxy().build().unwrap(),
            _handle: handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, body: Value) -> String {
        let response = self
            .client
            .post(self.url("/register"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: Value = response.json().await.unwrap();
        json["clientId"].as_str().unwrap().to_string()
    }

    async fn discover(&self) -> Vec<Value> {
        let json: Value = self
            .client
            .get(self.url("/discover"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        json["clients"].as_array().unwrap().clone()
    }
}

#[tokio::test]
async fn test_ping_reports_available() {
    let server = TestServer::start(Duration::from_secs(300)).await;
    let json: Value = server
        .client
        .get(server.url("/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(json["status"], "available");
    let timestamp = json["systemInfo"]["serverTimestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_register_uses_observed_source_address() {
    let server = TestServer::start(Duration::from_secs(300)).await;
    let id = server
        .register(json!({"localIp": "192.168.1.10", "localPort": 4000}))
        .await;

    let clients = server.discover().await;
    assert_eq!(clients.len(), 1);
    let entry = &clients[0];
    assert_eq!(entry["clientId"], id.as_str());
    assert_eq!(entry["publicIp"], "127.0.0.1");
    assert_ne!(entry["publicPort"], 0);
    assert_eq!(entry["localIp"], "192.168.1.10");
    assert_eq!(entry["localPort"], 4000);
}

#[tokio::test]
async fn test_heartbeat_errors() {
    let server = TestServer::start(Duration::from_secs(300)).await;

    let missing = server
        .client
        .post(server.url("/heartbeat"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let unknown = server
        .client
        .post(server.url("/heartbeat?clientId=missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
    let json: Value = unknown.json().await.unwrap();
    assert_eq!(json["error"], "client not found");
}

#[tokio::test]
async fn test_untouched_client_expires() {
    let server = TestServer::start(Duration::from_secs(1)).await;
    let id = server.register(json!({})).await;
    assert_eq!(server.discover().await.len(), 1);

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(server.discover().await.is_empty());

    let heartbeat = server
        .client
        .post(server.url(&format!("/heartbeat?clientId={}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(heartbeat.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_concurrent_registrations_get_distinct_ids() {
    let server = TestServer::start(Duration::from_secs(300)).await;

    let mut handles = Vec::new();
    for port in 0..16u16 {
        let client = server.client.clone();
        let url = server.url("/register");
        handles.push(tokio::spawn(async move {
            let json: Value = client
                .post(url)
                .json(&json!({"localIp": "10.0.0.5", "localPort": 4000 + port}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            json["clientId"].as_str().unwrap().to_string()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(server.discover().await.len(), 16);
}
