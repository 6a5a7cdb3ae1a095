//! Integration tests for `meshcalld`.
//!
//! Exercises the client/admin API (§6) and the `/ws` control plane end to
//! end over a real bound TCP listener; no mocked transport.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::json;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;

use meshcall_protocol::ws::{ClientEnvelope, HelloData, JoinData, ServerEnvelope};
use meshcall_server::config::Config;

struct TestServer {
    addr: std::net::SocketAddr,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let mut config = Config::default();
        config.jwt_secret = "test-secret-key-for-testing-only".to_string();
        config.api.security.allow_self_registration = true;
        // Port 0 so concurrently-running tests each get their own ephemeral
        // ICE ports instead of fighting over the default 8443.
        config.rtc.ice_port_udp = 0;
        config.rtc.ice_port_tcp = 0;

        let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        let app = meshcall_server::create_app(config, metrics_handle).await.expect("create_app");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        Self { addr, shutdown_tx: Some(shutdown_tx) }
    }

    fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn register_login_and_stats_round_trip() {
    let server = TestServer::start().await;
    let client = Client::new();

    let register = client
        .post(format!("{}/register", server.http_url()))
        .json(&json!({ "clientID": "alice", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .expect("register request");
    assert_eq!(register.status(), reqwest::StatusCode::CREATED);

    let login = client
        .post(format!("{}/login", server.http_url()))
        .json(&json!({ "clientID": "alice", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .expect("login request");
    assert_eq!(login.status(), reqwest::StatusCode::OK);
    let login_body: serde_json::Value = login.json().await.unwrap();
    let token = login_body["bearerToken"].as_str().expect("bearerToken").to_string();

    let unauthenticated_stats = client.get(format!("{}/stats", server.http_url())).send().await.unwrap();
    assert_eq!(unauthenticated_stats.status(), reqwest::StatusCode::UNAUTHORIZED);

    let stats = client
        .get(format!("{}/stats", server.http_url()))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(stats.status(), reqwest::StatusCode::OK);
    let stats_body: serde_json::Value = stats.json().await.unwrap();
    assert_eq!(stats_body["calls"], 0);
    assert_eq!(stats_body["sessions"], 0);
}

#[tokio::test]
async fn register_rejects_short_key_and_duplicate() {
    let server = TestServer::start().await;
    let client = Client::new();

    let short_key = client
        .post(format!("{}/register", server.http_url()))
        .json(&json!({ "clientID": "bob", "authKey": "short" }))
        .send()
        .await
        .unwrap();
    assert_eq!(short_key.status(), reqwest::StatusCode::BAD_REQUEST);

    client
        .post(format!("{}/register", server.http_url()))
        .json(&json!({ "clientID": "bob", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();

    let duplicate = client
        .post(format!("{}/register", server.http_url()))
        .json(&json!({ "clientID": "bob", "authKey": "a-different-secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), reqwest::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unregister_forbids_non_admin_mismatch() {
    let server = TestServer::start().await;
    let client = Client::new();

    for (id, key) in [("carol", "correct-horse-battery"), ("dave", "another-long-secret")] {
        client
            .post(format!("{}/register", server.http_url()))
            .json(&json!({ "clientID": id, "authKey": key }))
            .send()
            .await
            .unwrap();
    }

    let carol_login: serde_json::Value = client
        .post(format!("{}/login", server.http_url()))
        .json(&json!({ "clientID": "carol", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let carol_token = carol_login["bearerToken"].as_str().unwrap();

    let mismatched = client
        .post(format!("{}/unregister", server.http_url()))
        .bearer_auth(carol_token)
        .json(&json!({ "clientID": "dave" }))
        .send()
        .await
        .unwrap();
    assert_eq!(mismatched.status(), reqwest::StatusCode::FORBIDDEN);

    let self_unregister = client
        .post(format!("{}/unregister", server.http_url()))
        .bearer_auth(carol_token)
        .json(&json!({ "clientID": "carol" }))
        .send()
        .await
        .unwrap();
    assert_eq!(self_unregister.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn version_and_system_require_no_auth() {
    let server = TestServer::start().await;
    let client = Client::new();

    let version = client.get(format!("{}/version", server.http_url())).send().await.unwrap();
    assert_eq!(version.status(), reqwest::StatusCode::OK);
    let version_body: serde_json::Value = version.json().await.unwrap();
    assert!(version_body["buildVersion"].is_string());

    let system = client.get(format!("{}/system", server.http_url())).send().await.unwrap();
    assert_eq!(system.status(), reqwest::StatusCode::OK);
}

#[tokio::test]
async fn ws_join_without_auth_is_rejected() {
    let server = TestServer::start().await;
    let result = tokio_tungstenite::connect_async(server.ws_url()).await;
    assert!(result.is_err(), "ws upgrade without Authorization should fail");
}

#[tokio::test]
async fn ws_join_then_hello() {
    let server = TestServer::start().await;
    let client = Client::new();

    client
        .post(format!("{}/register", server.http_url()))
        .json(&json!({ "clientID": "erin", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .unwrap();
    let login: serde_json::Value = client
        .post(format!("{}/login", server.http_url()))
        .json(&json!({ "clientID": "erin", "authKey": "correct-horse-battery" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["bearerToken"].as_str().unwrap();

    let mut request = server.ws_url().into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Authorization", format!("Bearer {token}").parse().unwrap());

    let (mut ws, _response) = tokio_tungstenite::connect_async(request).await.expect("ws upgrade");

    let join = ClientEnvelope::Join(JoinData {
        group_id: "g1".to_string(),
        call_id: "c1".to_string(),
        user_id: "erin".to_string(),
        session_id: "s1".to_string(),
        props: HashMap::new(),
    });
    ws.send(Message::Binary(join.encode_msgpack().unwrap().into())).await.unwrap();

    let reply = timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for hello")
        .expect("stream ended")
        .expect("ws error");

    let Message::Binary(bytes) = reply else { panic!("expected binary hello frame") };
    match ServerEnvelope::decode_msgpack(&bytes).expect("decode hello") {
        ServerEnvelope::Hello(HelloData { conn_id }) => {
            assert_ne!(conn_id, uuid::Uuid::nil());
        }
        other => panic!("expected hello, got {other:?}"),
    }
}
