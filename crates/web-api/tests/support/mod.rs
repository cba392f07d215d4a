#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use application::ManualClock;
use config::AppConfig;
use infrastructure::MemoryBackend;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState, USER_HEADER};

/// 基于内存后端的测试服务器，时钟可手动推进
pub struct TestServer {
    pub addr: SocketAddr,
    pub clock: Arc<ManualClock>,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        let clock = Arc::new(ManualClock::default());
        let backend = MemoryBackend::with_clock(&AppConfig::default(), clock.clone());
        let app = router(AppState::new(backend.chat_service.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // allow server to start
        sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            clock,
            client: Client::new(),
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub async fn new_user(&self) -> String {
        let body: Value = self
            .client
            .post(self.http("/api/v1/identity"))
            .send()
            .await
            .expect("issue identity")
            .json()
            .await
            .expect("identity json");
        body["user_id"].as_str().expect("user_id").to_string()
    }

    pub async fn create_room(&self, user: &str, ttl_seconds: u32) -> Value {
        let response = self
            .client
            .post(self.http("/api/v1/rooms"))
            .header(USER_HEADER, user)
            .json(&json!({ "ttl_seconds": ttl_seconds }))
            .send()
            .await
            .expect("create room");
        assert_eq!(response.status(), 201);
        response.json().await.expect("room json")
    }

    pub async fn join_room(&self, user: &str, room_id: &str) -> reqwest::Response {
        self.client
            .post(self.http(&format!("/api/v1/rooms/{room_id}/join")))
            .header(USER_HEADER, user)
            .send()
            .await
            .expect("join room")
    }

    pub async fn send_message(
        &self,
        user: &str,
        room_id: &str,
        content: &str,
        client_msg_id: Option<&str>,
    ) -> reqwest::Response {
        self.client
            .post(self.http(&format!("/api/v1/rooms/{room_id}/messages")))
            .header(USER_HEADER, user)
            .json(&json!({ "content": content, "client_msg_id": client_msg_id }))
            .send()
            .await
            .expect("send message")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
