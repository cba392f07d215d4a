mod support;

use chrono::Duration;
use serde_json::{json, Value};
use support::TestServer;
use web_api::USER_HEADER;

#[tokio::test]
async fn health_and_identity() {
    let server = TestServer::start().await;

    let health = server.client.get(server.http("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let response = server
        .client
        .post(server.http("/api/v1/identity"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.unwrap();
    assert!(body["user_id"].as_str().unwrap().parse::<uuid::Uuid>().is_ok());
}

#[tokio::test]
async fn room_lifecycle_over_http() {
    let server = TestServer::start().await;
    let owner = server.new_user().await;
    let guest = server.new_user().await;

    let room = server.create_room(&owner, 300).await;
    let room_id = room["id"].as_str().unwrap().to_string();
    assert_eq!(room["status"], "active");
    assert_eq!(room["created_by"], owner.as_str());
    assert_eq!(room["ttl_seconds"], 300);

    let fetched: Value = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{room_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, room);

    assert_eq!(server.join_room(&guest, &room_id).await.status(), 200);

    let first = server.send_message(&owner, &room_id, "hello", Some("c1")).await;
    assert_eq!(first.status(), 201);
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["client_msg_id"], "c1");
    assert_eq!(first["sender_id"], owner.as_str());

    let second = server.send_message(&guest, &room_id, "hi back", None).await;
    assert_eq!(second.status(), 201);

    let history: Vec<Value> = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{room_id}/messages")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["content"], "hello");
    assert_eq!(history[1]["content"], "hi back");

    let limited: Vec<Value> = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{room_id}/messages?limit=1")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0]["content"], "hi back");
}

#[tokio::test]
async fn error_statuses_are_distinct() {
    let server = TestServer::start().await;
    let owner = server.new_user().await;
    let stranger = server.new_user().await;
    let room = server.create_room(&owner, 300).await;
    let room_id = room["id"].as_str().unwrap().to_string();

    // 未知房间
    let missing = uuid::Uuid::new_v4();
    let response = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{missing}")))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ROOM_NOT_FOUND");

    // 非成员发消息
    let response = server.send_message(&stranger, &room_id, "let me in", None).await;
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NOT_A_MEMBER");

    // 缺少身份
    let response = server
        .client
        .post(server.http("/api/v1/rooms"))
        .json(&json!({ "ttl_seconds": 300 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // 不允许的存活时长与空消息
    let response = server
        .client
        .post(server.http("/api/v1/rooms"))
        .header(USER_HEADER, &owner)
        .json(&json!({ "ttl_seconds": 301 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let response = server.send_message(&owner, &room_id, "   ", None).await;
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    // 过期
    server.clock.advance(Duration::seconds(300));
    let response = server.join_room(&stranger, &room_id).await;
    assert_eq!(response.status(), 410);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ROOM_EXPIRED");

    let response = server.send_message(&owner, &room_id, "too late", None).await;
    assert_eq!(response.status(), 410);

    let expired: Value = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{room_id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(expired["status"], "expired");
}

#[tokio::test]
async fn presence_is_zero_without_connections() {
    let server = TestServer::start().await;
    let owner = server.new_user().await;
    let room = server.create_room(&owner, 600).await;
    let room_id = room["id"].as_str().unwrap();

    let body: Value = server
        .client
        .get(server.http(&format!("/api/v1/rooms/{room_id}/presence")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn malformed_room_id_reads_as_not_found() {
    let server = TestServer::start().await;
    let user = server.new_user().await;

    let response = server.join_room(&user, "abc123").await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ROOM_NOT_FOUND");
    assert_eq!(body["message"], "room not found");

    let response = server
        .client
        .get(server.http("/api/v1/rooms/abc123"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ROOM_NOT_FOUND");

    let response = server.send_message(&user, "abc123", "hi", None).await;
    assert_eq!(response.status(), 404);

    let response = server
        .client
        .get(server.http("/api/v1/rooms/abc123/messages"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
