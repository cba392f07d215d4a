use axum::{
    extract::{FromRequestParts, Path, Query, State, WebSocketUpgrade},
    http::{request::Parts, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use application::{CreateRoomRequest, IdentityProvider, JoinRoomRequest, SendMessageRequest};
use domain::{DomainError, Message, Room, RoomId, UserId};
use infrastructure::MemoryIdentityProvider;

use crate::{
    auth::AnonymousUser, error::ApiError, state::AppState, ws_connection::WebSocketConnection,
};

#[derive(Debug, Serialize)]
struct IdentityResponse {
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct CreateRoomPayload {
    ttl_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
    client_msg_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct PresenceResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    pub user_id: Option<UserId>,
}

/// 路径中的房间 id
///
/// 房间 id 对客户端是不透明字符串，无法解析的 id 与不存在的房间同样处理。
#[derive(Debug, Clone, Copy)]
pub(crate) struct RoomPath(pub RoomId);

impl<S> FromRequestParts<S> for RoomPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        raw.trim()
            .parse::<RoomId>()
            .map(RoomPath)
            .map_err(|_| DomainError::RoomNotFound.into())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/identity", post(issue_identity))
        .route("/rooms", post(create_room))
        .route("/rooms/{room_id}", get(get_room))
        .route("/rooms/{room_id}/join", post(join_room))
        .route(
            "/rooms/{room_id}/messages",
            post(send_message).get(get_history),
        )
        .route("/rooms/{room_id}/presence", get(get_presence))
        .route("/rooms/{room_id}/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 签发新的匿名身份，由客户端自行保存
async fn issue_identity() -> Result<(StatusCode, Json<IdentityResponse>), ApiError> {
    let identity = MemoryIdentityProvider::new();
    identity.ensure_authenticated().await?;
    let user_id = identity.user_id().await?;

    Ok((StatusCode::CREATED, Json(IdentityResponse { user_id })))
}

async fn create_room(
    State(state): State<AppState>,
    AnonymousUser(owner_id): AnonymousUser,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    let room = state
        .chat_service
        .create_room(CreateRoomRequest {
            owner_id,
            ttl_seconds: payload.ttl_seconds,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(room)))
}

async fn get_room(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
) -> Result<Json<Room>, ApiError> {
    let room = state
        .chat_service
        .get_room(room_id)
        .await?
        .ok_or(DomainError::RoomNotFound)?;

    Ok(Json(room))
}

async fn join_room(
    State(state): State<AppState>,
    AnonymousUser(user_id): AnonymousUser,
    RoomPath(room_id): RoomPath,
) -> Result<Json<Room>, ApiError> {
    let room = state
        .chat_service
        .join_room(JoinRoomRequest { room_id, user_id })
        .await?;

    Ok(Json(room))
}

async fn send_message(
    State(state): State<AppState>,
    AnonymousUser(sender_id): AnonymousUser,
    RoomPath(room_id): RoomPath,
    Json(payload): Json<SendMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state
        .chat_service
        .send_message(SendMessageRequest {
            room_id,
            sender_id,
            content: payload.content,
            client_msg_id: payload.client_msg_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

async fn get_history(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let items = state
        .chat_service
        .load_messages(room_id, query.limit)
        .await?;

    Ok(Json(items))
}

async fn get_presence(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
) -> Json<PresenceResponse> {
    Json(PresenceResponse {
        count: state.chat_service.presence_count(room_id),
    })
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    RoomPath(room_id): RoomPath,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // 房间不存在或已过期时直接拒绝升级
    state.chat_service.ensure_active(room_id).await?;

    let connection = WebSocketConnection::new(state, room_id, query.user_id);
    Ok(ws.on_upgrade(move |socket| connection.run(socket)))
}
