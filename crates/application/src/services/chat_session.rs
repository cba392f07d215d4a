use std::sync::{Arc, Mutex};

use domain::{Message, RecentRoom, RecentRooms, Room, RoomId, UserId};

use crate::{
    clock::Clock,
    error::ApplicationError,
    identity::IdentityProvider,
    services::chat_service::{ChatService, CreateRoomRequest, JoinRoomRequest, SendMessageRequest},
    subscription::{MessageHandler, PresenceHandler, StatusHandler, Subscription},
};

/// 客户端会话
///
/// 把匿名身份绑定到门面上，对外提供不带用户参数的操作集合，
/// 并维护最近访问的房间列表。
pub struct ChatSession {
    identity: Arc<dyn IdentityProvider>,
    service: Arc<ChatService>,
    clock: Arc<dyn Clock>,
    recent: Mutex<RecentRooms>,
}

impl ChatSession {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        service: Arc<ChatService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            identity,
            service,
            clock,
            recent: Mutex::new(RecentRooms::new()),
        }
    }

    pub async fn ensure_authenticated(&self) -> Result<(), ApplicationError> {
        self.identity.ensure_authenticated().await
    }

    pub async fn user_id(&self) -> Result<UserId, ApplicationError> {
        self.identity.ensure_authenticated().await?;
        self.identity.user_id().await
    }

    pub async fn create_room(&self, ttl_seconds: u32) -> Result<Room, ApplicationError> {
        let owner_id = self.user_id().await?;
        let room = self
            .service
            .create_room(CreateRoomRequest {
                owner_id,
                ttl_seconds,
            })
            .await?;
        self.remember(&room, true);
        Ok(room)
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, ApplicationError> {
        self.service.get_room(room_id).await
    }

    pub async fn join_room(&self, room_id: RoomId) -> Result<Room, ApplicationError> {
        let user_id = self.user_id().await?;
        let room = self
            .service
            .join_room(JoinRoomRequest { room_id, user_id })
            .await?;
        self.remember(&room, room.created_by == user_id);
        Ok(room)
    }

    /// 发送失败时调用方仍持有原始内容，可以重新填回输入框
    pub async fn send_message(
        &self,
        room_id: RoomId,
        content: &str,
        client_msg_id: Option<&str>,
    ) -> Result<Message, ApplicationError> {
        let sender_id = self.user_id().await?;
        self.service
            .send_message(SendMessageRequest {
                room_id,
                sender_id,
                content: content.to_owned(),
                client_msg_id: client_msg_id.map(str::to_owned),
            })
            .await
    }

    pub async fn load_messages(
        &self,
        room_id: RoomId,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ApplicationError> {
        self.service.load_messages(room_id, limit).await
    }

    /// 必须在 tokio 运行时内调用
    pub fn subscribe(
        &self,
        room_id: RoomId,
        on_message: MessageHandler,
        on_status: Option<StatusHandler>,
    ) -> Subscription {
        self.service.subscribe(room_id, on_message, on_status)
    }

    pub fn subscribe_to_presence(
        &self,
        room_id: RoomId,
        on_count: PresenceHandler,
    ) -> Subscription {
        self.service.subscribe_to_presence(room_id, on_count)
    }

    /// 最近访问的房间（最新在前，已过期的被剔除）
    pub fn recent_rooms(&self) -> Vec<RecentRoom> {
        let now = self.clock.now();
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .list(now)
    }

    fn remember(&self, room: &Room, is_owner: bool) {
        let now = self.clock.now();
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(room, is_owner, now);
    }
}
