use std::sync::Arc;

use config::RoomsConfig;
use domain::{
    ClientMsgId, DomainError, Message, MessageContent, Room, RoomId, RoomTtl, UserId,
    DEFAULT_ALLOWED_TTL_SECONDS, DEFAULT_MAX_CONTENT_CHARS,
};

use crate::{
    error::ApplicationError,
    presence::PresenceTracker,
    store::{MessageStore, RoomStore},
    subscription::{MessageHandler, PresenceHandler, StatusHandler, Subscription},
};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub owner_id: UserId,
    pub ttl_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct JoinRoomRequest {
    pub room_id: RoomId,
    pub user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: String,
    /// 为空时由服务生成
    pub client_msg_id: Option<String>,
}

/// 输入校验策略（来自配置）
#[derive(Debug, Clone)]
pub struct RoomPolicy {
    pub allowed_ttl_seconds: Vec<u32>,
    pub default_history_limit: u32,
    pub max_history_limit: u32,
    pub max_content_chars: usize,
}

impl RoomPolicy {
    pub fn from_config(config: &RoomsConfig) -> Self {
        Self {
            allowed_ttl_seconds: config.allowed_ttl_seconds.clone(),
            default_history_limit: config.default_history_limit,
            max_history_limit: config.max_history_limit,
            max_content_chars: config.max_content_chars,
        }
    }

    /// 未指定时取默认条数，超过上限时截断
    pub fn history_limit(&self, requested: Option<u32>) -> usize {
        requested
            .unwrap_or(self.default_history_limit)
            .min(self.max_history_limit) as usize
    }
}

impl Default for RoomPolicy {
    fn default() -> Self {
        Self {
            allowed_ttl_seconds: DEFAULT_ALLOWED_TTL_SECONDS.to_vec(),
            default_history_limit: 50,
            max_history_limit: 200,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

pub struct ChatServiceDependencies {
    pub room_store: Arc<dyn RoomStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub presence_tracker: Arc<dyn PresenceTracker>,
    pub policy: RoomPolicy,
}

/// 对外的房间/消息服务门面
///
/// 只做组合，不额外实施领域规则；过期、成员资格等检查全部由存储完成。
/// 后端是内存实现还是持久化实现，对调用方透明。
pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub fn policy(&self) -> &RoomPolicy {
        &self.deps.policy
    }

    pub async fn create_room(&self, request: CreateRoomRequest) -> Result<Room, ApplicationError> {
        let ttl = RoomTtl::new(request.ttl_seconds, &self.deps.policy.allowed_ttl_seconds)?;
        let room = self
            .deps
            .room_store
            .create_room(request.owner_id, ttl)
            .await?;

        tracing::info!(
            room_id = %room.id,
            owner_id = %room.created_by,
            ttl_seconds = ttl.as_seconds(),
            "房间已创建"
        );
        Ok(room)
    }

    pub async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, ApplicationError> {
        self.deps.room_store.get_room(room_id).await
    }

    pub async fn join_room(&self, request: JoinRoomRequest) -> Result<Room, ApplicationError> {
        match self
            .deps
            .room_store
            .join_room(request.room_id, request.user_id)
            .await
        {
            Ok(room) => {
                tracing::info!(room_id = %room.id, user_id = %request.user_id, "用户加入房间");
                Ok(room)
            }
            Err(err) => {
                tracing::info!(
                    room_id = %request.room_id,
                    user_id = %request.user_id,
                    error = %err,
                    "加入房间被拒绝"
                );
                Err(err)
            }
        }
    }

    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let content = MessageContent::new(request.content, self.deps.policy.max_content_chars)?;
        let client_msg_id = match request.client_msg_id {
            Some(id) if !id.is_empty() => ClientMsgId::new(id),
            _ => ClientMsgId::generate(),
        };

        let result = self
            .deps
            .message_store
            .send_message(request.room_id, request.sender_id, content, client_msg_id)
            .await;

        if let Err(ApplicationError::Domain(err)) = &result {
            tracing::debug!(
                room_id = %request.room_id,
                sender_id = %request.sender_id,
                code = err.code(),
                "消息被拒绝"
            );
        }
        result
    }

    pub async fn load_messages(
        &self,
        room_id: RoomId,
        limit: Option<u32>,
    ) -> Result<Vec<Message>, ApplicationError> {
        let limit = self.deps.policy.history_limit(limit);
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.deps.message_store.get_messages(room_id, limit).await
    }

    /// 订阅房间消息。
    ///
    /// 回调由事件总线的转发任务执行，必须在 tokio 运行时内调用，否则 panic。
    pub fn subscribe(
        &self,
        room_id: RoomId,
        on_message: MessageHandler,
        on_status: Option<StatusHandler>,
    ) -> Subscription {
        self.deps
            .message_store
            .subscribe_to_messages(room_id, on_message, on_status)
    }

    /// 订阅在线人数，运行时要求同 [`ChatService::subscribe`]
    pub fn subscribe_to_presence(
        &self,
        room_id: RoomId,
        on_count: PresenceHandler,
    ) -> Subscription {
        self.deps
            .presence_tracker
            .subscribe_to_presence(room_id, on_count)
    }

    pub fn presence_count(&self, room_id: RoomId) -> usize {
        self.deps.presence_tracker.connection_count(room_id)
    }

    /// 房间是否存在且处于活跃状态
    pub async fn ensure_active(&self, room_id: RoomId) -> Result<Room, ApplicationError> {
        let room = self
            .deps
            .room_store
            .get_room(room_id)
            .await?
            .ok_or(DomainError::RoomNotFound)?;
        if room.status != domain::RoomStatus::Active {
            return Err(DomainError::RoomExpired.into());
        }
        Ok(room)
    }
}
