//! 房间与消息存储接口
//!
//! 内存实现与持久化/网络实现必须满足同一份契约，调用方无需改动即可替换。

use async_trait::async_trait;
use domain::{ClientMsgId, Message, MessageContent, Room, RoomId, RoomTtl, Timestamp, UserId};

use crate::error::ApplicationError;
use crate::subscription::{MessageHandler, StatusHandler, Subscription};

/// 房间存储：独占房间记录和成员集合
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// 创建房间，创建者自动成为成员
    async fn create_room(&self, created_by: UserId, ttl: RoomTtl)
        -> Result<Room, ApplicationError>;

    /// 查询房间；到期的房间在返回前被标记为过期
    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, ApplicationError>;

    /// 加入房间，重复加入是无操作。房间不存在或已过期时失败，且不修改成员集合。
    async fn join_room(&self, room_id: RoomId, user_id: UserId)
        -> Result<Room, ApplicationError>;

    /// 校验房间在 `at` 时刻处于活跃状态且 `user_id` 是成员
    async fn authorize_sender(
        &self,
        room_id: RoomId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<Room, ApplicationError>;

    async fn is_member(&self, room_id: RoomId, user_id: UserId)
        -> Result<bool, ApplicationError>;

    /// 把所有到期的活跃房间标记为过期，返回本次转换的房间
    async fn expire_due(&self, now: Timestamp) -> Result<Vec<RoomId>, ApplicationError>;

    /// 在 `now` 时刻已过期的全部房间，包括此前已被惰性标记的
    async fn expired_rooms(&self, now: Timestamp) -> Result<Vec<RoomId>, ApplicationError>;

    /// 删除 `expires_at <= cutoff` 的房间及其成员集合，返回被删除的房间
    async fn purge_expired_before(&self, cutoff: Timestamp)
        -> Result<Vec<RoomId>, ApplicationError>;
}

/// 消息存储：独占每个房间的有序消息日志
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// 写入消息并广播给该房间的订阅者。
    ///
    /// `client_msg_id` 按原样保存，存储本身不做唯一性校验，去重由读取方合并完成。
    async fn send_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        client_msg_id: ClientMsgId,
    ) -> Result<Message, ApplicationError>;

    /// 最近 `limit` 条消息，按 `created_at` 升序
    async fn get_messages(&self, room_id: RoomId, limit: usize)
        -> Result<Vec<Message>, ApplicationError>;

    /// 订阅房间消息。注册时同步回调 `Subscribed`，取消时回调 `Closed`。
    ///
    /// 内存实现依赖 tokio 运行时投递消息，调用方需处于运行时上下文中。
    fn subscribe_to_messages(
        &self,
        room_id: RoomId,
        on_message: MessageHandler,
        on_status: Option<StatusHandler>,
    ) -> Subscription;

    /// 清空房间的消息日志，返回被清除的条数
    async fn evict_room(&self, room_id: RoomId) -> Result<usize, ApplicationError>;
}
