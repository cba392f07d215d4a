use serde::{Deserialize, Serialize};

use crate::value_objects::{ClientMsgId, MessageContent, MessageId, RoomId, Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub content: MessageContent,
    /// 由存储在写入时分配，用于排序
    pub created_at: Timestamp,
    pub client_msg_id: ClientMsgId,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        client_msg_id: ClientMsgId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender_id,
            content,
            created_at,
            client_msg_id,
        }
    }

    /// 客户端乐观回显用的占位消息，带临时 id，等服务端副本到达后被替换。
    pub fn pending(
        room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        client_msg_id: ClientMsgId,
        now: Timestamp,
    ) -> Self {
        Self::new(
            MessageId::generate(),
            room_id,
            sender_id,
            content,
            client_msg_id,
            now,
        )
    }

    /// 同一条逻辑消息：`id` 相同，或双方 `client_msg_id` 均非空且相同。
    pub fn is_same_as(&self, other: &Message) -> bool {
        self.id == other.id
            || (!self.client_msg_id.is_empty() && self.client_msg_id == other.client_msg_id)
    }
}
