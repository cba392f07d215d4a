//! 内存消息存储
//!
//! 每个房间一份有序日志，由异步互斥锁保护。写入在持锁期间完成授权、
//! 分配时间戳、追加日志和广播，所以同一房间的日志顺序、`created_at`
//! 顺序与订阅者收到的顺序三者一致。

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use application::{
    ApplicationError, Clock, EventBus, MessageHandler, MessageStore, RoomEvent, RoomStore,
    StatusHandler, Subscription, SubscriptionStatus, Topic,
};
use async_trait::async_trait;
use domain::{ClientMsgId, Message, MessageContent, MessageId, RoomId, UserId};
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct RoomLog {
    messages: VecDeque<Message>,
}

pub struct MemoryMessageStore {
    room_store: Arc<dyn RoomStore>,
    clock: Arc<dyn Clock>,
    bus: Arc<EventBus>,
    max_messages_per_room: usize,
    logs: RwLock<HashMap<RoomId, Arc<Mutex<RoomLog>>>>,
}

impl MemoryMessageStore {
    pub fn new(
        room_store: Arc<dyn RoomStore>,
        clock: Arc<dyn Clock>,
        bus: Arc<EventBus>,
        max_messages_per_room: usize,
    ) -> Self {
        Self {
            room_store,
            clock,
            bus,
            max_messages_per_room: max_messages_per_room.max(1),
            logs: RwLock::new(HashMap::new()),
        }
    }

    async fn log_for(&self, room_id: RoomId) -> Arc<Mutex<RoomLog>> {
        if let Some(log) = self.logs.read().await.get(&room_id) {
            return log.clone();
        }
        self.logs
            .write()
            .await
            .entry(room_id)
            .or_default()
            .clone()
    }
}

fn notify_status(handler: &StatusHandler, status: SubscriptionStatus) {
    if catch_unwind(AssertUnwindSafe(|| handler(status))).is_err() {
        tracing::error!(?status, "订阅状态回调 panic，已隔离");
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn send_message(
        &self,
        room_id: RoomId,
        sender_id: UserId,
        content: MessageContent,
        client_msg_id: ClientMsgId,
    ) -> Result<Message, ApplicationError> {
        // 先校验一次，避免为不存在的房间建立日志
        if !self.logs.read().await.contains_key(&room_id) {
            self.room_store
                .authorize_sender(room_id, sender_id, self.clock.now())
                .await?;
        }

        let log = self.log_for(room_id).await;
        let mut log = log.lock().await;

        let now = self.clock.now();
        self.room_store
            .authorize_sender(room_id, sender_id, now)
            .await?;

        let created_at = match log.messages.back() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };
        let message = Message::new(
            MessageId::generate(),
            room_id,
            sender_id,
            content,
            client_msg_id,
            created_at,
        );

        log.messages.push_back(message.clone());
        while log.messages.len() > self.max_messages_per_room {
            log.messages.pop_front();
        }

        let receivers = self
            .bus
            .publish(Topic::Message(room_id), RoomEvent::Message(message.clone()));
        tracing::debug!(
            room_id = %room_id,
            message_id = %message.id,
            receivers,
            "消息已写入"
        );

        Ok(message)
    }

    async fn get_messages(
        &self,
        room_id: RoomId,
        limit: usize,
    ) -> Result<Vec<Message>, ApplicationError> {
        let Some(log) = self.logs.read().await.get(&room_id).cloned() else {
            return Ok(Vec::new());
        };
        let log = log.lock().await;
        let skip = log.messages.len().saturating_sub(limit);
        Ok(log.messages.iter().skip(skip).cloned().collect())
    }

    fn subscribe_to_messages(
        &self,
        room_id: RoomId,
        on_message: MessageHandler,
        on_status: Option<StatusHandler>,
    ) -> Subscription {
        let registration = self.bus.register(Topic::Message(room_id), move |event| {
            if let RoomEvent::Message(message) = event {
                on_message(message);
            }
        });

        if let Some(handler) = &on_status {
            notify_status(handler, SubscriptionStatus::Subscribed);
        }

        let bus = self.bus.clone();
        Subscription::new(move || {
            bus.unregister(&registration);
            if let Some(handler) = &on_status {
                notify_status(handler, SubscriptionStatus::Closed);
            }
        })
    }

    async fn evict_room(&self, room_id: RoomId) -> Result<usize, ApplicationError> {
        let Some(log) = self.logs.write().await.remove(&room_id) else {
            return Ok(0);
        };
        let evicted = log.lock().await.messages.len();
        tracing::debug!(room_id = %room_id, evicted, "已清除房间消息");
        Ok(evicted)
    }
}
