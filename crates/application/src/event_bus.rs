//! 进程内事件总线
//!
//! 每个房间两个主题：`message:<room_id>` 和 `presence:<room_id>`。
//! 每个主题对应一个 `tokio::sync::broadcast` 通道，每个订阅者一个转发任务：
//! - 同一主题内投递顺序等于发布顺序；
//! - 发布之后才注册的订阅者收不到之前的事件；
//! - 订阅者回调 panic 只会被记录，不影响其他订阅者，也不影响自己后续的投递；
//! - 主题的最后一个订阅注销时立即释放通道。

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use domain::{Message, RoomId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Message(RoomId),
    Presence(RoomId),
}

impl Topic {
    pub fn room_id(&self) -> RoomId {
        match self {
            Topic::Message(room_id) | Topic::Presence(room_id) => *room_id,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Message(room_id) => write!(f, "message:{room_id}"),
            Topic::Presence(room_id) => write!(f, "presence:{room_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Message(Message),
    Presence(usize),
}

/// 一次注册的凭证，交给 `EventBus::unregister` 注销
#[derive(Debug)]
pub struct Registration {
    topic: Topic,
    active: Arc<AtomicBool>,
    task: AbortHandle,
}

impl Registration {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct TopicChannel {
    sender: broadcast::Sender<RoomEvent>,
    /// 尚未注销的注册数。被中止的转发任务异步释放接收端，
    /// 不能用 `receiver_count` 判断主题是否还有人订阅。
    registrations: usize,
}

pub struct EventBus {
    capacity: usize,
    topics: Mutex<HashMap<Topic, TopicChannel>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// 向主题当前所有订阅者发布事件，返回接收者数量
    pub fn publish(&self, topic: Topic, event: RoomEvent) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        match topics.get(&topic) {
            Some(channel) => channel.sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// 注册回调。必须在 tokio 运行时内调用，否则 panic。
    pub fn register<F>(&self, topic: Topic, handler: F) -> Registration
    where
        F: Fn(RoomEvent) + Send + Sync + 'static,
    {
        let mut receiver = {
            let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
            let channel = topics.entry(topic).or_insert_with(|| TopicChannel {
                sender: broadcast::channel(self.capacity).0,
                registrations: 0,
            });
            channel.registrations += 1;
            channel.sender.subscribe()
        };

        let active = Arc::new(AtomicBool::new(true));
        let task_active = active.clone();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if !task_active.load(Ordering::SeqCst) {
                            break;
                        }
                        if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                            tracing::error!(topic = %topic, "订阅者回调 panic，已隔离");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "订阅者处理过慢，丢弃了最旧的事件");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        tracing::debug!(topic = %topic, "注册事件订阅");

        Registration {
            topic,
            active,
            task: task.abort_handle(),
        }
    }

    /// 注销回调，可重复调用
    pub fn unregister(&self, registration: &Registration) {
        if !registration.active.swap(false, Ordering::SeqCst) {
            return;
        }
        registration.task.abort();

        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(channel) = topics.get_mut(&registration.topic) {
            channel.registrations = channel.registrations.saturating_sub(1);
            if channel.registrations == 0 {
                topics.remove(&registration.topic);
            }
        }
        tracing::debug!(topic = %registration.topic, "注销事件订阅");
    }

    /// 主题当前未注销的订阅数量
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics
            .get(&topic)
            .map(|channel| channel.registrations)
            .unwrap_or(0)
    }

    /// 仍持有通道的主题数
    pub fn topic_count(&self) -> usize {
        self.topics.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
