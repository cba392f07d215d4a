//! 订阅句柄与回调类型

use std::fmt;
use std::sync::{Arc, Mutex};

use domain::Message;
use serde::{Deserialize, Serialize};

/// 订阅通道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Subscribed,
    Closed,
    ChannelError,
}

pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;
pub type StatusHandler = Arc<dyn Fn(SubscriptionStatus) + Send + Sync>;
pub type PresenceHandler = Arc<dyn Fn(usize) + Send + Sync>;

type Closer = Box<dyn FnOnce() + Send>;

/// 取消订阅句柄
///
/// `unsubscribe` 可以重复调用，只有第一次生效。句柄被丢弃时也会自动取消订阅。
#[must_use = "dropping the handle unsubscribes"]
pub struct Subscription {
    closer: Mutex<Option<Closer>>,
}

impl Subscription {
    pub fn new(on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closer: Mutex::new(Some(Box::new(on_close))),
        }
    }

    pub fn unsubscribe(&self) {
        let closer = self
            .closer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(close) = closer {
            close();
        }
    }

    pub fn is_active(&self) -> bool {
        self.closer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
