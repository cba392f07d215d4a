//! 应用层实现。
//!
//! 定义存储、在线状态与身份的接口，提供进程内事件总线，
//! 以及组合这些组件的门面服务 `ChatService` 和客户端会话 `ChatSession`。

pub mod clock;
pub mod error;
pub mod event_bus;
pub mod identity;
pub mod presence;
pub mod services;
pub mod store;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ApplicationError;
pub use event_bus::{EventBus, Registration, RoomEvent, Topic};
pub use identity::IdentityProvider;
pub use presence::PresenceTracker;
pub use services::{
    ChatService, ChatServiceDependencies, ChatSession, CreateRoomRequest, JoinRoomRequest,
    RoomPolicy, SendMessageRequest,
};
pub use store::{MessageStore, RoomStore};
pub use subscription::{
    MessageHandler, PresenceHandler, StatusHandler, Subscription, SubscriptionStatus,
};
