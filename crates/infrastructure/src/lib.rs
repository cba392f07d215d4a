//! 基础设施层实现。
//!
//! 提供房间、消息与在线状态的内存存储，匿名身份提供者，
//! 以及过期清理任务，实现应用层定义的接口。

pub mod builder;
pub mod identity;
pub mod message_store;
pub mod presence;
pub mod room_store;
pub mod sweeper;

pub use builder::MemoryBackend;
pub use identity::{FileIdentityProvider, MemoryIdentityProvider};
pub use message_store::MemoryMessageStore;
pub use presence::MemoryPresenceTracker;
pub use room_store::MemoryRoomStore;
pub use sweeper::{ExpirySweeper, SweepReport};
