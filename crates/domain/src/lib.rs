//! 临时匿名聊天室核心领域模型
//!
//! 包含房间、消息等核心实体，以及过期、成员资格和消息合并相关的业务规则。
//! 本 crate 不做任何 I/O。

pub mod errors;
pub mod message;
pub mod recent_rooms;
pub mod reconcile;
pub mod room;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use message::*;
pub use recent_rooms::*;
pub use reconcile::*;
pub use room::*;
pub use value_objects::*;
