use domain::RoomId;

use crate::subscription::{PresenceHandler, Subscription};

/// 在线状态跟踪器
///
/// 统计的是房间的在线连接数而不是用户数：同一用户多个标签页各算一个连接。
pub trait PresenceTracker: Send + Sync {
    /// 登记一个新连接。
    ///
    /// 回调先同步收到登记后的连接数，其余订阅者随后异步收到广播。
    /// 取消订阅时移除该连接，并把新的连接数广播给剩余订阅者。
    /// 同步回调可能在跟踪器内部持锁时执行，回调中不能再调用跟踪器。
    /// 内存实现依赖 tokio 运行时投递广播，调用方需处于运行时上下文中。
    fn subscribe_to_presence(&self, room_id: RoomId, on_count: PresenceHandler) -> Subscription;

    /// 房间当前的在线连接数
    fn connection_count(&self, room_id: RoomId) -> usize;
}
