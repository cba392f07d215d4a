//! 内存在线状态跟踪
//!
//! 连接登记、计数广播和注册回调在同一把锁内完成，
//! 保证计数变化按发生顺序发布，新连接不会收到自己登记前的计数。

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use application::{EventBus, PresenceHandler, PresenceTracker, RoomEvent, Subscription, Topic};
use domain::{ConnectionId, RoomId};

type Connections = HashMap<RoomId, HashSet<ConnectionId>>;

pub struct MemoryPresenceTracker {
    bus: Arc<EventBus>,
    connections: Arc<Mutex<Connections>>,
}

impl MemoryPresenceTracker {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            connections: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

fn lock(connections: &Mutex<Connections>) -> MutexGuard<'_, Connections> {
    connections.lock().unwrap_or_else(|e| e.into_inner())
}

impl PresenceTracker for MemoryPresenceTracker {
    fn subscribe_to_presence(&self, room_id: RoomId, on_count: PresenceHandler) -> Subscription {
        let connection_id = ConnectionId::generate();
        let topic = Topic::Presence(room_id);

        let registration = {
            let mut connections = lock(&self.connections);
            let room = connections.entry(room_id).or_default();
            room.insert(connection_id);
            let count = room.len();

            // 先通知已有订阅者，再注册自己
            self.bus.publish(topic, RoomEvent::Presence(count));

            let handler = on_count.clone();
            let registration = self.bus.register(topic, move |event| {
                if let RoomEvent::Presence(count) = event {
                    handler(count);
                }
            });

            if catch_unwind(AssertUnwindSafe(|| on_count(count))).is_err() {
                tracing::error!(room_id = %room_id, "在线人数回调 panic，已隔离");
            }
            tracing::debug!(room_id = %room_id, connection_id = %connection_id, count, "连接上线");
            registration
        };

        let bus = self.bus.clone();
        let connections = self.connections.clone();
        Subscription::new(move || {
            let mut connections = lock(&connections);
            let count = match connections.get_mut(&room_id) {
                Some(room) => {
                    room.remove(&connection_id);
                    room.len()
                }
                None => 0,
            };
            if count == 0 {
                connections.remove(&room_id);
            }

            bus.unregister(&registration);
            bus.publish(topic, RoomEvent::Presence(count));
            tracing::debug!(room_id = %room_id, connection_id = %connection_id, count, "连接下线");
        })
    }

    fn connection_count(&self, room_id: RoomId) -> usize {
        lock(&self.connections)
            .get(&room_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn recorder() -> (PresenceHandler, mpsc::UnboundedReceiver<usize>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: PresenceHandler = Arc::new(move |count| {
            let _ = tx.send(count);
        });
        (handler, rx)
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<usize>) -> Option<usize> {
        timeout(Duration::from_millis(500), rx.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn new_connection_sees_its_own_count_synchronously() {
        let tracker = MemoryPresenceTracker::new(Arc::new(EventBus::new(16)));
        let room = RoomId::generate();
        let (handler, mut rx) = recorder();

        let _subscription = tracker.subscribe_to_presence(room, handler);

        assert_eq!(rx.try_recv().ok(), Some(1));
        assert_eq!(tracker.connection_count(room), 1);
    }

    #[tokio::test]
    async fn existing_connections_follow_attach_and_detach() {
        let tracker = MemoryPresenceTracker::new(Arc::new(EventBus::new(16)));
        let room = RoomId::generate();
        let (first, mut first_rx) = recorder();
        let (second, mut second_rx) = recorder();

        let _a = tracker.subscribe_to_presence(room, first);
        assert_eq!(next(&mut first_rx).await, Some(1));

        let b = tracker.subscribe_to_presence(room, second);
        assert_eq!(next(&mut second_rx).await, Some(2));
        assert_eq!(next(&mut first_rx).await, Some(2));

        b.unsubscribe();
        assert_eq!(next(&mut first_rx).await, Some(1));
        assert_eq!(tracker.connection_count(room), 1);

        // 已取消的订阅不再收到任何计数
        b.unsubscribe();
        assert_eq!(next(&mut second_rx).await, None);
        assert_eq!(tracker.connection_count(room), 1);
    }

    #[tokio::test]
    async fn same_user_in_two_tabs_counts_twice() {
        let tracker = MemoryPresenceTracker::new(Arc::new(EventBus::new(16)));
        let room = RoomId::generate();
        let (tab_one, _rx1) = recorder();
        let (tab_two, _rx2) = recorder();

        let one = tracker.subscribe_to_presence(room, tab_one);
        let two = tracker.subscribe_to_presence(room, tab_two);
        assert_eq!(tracker.connection_count(room), 2);

        drop(one);
        drop(two);
        assert_eq!(tracker.connection_count(room), 0);
    }
}
