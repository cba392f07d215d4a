//! 事件总线并发一致性测试
//!
//! 验证多个发布者、多个房间同时工作时，每个主题的投递顺序与发布顺序一致。

use std::sync::Arc;
use std::time::Duration;

use application::{EventBus, RoomEvent, Topic};
use domain::RoomId;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn collect(rx: &mut mpsc::UnboundedReceiver<usize>, expected: usize) -> Vec<usize> {
    let mut seen = Vec::with_capacity(expected);
    while seen.len() < expected {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(count)) => seen.push(count),
            _ => break,
        }
    }
    seen
}

/// 每个房间一个发布任务并发运行，订阅者各自只看到本房间的事件且顺序不乱
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rooms_keep_per_topic_order() {
    let bus = Arc::new(EventBus::new(1024));
    let rooms: Vec<RoomId> = (0..8).map(|_| RoomId::generate()).collect();

    let mut receivers = Vec::new();
    let mut registrations = Vec::new();
    for room in &rooms {
        let (tx, rx) = mpsc::unbounded_channel();
        registrations.push(bus.register(Topic::Presence(*room), move |event| {
            if let RoomEvent::Presence(count) = event {
                let _ = tx.send(count);
            }
        }));
        receivers.push(rx);
    }

    let mut publishers = Vec::new();
    for room in rooms.clone() {
        let bus = bus.clone();
        publishers.push(tokio::spawn(async move {
            for count in 0..200 {
                bus.publish(Topic::Presence(room), RoomEvent::Presence(count));
                if count % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    for rx in &mut receivers {
        let seen = collect(rx, 200).await;
        assert_eq!(seen, (0..200).collect::<Vec<_>>());
    }

    for registration in &registrations {
        bus.unregister(registration);
    }
}

/// 并发注册和注销后，主题上不会残留订阅者
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_register_unregister_leaves_no_subscribers() {
    let bus = Arc::new(EventBus::new(64));
    let topic = Topic::Message(RoomId::generate());

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let bus = bus.clone();
        tasks.push(tokio::spawn(async move {
            let registration = bus.register(topic, |_event| {});
            bus.publish(topic, RoomEvent::Presence(1));
            bus.unregister(&registration);
            bus.unregister(&registration);
            assert!(!registration.is_active());
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(bus.subscriber_count(topic), 0);
    assert_eq!(bus.topic_count(), 0);
}
