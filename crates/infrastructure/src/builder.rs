use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, Clock, EventBus, IdentityProvider, MessageStore,
    PresenceTracker, RoomPolicy, RoomStore, SystemClock,
};
use config::AppConfig;

use crate::{
    identity::{FileIdentityProvider, MemoryIdentityProvider},
    message_store::MemoryMessageStore,
    presence::MemoryPresenceTracker,
    room_store::MemoryRoomStore,
    sweeper::ExpirySweeper,
};

/// 内存后端的组装结果
#[derive(Clone)]
pub struct MemoryBackend {
    pub clock: Arc<dyn Clock>,
    pub bus: Arc<EventBus>,
    pub room_store: Arc<dyn RoomStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub presence_tracker: Arc<dyn PresenceTracker>,
    pub chat_service: Arc<ChatService>,
    pub sweeper: Arc<ExpirySweeper>,
}

impl MemoryBackend {
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let bus = Arc::new(EventBus::new(config.event_bus.capacity));
        let room_store: Arc<dyn RoomStore> = Arc::new(MemoryRoomStore::new(clock.clone()));
        let message_store: Arc<dyn MessageStore> = Arc::new(MemoryMessageStore::new(
            room_store.clone(),
            clock.clone(),
            bus.clone(),
            config.rooms.max_messages_per_room,
        ));
        let presence_tracker: Arc<dyn PresenceTracker> =
            Arc::new(MemoryPresenceTracker::new(bus.clone()));

        let chat_service = Arc::new(ChatService::new(ChatServiceDependencies {
            room_store: room_store.clone(),
            message_store: message_store.clone(),
            presence_tracker: presence_tracker.clone(),
            policy: RoomPolicy::from_config(&config.rooms),
        }));
        let sweeper = Arc::new(ExpirySweeper::new(
            room_store.clone(),
            message_store.clone(),
            clock.clone(),
            &config.sweeper,
        ));

        Self {
            clock,
            bus,
            room_store,
            message_store,
            presence_tracker,
            chat_service,
            sweeper,
        }
    }

    /// 客户端身份：配置了路径就持久化到文件，否则只在进程内保存
    pub fn identity_provider(config: &AppConfig) -> Arc<dyn IdentityProvider> {
        match &config.identity.path {
            Some(path) => Arc::new(FileIdentityProvider::new(path.clone())),
            None => Arc::new(MemoryIdentityProvider::new()),
        }
    }
}
