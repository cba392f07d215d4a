//! 内存房间存储
//!
//! 每个房间一把互斥锁，房间记录和成员集合在同一个临界区内读写，
//! 因此过期检查、成员校验与状态转换对同一房间是原子的。

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use application::{ApplicationError, Clock, RoomStore};
use async_trait::async_trait;
use domain::{DomainError, Room, RoomId, RoomStatus, RoomTtl, Timestamp, UserId};
use tokio::sync::RwLock;

struct RoomEntry {
    room: Room,
    members: HashSet<UserId>,
}

impl RoomEntry {
    /// 惰性过期，首次观察到状态转换时记录日志
    fn normalize(&mut self, now: Timestamp) -> bool {
        let transitioned = self.room.normalize(now);
        if transitioned {
            tracing::info!(
                room_id = %self.room.id,
                expires_at = %self.room.expires_at,
                "房间已过期"
            );
        }
        transitioned
    }

    fn ensure_active(&mut self, now: Timestamp) -> Result<(), DomainError> {
        self.normalize(now);
        match self.room.status {
            RoomStatus::Active => Ok(()),
            RoomStatus::Expired => Err(DomainError::RoomExpired),
        }
    }
}

type SharedEntry = Arc<Mutex<RoomEntry>>;

pub struct MemoryRoomStore {
    clock: Arc<dyn Clock>,
    rooms: RwLock<HashMap<RoomId, SharedEntry>>,
}

impl MemoryRoomStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            rooms: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, room_id: RoomId) -> Option<SharedEntry> {
        self.rooms.read().await.get(&room_id).cloned()
    }

    /// 当前保存的房间数（包括尚未清理的过期房间）
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn lock(entry: &SharedEntry) -> std::sync::MutexGuard<'_, RoomEntry> {
    entry.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn create_room(
        &self,
        created_by: UserId,
        ttl: RoomTtl,
    ) -> Result<Room, ApplicationError> {
        let room = Room::open(RoomId::generate(), created_by, ttl, self.clock.now());
        let entry = RoomEntry {
            room: room.clone(),
            members: HashSet::from([created_by]),
        };

        self.rooms
            .write()
            .await
            .insert(room.id, Arc::new(Mutex::new(entry)));
        Ok(room)
    }

    async fn get_room(&self, room_id: RoomId) -> Result<Option<Room>, ApplicationError> {
        let Some(entry) = self.entry(room_id).await else {
            return Ok(None);
        };
        let mut entry = lock(&entry);
        entry.normalize(self.clock.now());
        Ok(Some(entry.room.clone()))
    }

    async fn join_room(&self, room_id: RoomId, user_id: UserId) -> Result<Room, ApplicationError> {
        let entry = self
            .entry(room_id)
            .await
            .ok_or(DomainError::RoomNotFound)?;
        let mut entry = lock(&entry);
        entry.ensure_active(self.clock.now())?;
        entry.members.insert(user_id);
        Ok(entry.room.clone())
    }

    async fn authorize_sender(
        &self,
        room_id: RoomId,
        user_id: UserId,
        at: Timestamp,
    ) -> Result<Room, ApplicationError> {
        let entry = self
            .entry(room_id)
            .await
            .ok_or(DomainError::RoomNotFound)?;
        let mut entry = lock(&entry);
        entry.ensure_active(at)?;
        if !entry.members.contains(&user_id) {
            return Err(DomainError::NotAMember.into());
        }
        Ok(entry.room.clone())
    }

    async fn is_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool, ApplicationError> {
        Ok(match self.entry(room_id).await {
            Some(entry) => lock(&entry).members.contains(&user_id),
            None => false,
        })
    }

    async fn expire_due(&self, now: Timestamp) -> Result<Vec<RoomId>, ApplicationError> {
        let rooms = self.rooms.read().await;
        let expired = rooms
            .iter()
            .filter(|(_, entry)| lock(entry).normalize(now))
            .map(|(room_id, _)| *room_id)
            .collect();
        Ok(expired)
    }

    async fn expired_rooms(&self, now: Timestamp) -> Result<Vec<RoomId>, ApplicationError> {
        let rooms = self.rooms.read().await;
        let expired = rooms
            .iter()
            .filter(|(_, entry)| {
                let mut entry = lock(entry);
                entry.normalize(now);
                entry.room.status == RoomStatus::Expired
            })
            .map(|(room_id, _)| *room_id)
            .collect();
        Ok(expired)
    }

    async fn purge_expired_before(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<RoomId>, ApplicationError> {
        let mut rooms = self.rooms.write().await;
        let mut purged = Vec::new();
        rooms.retain(|room_id, entry| {
            let entry = lock(entry);
            if entry.room.expires_at <= cutoff {
                purged.push(*room_id);
                false
            } else {
                true
            }
        });

        if !purged.is_empty() {
            tracing::info!(count = purged.len(), "已删除过期房间");
        }
        Ok(purged)
    }
}
