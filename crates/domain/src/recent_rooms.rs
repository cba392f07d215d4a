//! 最近访问过的房间（客户端便利状态，不属于服务端状态）

use serde::{Deserialize, Serialize};

use crate::room::Room;
use crate::value_objects::{RoomId, Timestamp};

/// 最多保留的最近房间数
pub const MAX_RECENT_ROOMS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRoom {
    pub id: RoomId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub is_owner: bool,
}

/// 按最近访问排序（最新在前），每次读写都会剔除已过期的条目。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentRooms {
    entries: Vec<RecentRoom>,
}

impl RecentRooms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, room: &Room, is_owner: bool, now: Timestamp) {
        self.entries
            .retain(|entry| entry.id != room.id && entry.expires_at > now);
        self.entries.insert(
            0,
            RecentRoom {
                id: room.id,
                created_at: room.created_at,
                expires_at: room.expires_at,
                is_owner,
            },
        );
        self.entries.truncate(MAX_RECENT_ROOMS);
    }

    pub fn list(&mut self, now: Timestamp) -> Vec<RecentRoom> {
        self.entries.retain(|entry| entry.expires_at > now);
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
