use serde::{Deserialize, Serialize};

use crate::value_objects::{RoomId, RoomTtl, Timestamp, UserId};

/// 房间状态。`Active -> Expired` 单向转换，`Expired` 为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub created_by: UserId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub ttl_seconds: RoomTtl,
    pub status: RoomStatus,
}

impl Room {
    pub fn open(id: RoomId, created_by: UserId, ttl: RoomTtl, now: Timestamp) -> Self {
        Self {
            id,
            created_by,
            created_at: now,
            expires_at: now + ttl.as_duration(),
            ttl_seconds: ttl,
            status: RoomStatus::Active,
        }
    }

    /// `now >= expires_at` 即视为过期，与已写入的状态无关。
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.status == RoomStatus::Expired || now >= self.expires_at
    }

    /// 惰性过期：到期后把状态改为 `Expired`。
    ///
    /// 返回值表示本次调用是否发生了状态转换。
    pub fn normalize(&mut self, now: Timestamp) -> bool {
        if self.status == RoomStatus::Active && now >= self.expires_at {
            self.status = RoomStatus::Expired;
            return true;
        }
        false
    }

    pub fn remaining_seconds(&self, now: Timestamp) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn fixture(ttl: u32) -> (Room, Timestamp) {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let room = Room::open(
            RoomId::generate(),
            UserId::generate(),
            RoomTtl::try_from(ttl).unwrap(),
            now,
        );
        (room, now)
    }

    #[test]
    fn open_room_is_active_until_ttl_elapses() {
        let (mut room, created) = fixture(300);
        assert_eq!(room.expires_at, created + Duration::seconds(300));
        assert_eq!(room.status, RoomStatus::Active);

        assert!(!room.normalize(created + Duration::seconds(299)));
        assert_eq!(room.status, RoomStatus::Active);

        assert!(room.normalize(created + Duration::seconds(300)));
        assert_eq!(room.status, RoomStatus::Expired);
    }

    #[test]
    fn expired_is_terminal() {
        let (mut room, created) = fixture(600);
        room.normalize(created + Duration::seconds(601));
        // 时钟回拨也不能让房间复活
        assert!(!room.normalize(created));
        assert_eq!(room.status, RoomStatus::Expired);
        assert!(room.is_expired_at(created));
    }

    #[test]
    fn remaining_seconds_never_negative() {
        let (room, created) = fixture(900);
        assert_eq!(room.remaining_seconds(created), 900);
        assert_eq!(room.remaining_seconds(created + Duration::seconds(1000)), 0);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let (room, _) = fixture(300);
        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["ttl_seconds"], 300);
        assert!(json.get("created_by").is_some());
        assert!(json.get("expires_at").is_some());
    }
}
