use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 默认允许的房间存活时长（秒）：5 / 10 / 15 / 30 分钟。
pub const DEFAULT_ALLOWED_TTL_SECONDS: [u32; 4] = [300, 600, 900, 1800];

/// 默认的消息内容最大字符数。
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 4000;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// 生成新的随机标识（128 位随机数）
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$name> for Uuid {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// 匿名用户标识。只是一个稳定的句柄，不做服务端校验。
    UserId
);
uuid_id!(
    /// 房间唯一标识。
    RoomId
);
uuid_id!(
    /// 消息唯一标识，由存储在写入时分配。
    MessageId
);
uuid_id!(
    /// 在线连接标识。同一用户的多个连接（多标签页）各自计数。
    ConnectionId
);

/// 客户端生成的幂等令牌，用于合并乐观回显与服务端确认的消息。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientMsgId(String);

impl ClientMsgId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClientMsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 房间存活时长（秒），只能取允许集合中的值。
///
/// 反序列化同样经过校验，使用默认的允许集合。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RoomTtl(u32);

impl RoomTtl {
    pub fn new(seconds: u32, allowed: &[u32]) -> Result<Self, DomainError> {
        if seconds == 0 {
            return Err(DomainError::invalid_argument(
                "ttl_seconds",
                "must be positive",
            ));
        }
        if !allowed.contains(&seconds) {
            return Err(DomainError::invalid_argument(
                "ttl_seconds",
                format!("{seconds} is not one of {allowed:?}"),
            ));
        }
        Ok(Self(seconds))
    }

    pub fn as_seconds(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::seconds(i64::from(self.0))
    }
}

impl TryFrom<u32> for RoomTtl {
    type Error = DomainError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value, &DEFAULT_ALLOWED_TTL_SECONDS)
    }
}

impl From<RoomTtl> for u32 {
    fn from(ttl: RoomTtl) -> Self {
        ttl.0
    }
}

/// 经过验证的消息内容：去除首尾空白后不能为空。
///
/// 通过校验的内容按原样保存。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: impl Into<String>, max_chars: usize) -> Result<Self, DomainError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::invalid_argument("content", "cannot be empty"));
        }
        if value.chars().count() > max_chars {
            return Err(DomainError::invalid_argument(
                "content",
                format!("longer than {max_chars} characters"),
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value, DEFAULT_MAX_CONTENT_CHARS)
    }
}

impl From<MessageContent> for String {
    fn from(content: MessageContent) -> Self {
        content.0
    }
}

impl fmt::Display for MessageContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_accepts_only_allowed_values() {
        for secs in DEFAULT_ALLOWED_TTL_SECONDS {
            assert_eq!(RoomTtl::try_from(secs).unwrap().as_seconds(), secs);
        }
        assert!(matches!(
            RoomTtl::try_from(0),
            Err(DomainError::InvalidArgument { .. })
        ));
        assert!(matches!(
            RoomTtl::try_from(301),
            Err(DomainError::InvalidArgument { .. })
        ));
        assert!(RoomTtl::new(60, &[60, 120]).is_ok());
    }

    #[test]
    fn content_must_not_be_blank() {
        assert!(MessageContent::new("   \n\t", 10).is_err());
        assert!(MessageContent::new("", 10).is_err());
        let content = MessageContent::new("  hi ", 10).unwrap();
        assert_eq!(content.as_str(), "  hi ");
    }

    #[test]
    fn content_length_counts_characters() {
        assert!(MessageContent::new("你好", 2).is_ok());
        assert!(MessageContent::new("你好啊", 2).is_err());
    }

    #[test]
    fn deserialization_goes_through_validation() {
        assert!(serde_json::from_str::<RoomTtl>("301").is_err());
        assert!(serde_json::from_str::<RoomTtl>("0").is_err());
        assert_eq!(serde_json::from_str::<RoomTtl>("600").unwrap().as_seconds(), 600);
        assert_eq!(serde_json::to_string(&RoomTtl::try_from(900).unwrap()).unwrap(), "900");

        assert!(serde_json::from_str::<MessageContent>("\"   \"").is_err());
        let content: MessageContent = serde_json::from_str("\" hi \"").unwrap();
        assert_eq!(content.as_str(), " hi ");
        assert_eq!(serde_json::to_string(&content).unwrap(), "\" hi \"");
    }

    #[test]
    fn ids_round_trip_through_strings() {
        let id = RoomId::generate();
        let parsed: RoomId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<UserId>().is_err());
    }

    #[test]
    fn client_msg_id_generation_is_unique_and_non_empty() {
        let a = ClientMsgId::generate();
        let b = ClientMsgId::generate();
        assert!(!a.is_empty());
        assert_ne!(a, b);
        assert!(ClientMsgId::default().is_empty());
    }
}
