//! 领域模型错误定义
//!
//! 每种错误都有稳定的错误码和面向用户的提示文案，
//! 上层（HTTP、UI）据此给出可区分的提示，而不是笼统的“出错了”。

use thiserror::Error;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 房间不存在
    #[error("room not found")]
    RoomNotFound,

    /// 房间已过期（TTL 已到）
    #[error("this room has expired")]
    RoomExpired,

    /// 发送者不是房间成员
    #[error("you are not a member of this room")]
    NotAMember,

    /// 尚未建立匿名身份
    #[error("anonymous identity has not been initialized")]
    AuthNotInitialized,

    /// 参数校验失败
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 稳定的机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomExpired => "ROOM_EXPIRED",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::AuthNotInitialized => "AUTH_NOT_INITIALIZED",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
    }
}

/// 存储后端错误（持久化/网络后端使用，内存实现不会产生）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_and_missing_rooms_read_differently() {
        assert_ne!(
            DomainError::RoomNotFound.to_string(),
            DomainError::RoomExpired.to_string()
        );
        assert_eq!(DomainError::RoomExpired.to_string(), "this room has expired");
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(DomainError::NotAMember.code(), "NOT_A_MEMBER");
        assert_eq!(
            DomainError::invalid_argument("ttl_seconds", "not allowed").code(),
            "INVALID_ARGUMENT"
        );
    }
}
