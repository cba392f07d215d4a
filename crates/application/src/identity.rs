use async_trait::async_trait;
use domain::UserId;

use crate::error::ApplicationError;

/// 匿名身份提供者
///
/// 为当前客户端会话签发并持久化一个不透明的用户标识，不做任何服务端校验。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// 确保身份已建立，首次调用时生成
    async fn ensure_authenticated(&self) -> Result<(), ApplicationError>;

    /// 当前身份；从未建立过身份时返回 `AuthNotInitialized`
    async fn user_id(&self) -> Result<UserId, ApplicationError>;
}
