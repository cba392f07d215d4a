//! 匿名身份提取
//!
//! 客户端在 `x-echo-user` 头里携带自己的匿名 id，服务端不做任何校验，
//! 只要求它是合法的 UUID。

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use domain::{DomainError, UserId};

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-echo-user";

/// 从请求头提取匿名用户
pub fn extract_user_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get(USER_HEADER)
        .ok_or(DomainError::AuthNotInitialized)?
        .to_str()
        .map_err(|_| ApiError::bad_request(format!("{USER_HEADER} must be ASCII")))?;

    raw.trim()
        .parse::<UserId>()
        .map_err(|err| DomainError::invalid_argument(USER_HEADER, err.to_string()).into())
}

/// 处理函数参数中直接声明的匿名用户
#[derive(Debug, Clone, Copy)]
pub struct AnonymousUser(pub UserId);

impl<S> FromRequestParts<S> for AnonymousUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_user_from_headers(&parts.headers).map(AnonymousUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    #[test]
    fn missing_header_is_unauthorized() {
        let err = extract_user_from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "AUTH_NOT_INITIALIZED");
    }

    #[test]
    fn malformed_header_is_bad_request() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("alice"));
        let err = extract_user_from_headers(&headers).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn valid_header_yields_user() {
        let user = UserId::generate();
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(&user.to_string()).unwrap());
        assert_eq!(extract_user_from_headers(&headers).unwrap(), user);
    }
}
