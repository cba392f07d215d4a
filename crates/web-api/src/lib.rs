//! Web API 层。
//!
//! 提供 Axum 路由，将 HTTP / WebSocket 请求委托给房间/消息服务门面。

mod auth;
mod error;
mod routes;
mod state;
mod ws_connection;

pub use auth::{extract_user_from_headers, AnonymousUser, USER_HEADER};
pub use error::{ApiError, ErrorBody};
pub use routes::router;
pub use state::AppState;
pub use ws_connection::{ClientFrame, ServerFrame};
