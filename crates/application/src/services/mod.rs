mod chat_service;
mod chat_session;

pub use chat_service::{
    ChatService, ChatServiceDependencies, CreateRoomRequest, JoinRoomRequest, RoomPolicy,
    SendMessageRequest,
};
pub use chat_session::ChatSession;
