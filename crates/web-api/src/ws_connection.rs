use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use application::{SendMessageRequest, SubscriptionStatus};
use domain::{DomainError, Message, RoomId, UserId};

use crate::{error::ApiError, state::AppState};

/// 服务端推送给客户端的帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Status { status: SubscriptionStatus },
    Message { message: Message },
    Presence { count: usize },
    Error { code: String, message: String },
}

impl From<ApiError> for ServerFrame {
    fn from(error: ApiError) -> Self {
        ServerFrame::Error {
            code: error.code().to_string(),
            message: error.message().to_string(),
        }
    }
}

/// 客户端发来的帧
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Send {
        content: String,
        #[serde(default)]
        client_msg_id: Option<String>,
    },
}

/// WebSocket 写操作命令
///
/// 所有对 sender 的写入都经过这个通道，订阅回调只需要非阻塞地投递命令。
#[derive(Debug)]
enum WsCommand {
    Frame(ServerFrame),
    Pong(Vec<u8>),
    Close,
}

type CommandSender = mpsc::UnboundedSender<WsCommand>;

/// 单个 WebSocket 连接
///
/// 连接期间持有房间的消息订阅和在线状态订阅，连接断开时两者都被取消。
pub struct WebSocketConnection {
    state: AppState,
    room_id: RoomId,
    user_id: Option<UserId>,
}

impl WebSocketConnection {
    pub fn new(state: AppState, room_id: RoomId, user_id: Option<UserId>) -> Self {
        Self {
            state,
            room_id,
            user_id,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<WsCommand>();

        tracing::info!(room_id = %self.room_id, user_id = ?self.user_id, "WebSocket 连接已建立");

        let messages = {
            let on_message = cmd_tx.clone();
            let on_status = cmd_tx.clone();
            self.state.chat_service.subscribe(
                self.room_id,
                Arc::new(move |message: Message| {
                    let _ = on_message.send(WsCommand::Frame(ServerFrame::Message { message }));
                }),
                Some(Arc::new(move |status: SubscriptionStatus| {
                    let _ = on_status.send(WsCommand::Frame(ServerFrame::Status { status }));
                })),
            )
        };
        let presence = {
            let on_count = cmd_tx.clone();
            self.state.chat_service.subscribe_to_presence(
                self.room_id,
                Arc::new(move |count: usize| {
                    let _ = on_count.send(WsCommand::Frame(ServerFrame::Presence { count }));
                }),
            )
        };

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let outgoing = match cmd {
                    WsCommand::Frame(frame) => match serde_json::to_string(&frame) {
                        Ok(json) => WsMessage::Text(json.into()),
                        Err(err) => {
                            tracing::warn!(error = %err, "failed to serialize websocket frame");
                            continue;
                        }
                    },
                    WsCommand::Pong(data) => WsMessage::Pong(data.into()),
                    WsCommand::Close => {
                        let _ = sender.send(WsMessage::Close(None)).await;
                        break;
                    }
                };
                if sender.send(outgoing).await.is_err() {
                    tracing::warn!("WebSocket 写入失败");
                    break;
                }
            }
        });

        let recv_loop = async {
            while let Some(result) = incoming.next().await {
                match result {
                    Ok(message) => {
                        if !self.handle_incoming(message, &cmd_tx).await {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(room_id = %self.room_id, error = %err, "WebSocket 读取失败");
                        let _ = cmd_tx.send(WsCommand::Frame(ServerFrame::Status {
                            status: SubscriptionStatus::ChannelError,
                        }));
                        break;
                    }
                }
            }
        };

        let send_finished = tokio::select! {
            _ = recv_loop => false,
            _ = &mut send_task => true,
        };

        // 取消订阅会让在线人数立即下降
        messages.unsubscribe();
        presence.unsubscribe();

        if !send_finished {
            let _ = cmd_tx.send(WsCommand::Close);
            if tokio::time::timeout(Duration::from_secs(1), send_task)
                .await
                .is_err()
            {
                tracing::warn!(room_id = %self.room_id, "WebSocket 发送任务未能及时结束");
            }
        }

        tracing::info!(room_id = %self.room_id, user_id = ?self.user_id, "WebSocket 连接已断开");
    }

    /// 返回 `false` 表示连接应当结束
    async fn handle_incoming(&self, message: WsMessage, cmd_tx: &CommandSender) -> bool {
        match message {
            WsMessage::Close(_) => {
                tracing::debug!("WebSocket 收到关闭消息");
                false
            }
            WsMessage::Ping(data) => cmd_tx.send(WsCommand::Pong(data.to_vec())).is_ok(),
            WsMessage::Pong(_) => true,
            WsMessage::Text(text) => {
                let reply = match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(frame) => self.handle_frame(frame).await,
                    Err(err) => Some(ApiError::bad_request(format!("invalid frame: {err}")).into()),
                };
                match reply {
                    Some(frame) => cmd_tx.send(WsCommand::Frame(frame)).is_ok(),
                    None => true,
                }
            }
            WsMessage::Binary(_) => {
                let error = ApiError::bad_request("binary frames are not supported");
                cmd_tx.send(WsCommand::Frame(error.into())).is_ok()
            }
        }
    }

    /// 成功写入的消息会通过订阅推回，这里只回复错误
    async fn handle_frame(&self, frame: ClientFrame) -> Option<ServerFrame> {
        match frame {
            ClientFrame::Send {
                content,
                client_msg_id,
            } => {
                let Some(sender_id) = self.user_id else {
                    return Some(ApiError::from(DomainError::AuthNotInitialized).into());
                };
                let result = self
                    .state
                    .chat_service
                    .send_message(SendMessageRequest {
                        room_id: self.room_id,
                        sender_id,
                        content,
                        client_msg_id,
                    })
                    .await;
                result.err().map(|err| ApiError::from(err).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn server_frames_are_tagged_by_type() {
        let frame = ServerFrame::Presence { count: 2 };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "presence", "count": 2})
        );

        let frame = ServerFrame::Status {
            status: SubscriptionStatus::ChannelError,
        };
        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!({"type": "status", "status": "channel_error"})
        );
    }

    #[test]
    fn client_token_is_optional() {
        let frame: ClientFrame =
            serde_json::from_value(json!({"type": "send", "content": "hi"})).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Send {
                content: "hi".to_string(),
                client_msg_id: None,
            }
        );
    }
}
