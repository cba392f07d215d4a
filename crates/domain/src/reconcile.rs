//! 消息列表合并规则
//!
//! 客户端把本地乐观回显、订阅推送和轮询快照合并成一个列表时必须使用这里的规则，
//! 否则同一条消息会出现两次（一次本地回显，一次广播）。

use crate::message::Message;

/// 把 `incoming` 合并进 `current`。
///
/// - `id` 相同，或双方 `client_msg_id` 均非空且相同，视为同一条消息；
/// - 冲突时后到的记录替换先到的（服务端副本替换本地占位）；
/// - 结果按 `created_at` 升序排列，相同时间保持到达顺序。
pub fn merge_messages<I>(current: Vec<Message>, incoming: I) -> Vec<Message>
where
    I: IntoIterator<Item = Message>,
{
    let mut merged: Vec<Message> = Vec::with_capacity(current.len());

    for message in current.into_iter().chain(incoming) {
        match merged.iter().position(|existing| message.is_same_as(existing)) {
            Some(index) => merged[index] = message,
            None => merged.push(message),
        }
    }

    merged.sort_by_key(|message| message.created_at);
    merged
}
