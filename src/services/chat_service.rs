use tracing::debug;
use uuid::Uuid;

use crate::models::{ChatMessage, RelayError, SendMessage};
use crate::ws::AppState;

/// Append a message to the room's log and deliver it to everyone,
/// including the author.
///
/// The author is always the posting connection. Name and color come from
/// the room's user entry when there is one.
pub async fn post_message(
    state: &AppState,
    room_id: &str,
    conn_id: &str,
    mut message: ChatMessage,
) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;

    message.user_id = conn_id.to_string();
    if let Some(author) = room.user(conn_id) {
        message.username = author.username.clone();
        message.color = author.color.clone();
    }
    if message.id.is_empty() {
        message.id = Uuid::new_v4().to_string();
    }

    room.push_message(message.clone(), state.config.chat_history_limit);

    debug!("Chat message {} in room {} ({} stored)", message.id, room_id, room.message_count());
    let delivery = SendMessage::ChatMessage(message);
    state.registry.broadcast(&room.member_ids(), &delivery, None).await;
    Ok(())
}

/// Full message log of a room, oldest first. Unknown rooms have none.
pub async fn get_history(state: &AppState, room_id: &str) -> Vec<ChatMessage> {
    match state.rooms.lock_open(room_id).await {
        Ok(room) => room.messages(),
        Err(_) => Vec::new(),
    }
}
