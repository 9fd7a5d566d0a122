use crate::models::{CursorPosition, CursorUpdateMessage, RelayError, SendMessage};
use crate::ws::AppState;

/// Record a user's cursor and show it to the rest of the room.
pub async fn update_cursor(state: &AppState, room_id: &str, conn_id: &str, cursor: CursorPosition) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    room.set_cursor(conn_id, cursor)?;

    let update = SendMessage::CursorUpdate(CursorUpdateMessage {
        user_id: conn_id.to_string(),
        cursor,
    });
    state.registry.broadcast(&room.member_ids(), &update, Some(conn_id)).await;
    Ok(())
}
