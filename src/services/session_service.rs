//! Join and disconnect handling, including room creation on first join and
//! room removal once the last user is gone.

use tracing::{debug, info};

use crate::models::{PresenceMessage, RelayError, RoomStateMessage, SendMessage, User};
use crate::ws::{colors, AppState};

/// Outcome of a successful join.
#[derive(Debug, Clone)]
pub struct JoinResult {
    pub user: User,
    pub room_created: bool,
}

/// Add a connection to a room, creating the room if needed.
///
/// The joiner gets the file snapshot, everyone gets the new user list, and
/// the rest of the room is told who arrived.
pub async fn join(state: &AppState, conn_id: &str, room_id: &str, username: &str) -> Result<JoinResult, RelayError> {
    if room_id.trim().is_empty() || username.trim().is_empty() {
        return Err(RelayError::InvalidRequest(format!(
            "join-room needs a room id and a username (room_id={room_id:?}, username={username:?})"
        )));
    }

    let user = User {
        user_id: conn_id.to_string(),
        username: username.to_string(),
        color: colors::random_color(),
        cursor: None,
    };

    // Recorded before the room can exist so disconnect always finds it
    state.registry.attach_room(conn_id, room_id).await;

    loop {
        let (shared, created) = state.rooms.get_or_create(room_id).await;
        let mut room = shared.lock().await;
        if room.is_closed() {
            // Lost a race with the last user leaving; wait for the store to
            // drop the old instance and try again.
            drop(room);
            tokio::task::yield_now().await;
            continue;
        }

        room.add_user(user.clone());

        let snapshot = SendMessage::RoomState(RoomStateMessage {
            files: room.files().to_vec(),
            active_file_id: room.active_file_id().to_string(),
        });
        state.registry.send_to(conn_id, &snapshot).await;

        let members = room.member_ids();
        let user_list = SendMessage::UserList(room.users().to_vec());
        state.registry.broadcast(&members, &user_list, None).await;

        let joined = SendMessage::UserJoined(PresenceMessage {
            user_id: user.user_id.clone(),
            username: user.username.clone(),
            color: Some(user.color.clone()),
        });
        state.registry.broadcast(&members, &joined, Some(conn_id)).await;

        info!("User {} joined room {} ({} users)", username, room_id, members.len());
        return Ok(JoinResult {
            user,
            room_created: created,
        });
    }
}

/// Remove a connection from every room it joined and forget it.
///
/// Rooms left without users are closed and dropped along with their files
/// and chat history.
pub async fn disconnect(state: &AppState, conn_id: &str) {
    let room_ids = state.registry.unregister(conn_id).await;
    debug!("Connection {} leaving {} room(s)", conn_id, room_ids.len());

    for room_id in room_ids {
        let Some(shared) = state.rooms.get(&room_id).await else {
            continue;
        };

        let mut room = shared.lock().await;
        if room.is_closed() {
            continue;
        }
        // No user entry means the join never finished; only the cleanup applies
        if let Some(user) = room.remove_user(conn_id) {
            let members = room.member_ids();
            let user_list = SendMessage::UserList(room.users().to_vec());
            state.registry.broadcast(&members, &user_list, None).await;

            if !user.username.is_empty() {
                let left = SendMessage::UserLeft(PresenceMessage {
                    user_id: conn_id.to_string(),
                    username: user.username.clone(),
                    color: None,
                });
                state.registry.broadcast(&members, &left, None).await;
                info!("User {} left room {}", user.username, room_id);
            }
        }

        if room.is_empty() {
            room.close();
            drop(room);
            state.rooms.remove(&room_id, &shared).await;
        }
    }
}
