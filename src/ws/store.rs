use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::info;

use crate::models::RelayError;
use super::room::Room;

pub type SharedRoom = Arc<Mutex<Room>>;

/// Aggregate counts over all live rooms.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RoomStats {
    pub rooms: usize,
    pub users: usize,
    pub files: usize,
    pub messages: usize,
}

/// Owner of every active room.
///
/// Each room sits behind its own mutex so events for one room never
/// interleave inside a mutation, while different rooms proceed
/// independently. The outer map lock is only held to look rooms up, insert
/// them, or drop them.
#[derive(Default)]
pub struct RoomStore {
    rooms: RwLock<HashMap<String, SharedRoom>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a room, creating it with its starter file if it does not exist.
    ///
    /// The returned room may already be closed if its last user left
    /// concurrently; callers must check after locking.
    pub async fn get_or_create(&self, room_id: &str) -> (SharedRoom, bool) {
        if let Some(room) = self.rooms.read().await.get(room_id) {
            return (room.clone(), false);
        }

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(room_id) {
            return (room.clone(), false);
        }
        let room = Arc::new(Mutex::new(Room::new(room_id)));
        rooms.insert(room_id.to_string(), room.clone());
        info!("Room {} created", room_id);
        (room, true)
    }

    pub async fn get(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Lock a live room for mutation.
    pub async fn lock_open(&self, room_id: &str) -> Result<OwnedMutexGuard<Room>, RelayError> {
        let room = self
            .get(room_id)
            .await
            .ok_or_else(|| RelayError::UnknownReference(format!("room '{room_id}'")))?;
        let guard = room.lock_owned().await;
        if guard.is_closed() {
            return Err(RelayError::UnknownReference(format!("room '{room_id}'")));
        }
        Ok(guard)
    }

    /// Drop a room from the store if the entry is still the given instance.
    pub async fn remove(&self, room_id: &str, room: &SharedRoom) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.get(room_id) {
            Some(current) if Arc::ptr_eq(current, room) => {
                rooms.remove(room_id);
                info!("Room {} deleted (empty)", room_id);
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn stats(&self) -> RoomStats {
        let rooms: Vec<SharedRoom> = self.rooms.read().await.values().cloned().collect();

        let mut stats = RoomStats::default();
        for room in rooms {
            let room = room.lock().await;
            if room.is_closed() {
                continue;
            }
            stats.rooms += 1;
            stats.users += room.users().len();
            stats.files += room.files().len();
            stats.messages += room.message_count();
        }
        stats
    }
}
