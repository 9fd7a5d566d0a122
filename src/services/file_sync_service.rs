use tracing::debug;

use crate::models::{
    CodeFile, CodeUpdateMessage, FileDeletedMessage, FileRenamedMessage, FileSelectedMessage, LanguageUpdateMessage,
    RelayError, SendMessage,
};
use crate::ws::AppState;

/// Overwrite a file's content and pass it on to everyone but the editor.
pub async fn edit_file(state: &AppState, room_id: &str, file_id: &str, code: String, editor_id: &str) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    room.update_code(file_id, code.clone())?;

    let update = SendMessage::CodeUpdate(CodeUpdateMessage {
        file_id: file_id.to_string(),
        code,
        user_id: editor_id.to_string(),
    });
    let delivered = state.registry.broadcast(&room.member_ids(), &update, Some(editor_id)).await;
    debug!("Code update for {}/{} from {} sent to {} peer(s)", room_id, file_id, editor_id, delivered);
    Ok(())
}

/// Add an empty file and announce it to the whole room.
pub async fn create_file(state: &AppState, room_id: &str, name: String, language: String) -> Result<CodeFile, RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    let file = room.create_file(name, language);

    let created = SendMessage::FileCreated(file.clone());
    state.registry.broadcast(&room.member_ids(), &created, None).await;
    debug!("File {} ({}) created in room {}", file.id, file.name, room_id);
    Ok(file)
}

pub async fn rename_file(state: &AppState, room_id: &str, file_id: &str, new_name: String) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    room.rename_file(file_id, new_name.clone())?;

    let renamed = SendMessage::FileRenamed(FileRenamedMessage {
        file_id: file_id.to_string(),
        new_name,
    });
    state.registry.broadcast(&room.member_ids(), &renamed, None).await;
    Ok(())
}

/// Delete a file unless it is the last one. Returns the active file id
/// afterwards.
pub async fn delete_file(state: &AppState, room_id: &str, file_id: &str) -> Result<String, RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    let new_active_file_id = room.delete_file(file_id)?;

    let deleted = SendMessage::FileDeleted(FileDeletedMessage {
        file_id: file_id.to_string(),
        new_active_file_id: new_active_file_id.clone(),
    });
    state.registry.broadcast(&room.member_ids(), &deleted, None).await;
    debug!("File {} deleted in room {}, active file is {}", file_id, room_id, new_active_file_id);
    Ok(new_active_file_id)
}

/// Point the room at another file. The selecting client already switched
/// locally, so it gets no echo.
pub async fn select_file(state: &AppState, room_id: &str, file_id: &str, conn_id: &str) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    room.select_file(file_id)?;

    let selected = SendMessage::FileSelected(FileSelectedMessage {
        file_id: file_id.to_string(),
        user_id: conn_id.to_string(),
    });
    state.registry.broadcast(&room.member_ids(), &selected, Some(conn_id)).await;
    Ok(())
}

/// Change a file's language. Everyone, sender included, hears about it.
pub async fn change_language(state: &AppState, room_id: &str, file_id: &str, language: String) -> Result<(), RelayError> {
    let mut room = state.rooms.lock_open(room_id).await?;
    room.set_language(file_id, language.clone())?;

    let update = SendMessage::LanguageUpdate(LanguageUpdateMessage {
        file_id: file_id.to_string(),
        language,
    });
    state.registry.broadcast(&room.member_ids(), &update, None).await;
    Ok(())
}
