use std::collections::VecDeque;

use crate::models::{ChatMessage, CodeFile, ConnectionId, CursorPosition, RelayError, User};

/// Authoritative state of one collaborative room.
///
/// Invariants: `files` is never empty and `active_file_id` always names one
/// of them. Files and users keep insertion order, so the replacement for a
/// deleted active file and the order of user lists are deterministic.
#[derive(Debug)]
pub struct Room {
    pub id: String,
    files: Vec<CodeFile>,
    active_file_id: String,
    users: Vec<User>,
    messages: VecDeque<ChatMessage>,
    next_file_seq: u64,
    closed: bool,
}

impl Room {
    pub fn new(id: impl Into<String>) -> Self {
        let starter = CodeFile::starter();
        Self {
            id: id.into(),
            active_file_id: starter.id.clone(),
            files: vec![starter],
            users: Vec::new(),
            messages: VecDeque::new(),
            next_file_seq: 2,
            closed: false,
        }
    }

    /// A closed room has been emptied and is on its way out of the store.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn files(&self) -> &[CodeFile] {
        &self.files
    }

    pub fn file(&self, file_id: &str) -> Option<&CodeFile> {
        self.files.iter().find(|f| f.id == file_id)
    }

    fn file_mut(&mut self, file_id: &str) -> Result<&mut CodeFile, RelayError> {
        let room_id = &self.id;
        self.files
            .iter_mut()
            .find(|f| f.id == file_id)
            .ok_or_else(|| RelayError::UnknownReference(format!("file '{file_id}' in room '{room_id}'")))
    }

    pub fn active_file_id(&self) -> &str {
        &self.active_file_id
    }

    /// Overwrite the content of a file. Last write wins.
    pub fn update_code(&mut self, file_id: &str, code: String) -> Result<(), RelayError> {
        self.file_mut(file_id)?.code = code;
        Ok(())
    }

    /// Add an empty file under a fresh id and return a copy of it.
    pub fn create_file(&mut self, name: String, language: String) -> CodeFile {
        let mut id = format!("file-{}", self.next_file_seq);
        self.next_file_seq += 1;
        while self.file(&id).is_some() {
            id = format!("file-{}", self.next_file_seq);
            self.next_file_seq += 1;
        }

        let file = CodeFile {
            id,
            name,
            language,
            code: String::new(),
        };
        self.files.push(file.clone());
        file
    }

    pub fn rename_file(&mut self, file_id: &str, new_name: String) -> Result<(), RelayError> {
        self.file_mut(file_id)?.name = new_name;
        Ok(())
    }

    /// Remove a file and return the active file id afterwards.
    ///
    /// The last remaining file can never be deleted. When the active file
    /// goes away the first remaining file takes its place.
    pub fn delete_file(&mut self, file_id: &str) -> Result<String, RelayError> {
        if self.files.len() <= 1 {
            return Err(RelayError::InvariantViolation(format!(
                "room '{}' must keep at least one file",
                self.id
            )));
        }

        let index = self
            .files
            .iter()
            .position(|f| f.id == file_id)
            .ok_or_else(|| RelayError::UnknownReference(format!("file '{file_id}' in room '{}'", self.id)))?;
        self.files.remove(index);

        if self.active_file_id == file_id {
            self.active_file_id = self.files[0].id.clone();
        }
        Ok(self.active_file_id.clone())
    }

    pub fn select_file(&mut self, file_id: &str) -> Result<(), RelayError> {
        if self.file(file_id).is_none() {
            return Err(RelayError::UnknownReference(format!("file '{file_id}' in room '{}'", self.id)));
        }
        self.active_file_id = file_id.to_string();
        Ok(())
    }

    pub fn set_language(&mut self, file_id: &str, language: String) -> Result<(), RelayError> {
        self.file_mut(file_id)?.language = language;
        Ok(())
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, conn_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == conn_id)
    }

    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.users.iter().map(|u| u.user_id.clone()).collect()
    }

    /// Register a user. A connection joining twice keeps its slot but gets
    /// the new name and color.
    pub fn add_user(&mut self, user: User) {
        match self.users.iter().position(|u| u.user_id == user.user_id) {
            Some(index) => self.users[index] = user,
            None => self.users.push(user),
        }
    }

    pub fn remove_user(&mut self, conn_id: &str) -> Option<User> {
        let index = self.users.iter().position(|u| u.user_id == conn_id)?;
        Some(self.users.remove(index))
    }

    pub fn set_cursor(&mut self, conn_id: &str, cursor: CursorPosition) -> Result<(), RelayError> {
        let room_id = &self.id;
        let user = self
            .users
            .iter_mut()
            .find(|u| u.user_id == conn_id)
            .ok_or_else(|| RelayError::UnknownReference(format!("user '{conn_id}' in room '{room_id}'")))?;
        user.cursor = Some(cursor);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Append a chat message, evicting the oldest ones beyond `limit`.
    pub fn push_message(&mut self, message: ChatMessage, limit: Option<usize>) {
        self.messages.push_back(message);
        if let Some(limit) = limit {
            while self.messages.len() > limit {
                self.messages.pop_front();
            }
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
