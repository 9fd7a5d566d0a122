use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport-level id of one live connection, doubling as the user id.
pub type ConnectionId = String;

/// One shared text buffer inside a room.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CodeFile {
    pub id: String,
    pub name: String,
    pub language: String,
    pub code: String,
}

impl CodeFile {
    pub const STARTER_ID: &'static str = "file-1";
    pub const STARTER_NAME: &'static str = "main.js";
    pub const STARTER_LANGUAGE: &'static str = "javascript";

    /// The file every new room starts with.
    pub fn starter() -> Self {
        Self {
            id: Self::STARTER_ID.to_string(),
            name: Self::STARTER_NAME.to_string(),
            language: Self::STARTER_LANGUAGE.to_string(),
            code: String::new(),
        }
    }
}

/// Last known editor cursor of a user.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub line_number: u32,
    pub column: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: ConnectionId,
    pub username: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
}

/// A chat line as posted by a client. Immutable once appended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    pub message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub color: String,
}
