pub mod chat_service;
pub mod file_sync_service;
pub mod presence_service;
pub mod session_service;
pub mod signaling_service;
