use tracing::{debug, error};
use chrono::Utc;

use crate::models::{PongMessage, RelayError, SendMessage};
use crate::ws::AppState;

/// Handle PingMessage
pub async fn handle_ping_message(state: &AppState, conn_id: &str) -> Result<(), RelayError> {
    debug!("Ping message received from {}", conn_id);

    // Reply with pong
    let pong = SendMessage::Pong(PongMessage { date: Utc::now().to_rfc3339() });
    if !state.registry.send_to(conn_id, &pong).await {
        error!("Failed to send Pong message to {}", conn_id);
    }
    Ok(())
}
