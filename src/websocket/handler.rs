use std::sync::Arc;
use axum::{
    extract::{State, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
};
use tracing::{info, warn, debug};
use futures_util::{StreamExt, SinkExt};
use uuid::Uuid;

use crate::models::{ConnectedMessage, ReceivedMessage, RelayError, SendMessage};
use crate::services::{chat_service, file_sync_service, presence_service, session_service, signaling_service};
use crate::websocket::msg_ping_handler::handle_ping_message;
use crate::ws::AppState;


/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4().to_string();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // Everything sent to this client goes through its registry queue
    let mut outbound = app_state.registry.register(&connection_id).await;
    let hello = SendMessage::Connected(ConnectedMessage { user_id: connection_id.clone() });
    app_state.registry.send_to(&connection_id, &hello).await;

    // Drain the queue into the socket
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Read frames one at a time so each event is fully applied before the next
    let recv_state = app_state.clone();
    let recv_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let received = match ReceivedMessage::from_frame(&text) {
                Ok(received) => received,
                Err(e) => {
                    warn!("Failed to parse message from {}: {}", recv_id, e);
                    continue;
                }
            };

            let event = received.name();
            if let Err(e) = handle_message(&recv_state, &recv_id, received).await {
                log_failure(event, &recv_id, &e);
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            // An event may still be mid-flight; let the abort land first
            let _ = recv_task.await;
        }
        _ = (&mut recv_task) => send_task.abort(),
    };

    session_service::disconnect(&app_state, &connection_id).await;
    info!("WebSocket connection {} terminated", connection_id);
}

/// Route one decoded event to the subsystem that owns it.
pub async fn handle_message(state: &AppState, conn_id: &str, msg: ReceivedMessage) -> Result<(), RelayError> {
    match msg {
        ReceivedMessage::JoinRoom(m) => {
            let joined = session_service::join(state, conn_id, &m.room_id, &m.username).await?;
            debug!(
                "{} joined {} with color {} (new room: {})",
                conn_id, m.room_id, joined.user.color, joined.room_created
            );
            Ok(())
        }
        ReceivedMessage::CodeChange(m) => {
            file_sync_service::edit_file(state, &m.room_id, &m.file_id, m.code, conn_id).await
        }
        ReceivedMessage::FileCreate(m) => {
            file_sync_service::create_file(state, &m.room_id, m.name, m.language).await?;
            Ok(())
        }
        ReceivedMessage::FileRename(m) => {
            file_sync_service::rename_file(state, &m.room_id, &m.file_id, m.new_name).await
        }
        ReceivedMessage::FileDelete(m) => {
            file_sync_service::delete_file(state, &m.room_id, &m.file_id).await?;
            Ok(())
        }
        ReceivedMessage::FileSelect(m) => {
            file_sync_service::select_file(state, &m.room_id, &m.file_id, conn_id).await
        }
        ReceivedMessage::LanguageChange(m) => {
            file_sync_service::change_language(state, &m.room_id, &m.file_id, m.language).await
        }
        ReceivedMessage::CursorChange(m) => {
            presence_service::update_cursor(state, &m.room_id, conn_id, m.cursor).await
        }
        ReceivedMessage::ChatMessage(m) => {
            let Some(message) = m.message else {
                return Err(RelayError::InvalidRequest("chat-message without a message".to_string()));
            };
            chat_service::post_message(state, &m.room_id, conn_id, message).await
        }
        ReceivedMessage::RequestChatHistory(req) => {
            let history = chat_service::get_history(state, req.room_id()).await;
            state.registry.send_to(conn_id, &SendMessage::ChatHistory(history)).await;
            Ok(())
        }
        ReceivedMessage::WebRtcReady(m) => {
            signaling_service::ready(state, &m.room_id, conn_id, m.username).await
        }
        ReceivedMessage::WebRtcOffer(m) => {
            signaling_service::offer(state, conn_id, &m.to, m.offer, m.username).await
        }
        ReceivedMessage::WebRtcAnswer(m) => {
            signaling_service::answer(state, conn_id, &m.to, m.answer).await
        }
        ReceivedMessage::WebRtcIceCandidate(m) => {
            signaling_service::ice_candidate(state, conn_id, &m.to, m.candidate).await
        }
        ReceivedMessage::Ping => handle_ping_message(state, conn_id).await,
    }
}

fn log_failure(event: &str, conn_id: &str, e: &RelayError) {
    if e.is_client_fault() {
        warn!("Rejected {} from {}: {}", event, conn_id, e);
    } else {
        debug!("Ignored {} from {}: {}", event, conn_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::Value;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn start_server() -> String {
        let state = Arc::new(AppState::new(Config::default()));
        let app = crate::routes::create_app(state, &Config::default());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("ws://{}/ws", addr)
    }

    async fn emit(client: &mut Client, event: &str, data: Value) {
        let frame = serde_json::json!({ "event": event, "data": data }).to_string();
        client.send(WsMessage::Text(frame.into())).await.unwrap();
    }

    async fn next_event(client: &mut Client) -> Value {
        loop {
            let msg = tokio::time::timeout(std::time::Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = msg {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    async fn expect_event(client: &mut Client, event: &str) -> Value {
        let value = next_event(client).await;
        assert_eq!(value["event"], event, "unexpected frame {}", value);
        value["data"].clone()
    }

    async fn connect(url: &str) -> (Client, String) {
        let (mut client, _) = connect_async(url).await.unwrap();
        let hello = expect_event(&mut client, "connected").await;
        let id = hello["userId"].as_str().unwrap().to_string();
        (client, id)
    }

    #[tokio::test]
    async fn test_two_clients_edit_and_signal() {
        let url = start_server().await;
        let (mut a, a_id) = connect(&url).await;
        let (mut b, b_id) = connect(&url).await;

        emit(&mut a, "join-room", serde_json::json!({ "roomId": "r1", "username": "alice" })).await;
        let state = expect_event(&mut a, "room-state").await;
        assert_eq!(state["activeFileId"], "file-1");
        assert_eq!(state["files"][0]["name"], "main.js");
        expect_event(&mut a, "user-list").await;

        emit(&mut b, "join-room", serde_json::json!({ "roomId": "r1", "username": "bob" })).await;
        expect_event(&mut b, "room-state").await;
        expect_event(&mut b, "user-list").await;
        expect_event(&mut a, "user-list").await;
        let joined = expect_event(&mut a, "user-joined").await;
        assert_eq!(joined["userId"], b_id.as_str());

        emit(&mut a, "code-change", serde_json::json!({
            "roomId": "r1", "fileId": "file-1", "code": "print(1)", "userId": a_id.clone(),
        })).await;
        let update = expect_event(&mut b, "code-update").await;
        assert_eq!(update["fileId"], "file-1");
        assert_eq!(update["code"], "print(1)");
        assert_eq!(update["userId"], a_id.as_str());

        // A never sees its own edit: the next thing it gets is the pong.
        emit(&mut a, "ping", Value::Null).await;
        expect_event(&mut a, "pong").await;

        let payload = r#"{"type":"offer","sdp":"v=0\r\n"}"#;
        let frame = format!(
            r#"{{"event":"webrtc-offer","data":{{"roomId":"r1","to":"{b_id}","offer":{payload},"username":"alice"}}}}"#
        );
        a.send(WsMessage::Text(frame.into())).await.unwrap();
        let msg = b.next().await.unwrap().unwrap();
        let text = msg.to_text().unwrap();
        assert!(text.contains(payload));
        let offer: Value = serde_json::from_str(text).unwrap();
        assert_eq!(offer["event"], "webrtc-offer");
        assert_eq!(offer["data"]["from"], a_id.as_str());
    }

    #[tokio::test]
    async fn test_chat_history_and_disconnect() {
        let url = start_server().await;
        let (mut a, _) = connect(&url).await;
        let (mut b, _) = connect(&url).await;

        emit(&mut a, "join-room", serde_json::json!({ "roomId": "r2", "username": "alice" })).await;
        expect_event(&mut a, "room-state").await;
        expect_event(&mut a, "user-list").await;

        for text in ["first", "second"] {
            emit(&mut a, "chat-message", serde_json::json!({
                "roomId": "r2",
                "message": { "id": text, "userId": "a", "username": "alice", "message": text, "color": "#FF6B6B" },
            })).await;
            let echoed = expect_event(&mut a, "chat-message").await;
            assert_eq!(echoed["message"], text);
        }

        emit(&mut b, "request-chat-history", Value::String("r2".to_string())).await;
        let history = expect_event(&mut b, "chat-history").await;
        let texts: Vec<_> = history.as_array().unwrap().iter().map(|m| m["message"].clone()).collect();
        assert_eq!(texts, vec!["first", "second"]);

        emit(&mut b, "join-room", serde_json::json!({ "roomId": "r2", "username": "bob" })).await;
        expect_event(&mut b, "room-state").await;
        expect_event(&mut b, "user-list").await;
        expect_event(&mut a, "user-list").await;
        expect_event(&mut a, "user-joined").await;

        b.close(None).await.unwrap();
        let users = expect_event(&mut a, "user-list").await;
        assert_eq!(users.as_array().unwrap().len(), 1);
        let left = expect_event(&mut a, "user-left").await;
        assert_eq!(left["username"], "bob");
    }

    #[tokio::test]
    async fn test_bad_frames_do_not_close_connection() {
        let url = start_server().await;
        let (mut a, _) = connect(&url).await;

        a.send(WsMessage::Text("not json".into())).await.unwrap();
        emit(&mut a, "teleport", Value::Null).await;
        emit(&mut a, "join-room", serde_json::json!({ "roomId": "", "username": "alice" })).await;
        emit(&mut a, "code-change", serde_json::json!({ "roomId": "nope", "fileId": "file-1", "code": "x" })).await;

        emit(&mut a, "ping", Value::Null).await;
        expect_event(&mut a, "pong").await;
    }
}
