use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::models::{ChatMessage, CodeFile, ConnectionId, CursorPosition, RelayError, User};

/// Wire envelope shared by both directions: `{"event": "...", "data": ...}`.
#[derive(Deserialize)]
struct Envelope<'a> {
    event: String,
    #[serde(borrow, default)]
    data: Option<&'a RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMessage {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub username: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CodeChangeMessage {
    pub room_id: String,
    pub file_id: String,
    pub code: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileCreateMessage {
    pub room_id: String,
    pub name: String,
    pub language: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileRenameMessage {
    pub room_id: String,
    pub file_id: String,
    pub new_name: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileDeleteMessage {
    pub room_id: String,
    pub file_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct FileSelectMessage {
    pub room_id: String,
    pub file_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LanguageChangeMessage {
    pub room_id: String,
    pub file_id: String,
    pub language: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CursorChangeMessage {
    pub room_id: String,
    pub cursor: CursorPosition,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChatPostMessage {
    pub room_id: String,
    #[serde(default)]
    pub message: Option<ChatMessage>,
}

/// `request-chat-history` accepts either a bare room id or `{roomId}`.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum ChatHistoryRequest {
    RoomId(String),
    #[serde(rename_all = "camelCase")]
    Object { room_id: String },
}

impl ChatHistoryRequest {
    pub fn room_id(&self) -> &str {
        match self {
            ChatHistoryRequest::RoomId(room_id) => room_id,
            ChatHistoryRequest::Object { room_id } => room_id,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcReadyMessage {
    pub room_id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcOfferMessage {
    pub to: ConnectionId,
    pub offer: Box<RawValue>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcAnswerMessage {
    pub to: ConnectionId,
    pub answer: Box<RawValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcIceCandidateMessage {
    pub to: ConnectionId,
    pub candidate: Box<RawValue>,
}

/// Every event a client may send.
#[derive(Debug)]
pub enum ReceivedMessage {
    JoinRoom(JoinRoomMessage),
    CodeChange(CodeChangeMessage),
    FileCreate(FileCreateMessage),
    FileRename(FileRenameMessage),
    FileDelete(FileDeleteMessage),
    FileSelect(FileSelectMessage),
    LanguageChange(LanguageChangeMessage),
    CursorChange(CursorChangeMessage),
    ChatMessage(ChatPostMessage),
    RequestChatHistory(ChatHistoryRequest),
    WebRtcReady(WebRtcReadyMessage),
    WebRtcOffer(WebRtcOfferMessage),
    WebRtcAnswer(WebRtcAnswerMessage),
    WebRtcIceCandidate(WebRtcIceCandidateMessage),
    Ping,
}

impl ReceivedMessage {
    /// Decode one text frame.
    ///
    /// Decoding happens in two steps so that signaling payloads can be kept
    /// as raw JSON text and forwarded untouched.
    pub fn from_frame(frame: &str) -> Result<Self, RelayError> {
        let envelope: Envelope<'_> = serde_json::from_str(frame)?;
        let data = envelope.data;

        let msg = match envelope.event.as_str() {
            "join-room" => ReceivedMessage::JoinRoom(decode(data)?),
            "code-change" => ReceivedMessage::CodeChange(decode(data)?),
            "file-create" => ReceivedMessage::FileCreate(decode(data)?),
            "file-rename" => ReceivedMessage::FileRename(decode(data)?),
            "file-delete" => ReceivedMessage::FileDelete(decode(data)?),
            "file-select" => ReceivedMessage::FileSelect(decode(data)?),
            "language-change" => ReceivedMessage::LanguageChange(decode(data)?),
            "cursor-change" => ReceivedMessage::CursorChange(decode(data)?),
            "chat-message" => ReceivedMessage::ChatMessage(decode(data)?),
            "request-chat-history" => ReceivedMessage::RequestChatHistory(decode(data)?),
            "webrtc-ready" => ReceivedMessage::WebRtcReady(decode(data)?),
            "webrtc-offer" => ReceivedMessage::WebRtcOffer(decode(data)?),
            "webrtc-answer" => ReceivedMessage::WebRtcAnswer(decode(data)?),
            "webrtc-ice-candidate" => ReceivedMessage::WebRtcIceCandidate(decode(data)?),
            "ping" => ReceivedMessage::Ping,
            other => {
                return Err(RelayError::InvalidRequest(format!("unknown event '{other}'")));
            }
        };
        Ok(msg)
    }

    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ReceivedMessage::JoinRoom(_) => "join-room",
            ReceivedMessage::CodeChange(_) => "code-change",
            ReceivedMessage::FileCreate(_) => "file-create",
            ReceivedMessage::FileRename(_) => "file-rename",
            ReceivedMessage::FileDelete(_) => "file-delete",
            ReceivedMessage::FileSelect(_) => "file-select",
            ReceivedMessage::LanguageChange(_) => "language-change",
            ReceivedMessage::CursorChange(_) => "cursor-change",
            ReceivedMessage::ChatMessage(_) => "chat-message",
            ReceivedMessage::RequestChatHistory(_) => "request-chat-history",
            ReceivedMessage::WebRtcReady(_) => "webrtc-ready",
            ReceivedMessage::WebRtcOffer(_) => "webrtc-offer",
            ReceivedMessage::WebRtcAnswer(_) => "webrtc-answer",
            ReceivedMessage::WebRtcIceCandidate(_) => "webrtc-ice-candidate",
            ReceivedMessage::Ping => "ping",
        }
    }
}

fn decode<T: DeserializeOwned>(data: Option<&RawValue>) -> Result<T, RelayError> {
    let text = data.map_or("null", RawValue::get);
    Ok(serde_json::from_str(text)?)
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub user_id: ConnectionId,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateMessage {
    pub files: Vec<CodeFile>,
    pub active_file_id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub user_id: ConnectionId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeUpdateMessage {
    pub file_id: String,
    pub code: String,
    pub user_id: ConnectionId,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileRenamedMessage {
    pub file_id: String,
    pub new_name: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileDeletedMessage {
    pub file_id: String,
    pub new_active_file_id: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FileSelectedMessage {
    pub file_id: String,
    pub user_id: ConnectionId,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LanguageUpdateMessage {
    pub file_id: String,
    pub language: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdateMessage {
    pub user_id: ConnectionId,
    pub cursor: CursorPosition,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcUserReadyMessage {
    pub user_id: ConnectionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcOfferRelay {
    pub from: ConnectionId,
    pub offer: Box<RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcAnswerRelay {
    pub from: ConnectionId,
    pub answer: Box<RawValue>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WebRtcIceCandidateRelay {
    pub from: ConnectionId,
    pub candidate: Box<RawValue>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

/// Every event the relay sends to clients.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SendMessage {
    Connected(ConnectedMessage),
    RoomState(RoomStateMessage),
    UserList(Vec<User>),
    UserJoined(PresenceMessage),
    UserLeft(PresenceMessage),
    CodeUpdate(CodeUpdateMessage),
    FileCreated(CodeFile),
    FileRenamed(FileRenamedMessage),
    FileDeleted(FileDeletedMessage),
    FileSelected(FileSelectedMessage),
    LanguageUpdate(LanguageUpdateMessage),
    CursorUpdate(CursorUpdateMessage),
    ChatMessage(ChatMessage),
    ChatHistory(Vec<ChatMessage>),
    WebrtcUserReady(WebRtcUserReadyMessage),
    WebrtcOffer(WebRtcOfferRelay),
    WebrtcAnswer(WebRtcAnswerRelay),
    WebrtcIceCandidate(WebRtcIceCandidateRelay),
    Pong(PongMessage),
}

impl SendMessage {
    /// Serialize into a text frame.
    pub fn to_frame(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_join_room() {
        let frame = r#"{"event":"join-room","data":{"roomId":"r1","username":"alice"}}"#;
        match ReceivedMessage::from_frame(frame).unwrap() {
            ReceivedMessage::JoinRoom(msg) => {
                assert_eq!(msg.room_id, "r1");
                assert_eq!(msg.username, "alice");
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_join_room_missing_fields_still_decodes() {
        let frame = r#"{"event":"join-room","data":{"roomId":"r1"}}"#;
        match ReceivedMessage::from_frame(frame).unwrap() {
            ReceivedMessage::JoinRoom(msg) => assert!(msg.username.is_empty()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_chat_history_request_accepts_both_shapes() {
        let bare = r#"{"event":"request-chat-history","data":"r1"}"#;
        let object = r#"{"event":"request-chat-history","data":{"roomId":"r2"}}"#;

        let ids: Vec<String> = [bare, object]
            .iter()
            .map(|frame| match ReceivedMessage::from_frame(frame).unwrap() {
                ReceivedMessage::RequestChatHistory(req) => req.room_id().to_string(),
                other => panic!("unexpected message: {:?}", other),
            })
            .collect();

        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[test]
    fn test_ping_without_data() {
        let msg = ReceivedMessage::from_frame(r#"{"event":"ping"}"#).unwrap();
        assert!(matches!(msg, ReceivedMessage::Ping));
    }

    #[test]
    fn test_unknown_event_is_invalid_request() {
        let err = ReceivedMessage::from_frame(r#"{"event":"teleport","data":{}}"#).unwrap_err();
        assert!(matches!(err, RelayError::InvalidRequest(_)));
    }

    #[test]
    fn test_malformed_frame_is_codec_error() {
        let err = ReceivedMessage::from_frame("not json").unwrap_err();
        assert!(matches!(err, RelayError::Codec(_)));
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_offer_payload_kept_verbatim() {
        let payload = r#"{"sdp":"v=0\r\no=- 1 2 IN IP4 127.0.0.1","type":"offer","extra":[1, 2.50]}"#;
        let frame = format!(
            r#"{{"event":"webrtc-offer","data":{{"roomId":"r1","to":"peer-x","offer":{payload}}}}}"#
        );

        let offer = match ReceivedMessage::from_frame(&frame).unwrap() {
            ReceivedMessage::WebRtcOffer(offer) => offer,
            other => panic!("unexpected message: {:?}", other),
        };
        assert_eq!(offer.to, "peer-x");
        assert_eq!(offer.offer.get(), payload);

        let out = SendMessage::WebrtcOffer(WebRtcOfferRelay {
            from: "peer-a".to_string(),
            offer: offer.offer,
            username: None,
        })
        .to_frame()
        .unwrap();
        assert!(out.contains(payload));
    }

    #[test]
    fn test_send_message_envelope() {
        let frame = SendMessage::CodeUpdate(CodeUpdateMessage {
            file_id: "file-1".to_string(),
            code: "print(1)".to_string(),
            user_id: "a".to_string(),
        })
        .to_frame()
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "code-update");
        assert_eq!(value["data"]["fileId"], "file-1");
        assert_eq!(value["data"]["code"], "print(1)");
        assert_eq!(value["data"]["userId"], "a");
    }

    #[test]
    fn test_webrtc_event_names() {
        let frame = SendMessage::WebrtcIceCandidate(WebRtcIceCandidateRelay {
            from: "a".to_string(),
            candidate: RawValue::from_string("null".to_string()).unwrap(),
        })
        .to_frame()
        .unwrap();
        assert!(frame.starts_with(r#"{"event":"webrtc-ice-candidate""#));
    }
}
