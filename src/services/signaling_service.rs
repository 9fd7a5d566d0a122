//! Call-setup relay. Offers, answers and ICE candidates are passed between
//! two peers as opaque JSON; nothing here touches room state.

use serde_json::value::RawValue;
use tracing::debug;

use crate::models::{
    RelayError, SendMessage, WebRtcAnswerRelay, WebRtcIceCandidateRelay, WebRtcOfferRelay, WebRtcUserReadyMessage,
};
use crate::ws::AppState;

/// Tell the rest of the room that `conn_id` can take calls.
pub async fn ready(state: &AppState, room_id: &str, conn_id: &str, username: Option<String>) -> Result<(), RelayError> {
    let members = state.rooms.lock_open(room_id).await?.member_ids();

    let notice = SendMessage::WebrtcUserReady(WebRtcUserReadyMessage {
        user_id: conn_id.to_string(),
        username,
    });
    let delivered = state.registry.broadcast(&members, &notice, Some(conn_id)).await;
    debug!("WebRTC ready from {} in room {} sent to {} peer(s)", conn_id, room_id, delivered);
    Ok(())
}

pub async fn offer(state: &AppState, from: &str, to: &str, offer: Box<RawValue>, username: Option<String>) -> Result<(), RelayError> {
    let msg = SendMessage::WebrtcOffer(WebRtcOfferRelay {
        from: from.to_string(),
        offer,
        username,
    });
    forward(state, from, to, &msg).await
}

pub async fn answer(state: &AppState, from: &str, to: &str, answer: Box<RawValue>) -> Result<(), RelayError> {
    let msg = SendMessage::WebrtcAnswer(WebRtcAnswerRelay {
        from: from.to_string(),
        answer,
    });
    forward(state, from, to, &msg).await
}

pub async fn ice_candidate(state: &AppState, from: &str, to: &str, candidate: Box<RawValue>) -> Result<(), RelayError> {
    let msg = SendMessage::WebrtcIceCandidate(WebRtcIceCandidateRelay {
        from: from.to_string(),
        candidate,
    });
    forward(state, from, to, &msg).await
}

async fn forward(state: &AppState, from: &str, to: &str, msg: &SendMessage) -> Result<(), RelayError> {
    if state.registry.send_to(to, msg).await {
        debug!("Signal from {} forwarded to {}", from, to);
        Ok(())
    } else {
        Err(RelayError::UnknownReference(format!("connection '{to}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::session_service;

    fn raw(text: &str) -> Box<RawValue> {
        RawValue::from_string(text.to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_offer_forwarded_verbatim_to_target_only() {
        let state = AppState::new(Config::default());
        let mut rx_a = state.registry.register("a").await;
        let mut rx_x = state.registry.register("x").await;
        let mut rx_y = state.registry.register("y").await;

        let payload = r#"{"type":"offer","sdp":"v=0\r\n","weird":[1.50,{"k":null}]}"#;
        offer(&state, "a", "x", raw(payload), Some("alice".to_string())).await.unwrap();

        let frame = rx_x.try_recv().unwrap();
        assert!(frame.contains(payload));
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "webrtc-offer");
        assert_eq!(value["data"]["from"], "a");
        assert_eq!(value["data"]["username"], "alice");

        assert!(rx_a.try_recv().is_err());
        assert!(rx_y.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_answer_and_candidate_any_shape() {
        let state = AppState::new(Config::default());
        let _rx_a = state.registry.register("a").await;
        let mut rx_b = state.registry.register("b").await;

        answer(&state, "a", "b", raw(r#""just a string""#)).await.unwrap();
        ice_candidate(&state, "a", "b", raw("42")).await.unwrap();

        let first = rx_b.try_recv().unwrap();
        assert_eq!(first, r#"{"event":"webrtc-answer","data":{"from":"a","answer":"just a string"}}"#);
        let second = rx_b.try_recv().unwrap();
        assert_eq!(second, r#"{"event":"webrtc-ice-candidate","data":{"from":"a","candidate":42}}"#);
    }

    #[tokio::test]
    async fn test_signal_to_unknown_connection() {
        let state = AppState::new(Config::default());
        let err = offer(&state, "a", "ghost", raw("{}"), None).await.unwrap_err();
        assert!(matches!(err, RelayError::UnknownReference(_)));
    }

    #[tokio::test]
    async fn test_ready_excludes_sender() {
        let state = AppState::new(Config::default());
        let mut rx_a = state.registry.register("a").await;
        let mut rx_b = state.registry.register("b").await;
        session_service::join(&state, "a", "r1", "alice").await.unwrap();
        session_service::join(&state, "b", "r1", "bob").await.unwrap();
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        ready(&state, "r1", "b", Some("bob".to_string())).await.unwrap();

        assert!(rx_b.try_recv().is_err());
        let value: serde_json::Value = serde_json::from_str(&rx_a.try_recv().unwrap()).unwrap();
        assert_eq!(value["event"], "webrtc-user-ready");
        assert_eq!(value["data"]["userId"], "b");
        assert_eq!(value["data"]["username"], "bob");
    }
}
