//! services/companion/src/web/protocol.rs
//!
//! The WebSocket message protocol between the client and the companion.
//!
//! Besides the messages below, every `CompanionEvent` is forwarded to the
//! client as-is (profile, session, typing and reply notifications).

use serde::{Deserialize, Serialize};
use study_companion_core::domain::FilePart;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Sends a chat message and streams the reply back.
    SendMessage {
        session_id: String,
        #[serde(default)]
        text: String,
        #[serde(default)]
        attachments: Vec<FilePart>,
        #[serde(default)]
        deep_reasoning: bool,
    },

    /// Makes a session the active one.
    SelectSession { session_id: String },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A piece of the assistant's reply as it is produced. The complete reply
    /// follows as a `reply_appended` event.
    ReplyChunk { session_id: String, delta: String },

    /// A request from this client was rejected.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_defaults_optional_fields() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send_message","session_id":"case_1","text":"hi"}"#).unwrap();
        match msg {
            ClientMessage::SendMessage { session_id, text, attachments, deep_reasoning } => {
                assert_eq!(session_id, "case_1");
                assert_eq!(text, "hi");
                assert!(attachments.is_empty());
                assert!(!deep_reasoning);
            }
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[test]
    fn chunk_wire_format() {
        let json = serde_json::to_value(ServerMessage::ReplyChunk {
            session_id: "case_1".into(),
            delta: "Jay".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "reply_chunk");
        assert_eq!(json["delta"], "Jay");
    }
}
