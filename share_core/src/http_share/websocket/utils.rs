//! WebSocket utility functions

use crate::protocol::ServerMessage;
use axum::extract::ws::Message;

/// Encode a server message as a text frame
pub fn to_ws_message(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to encode server message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame() {
        let frame = to_ws_message(&ServerMessage::OwnerOffline {
            code: "123456".to_string(),
        });
        match frame {
            Some(Message::Text(text)) => {
                assert_eq!(text.as_str(), r#"{"type":"owner-offline","code":"123456"}"#)
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
