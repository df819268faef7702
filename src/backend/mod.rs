//! Backend API client for the assistant service.
//!
//! Defines the wire contract for the two backend endpoints and the
//! [`ChatBackend`] trait the session client calls through. The HTTP
//! implementation lives in [`http`]; tests substitute their own.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;

/// The kind of an outbound message, as the backend expects it on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Plain text typed by the user
    Text,
    /// Base64-encoded recorded audio
    Voice,
}

/// Request body for `POST /api/chat`.
///
/// Constructed per turn and discarded after the call completes.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Message text, or the base64 audio payload for voice turns
    pub message: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub session_id: String,
    /// Whether the backend should synthesize an audio reply
    pub voice_response: bool,
}

/// Response body from `POST /api/chat`.
///
/// A present `error` field means the turn failed regardless of the HTTP
/// status the body arrived with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub reply: String,
    /// Base64-encoded synthesized speech, present when the backend produced one
    #[serde(default)]
    pub audio: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for `POST /api/clear-history`.
#[derive(Debug, Clone, Serialize)]
pub struct ClearHistoryRequest {
    pub session_id: String,
}

/// Transport seam between the session client and the assistant service.
///
/// Implementations normalize transport failures into `Err`; a backend-reported
/// `error` field travels inside an `Ok` response and is classified by the
/// session client.
#[async_trait]
pub trait ChatBackend {
    /// Sends one chat turn and returns the parsed response body.
    async fn send_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse>;

    /// Asks the backend to drop the session's history. The response body is
    /// not inspected.
    async fn clear_history(&self, session_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_wire_format() {
        let request = ChatRequest {
            message: "hello".to_string(),
            kind: MessageKind::Text,
            session_id: "1733000000000".to_string(),
            voice_response: true,
        };

        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["message"], "hello");
        assert_eq!(json["type"], "text");
        assert_eq!(json["session_id"], "1733000000000");
        assert_eq!(json["voice_response"], true);
    }

    #[test]
    fn test_voice_kind_serializes_lowercase() {
        let request = ChatRequest {
            message: "QUJD".to_string(),
            kind: MessageKind::Voice,
            session_id: "1".to_string(),
            voice_response: false,
        };

        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(json["type"], "voice");
    }

    #[test]
    fn test_chat_response_tolerates_missing_fields() {
        let response: ChatResponse = serde_json::from_str(r#"{"reply": "hi"}"#).unwrap();
        assert_eq!(response.reply, "hi");
        assert!(response.audio.is_none());
        assert!(response.error.is_none());

        // Error-only body, as the backend sends on a 500
        let response: ChatResponse = serde_json::from_str(r#"{"error": "boom"}"#).unwrap();
        assert_eq!(response.reply, "");
        assert_eq!(response.error.as_deref(), Some("boom"));
    }
}
