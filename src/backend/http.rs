//! HTTP implementation of the backend contract.
//!
//! Talks to the assistant service over reqwest. Transport failures are mapped
//! to human-readable messages; non-2xx bodies are still parsed because the
//! backend reports failures as an `error` field in a JSON body.

use async_trait::async_trait;

use super::{ChatBackend, ChatRequest, ChatResponse, ClearHistoryRequest};

/// Backend client for an assistant service reachable over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Creates a client for the given base URL, e.g. "http://127.0.0.1:5000".
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Maps a reqwest transport error to a message a user can act on.
    fn describe_transport_error(e: &reqwest::Error) -> String {
        if e.is_connect() {
            "Failed to connect to the assistant backend. Is the server running?".to_string()
        } else if e.is_timeout() {
            "Request to the assistant backend timed out. The server is not responding.".to_string()
        } else {
            format!("Network error talking to the assistant backend: {e}")
        }
    }

    /// Maps an HTTP error status to a message a user can act on.
    fn describe_status(status: reqwest::StatusCode, body: &str) -> String {
        match status.as_u16() {
            401 | 403 => "The assistant backend rejected the request (unauthorized).".to_string(),
            404 => "The assistant backend does not expose the chat API at the configured URL."
                .to_string(),
            429 => "Too many requests. The assistant backend is rate limiting this session."
                .to_string(),
            500..=599 => "The assistant backend is experiencing issues. Please try again later."
                .to_string(),
            _ => format!("Assistant backend error (status {status}): {body}"),
        }
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        let url = self.endpoint("/api/chat");

        tracing::debug!(
            "Chat request: url={}, type={:?}, session_id={}, voice_response={}, message_len={}",
            url,
            request.kind,
            request.session_id,
            request.voice_response,
            request.message.len()
        );

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(Self::describe_transport_error(&e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read backend response: {e}"))?;

        // The backend reports failures as {"error": ...} bodies, often with a
        // non-2xx status. Parse the body first so that message wins over a
        // generic status description.
        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => {
                tracing::debug!(
                    "Chat response: status={}, reply_len={}, audio={}, error={:?}",
                    status,
                    parsed.reply.len(),
                    parsed.audio.is_some(),
                    parsed.error
                );
                Ok(parsed)
            }
            Err(_) if !status.is_success() => {
                Err(anyhow::anyhow!(Self::describe_status(status, body.trim())))
            }
            Err(e) => Err(anyhow::anyhow!("Failed to parse backend response: {e}")),
        }
    }

    async fn clear_history(&self, session_id: &str) -> anyhow::Result<()> {
        let url = self.endpoint("/api/clear-history");
        let request = ClearHistoryRequest {
            session_id: session_id.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(Self::describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("Clear history returned status {status}"));
        }

        tracing::debug!("History cleared for session {}", session_id);
        Ok(())
    }
}
