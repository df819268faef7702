//! The message-exchange session protocol.
//!
//! Every turn follows the same lifecycle: append the user's entry, show the
//! typing indicator, issue the backend request, remove the indicator, then
//! render the reply or a single normalized error entry. Voice turns skip the
//! user entry (the payload is not worth rendering) but share the rest of the
//! pipeline.

use base64::Engine;

use crate::backend::{ChatBackend, ChatRequest, ChatResponse, MessageKind};
use crate::playback::SpeechPlayback;
use crate::transcript::{TranscriptView, Turn, TurnOrigin};

/// Label shown while a request is in flight.
const TYPING_LABEL: &str = "Assistant is typing...";

/// Confirmation entry appended after a history clear.
const HISTORY_CLEARED: &str = "Chat history cleared!";

/// Fallback when a failure carries no usable message.
const GENERIC_ERROR: &str = "An error occurred. Please try again.";

/// Client-side endpoint of one chat session.
///
/// Owns the session identifier (stable for the process lifetime) and the
/// voice-response flag. Generic over the backend and playback seams so the
/// protocol can be exercised without a server or a sound card.
pub struct SessionClient<B, P> {
    session_id: String,
    voice_response_enabled: bool,
    backend: B,
    playback: P,
}

impl<B: ChatBackend, P: SpeechPlayback> SessionClient<B, P> {
    /// Creates a client with a fresh session identifier.
    ///
    /// The identifier is the startup wall clock in epoch milliseconds as a
    /// decimal string. It is a single-client session key, not a unique token;
    /// collision risk across machines is accepted.
    pub fn new(backend: B, playback: P, voice_response_enabled: bool) -> Self {
        Self {
            session_id: chrono::Utc::now().timestamp_millis().to_string(),
            voice_response_enabled,
            backend,
            playback,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn voice_response_enabled(&self) -> bool {
        self.voice_response_enabled
    }

    /// Flips whether future replies attempt audio playback.
    ///
    /// Has no effect on a send already in flight; each send captures the flag
    /// when it starts. Returns the new value.
    pub fn toggle_voice_response(&mut self) -> bool {
        self.voice_response_enabled = !self.voice_response_enabled;
        tracing::info!(
            "Voice responses {}",
            if self.voice_response_enabled { "enabled" } else { "disabled" }
        );
        self.voice_response_enabled
    }

    /// Sends one turn through the session protocol.
    ///
    /// Text turns with empty or whitespace-only content are silently dropped:
    /// no request is sent and nothing is rendered. Voice content is passed
    /// through unvalidated.
    ///
    /// Request failures (transport, HTTP status, or a backend-reported
    /// `error` field) are normalized into a single error entry on the
    /// transcript and do NOT surface as `Err`.
    ///
    /// # Errors
    /// - If a received audio payload cannot be base64-decoded
    /// - If playback of a received audio payload fails to start
    pub async fn send_turn<V: TranscriptView>(
        &mut self,
        view: &mut V,
        content: &str,
        kind: MessageKind,
    ) -> anyhow::Result<()> {
        let message = match kind {
            MessageKind::Text => {
                let trimmed = content.trim();
                if trimmed.is_empty() {
                    tracing::debug!("Dropping empty text turn");
                    return Ok(());
                }
                view.append(Turn::new(trimmed, TurnOrigin::User));
                trimmed.to_string()
            }
            // The payload is opaque; it is sent but never rendered
            MessageKind::Voice => content.to_string(),
        };

        // Captured here so a toggle during the request does not affect this turn
        let voice_response = self.voice_response_enabled;

        let request = ChatRequest {
            message,
            kind,
            session_id: self.session_id.clone(),
            voice_response,
        };

        let indicator = view.show_transient(TYPING_LABEL);
        let result = self.backend.send_chat(&request).await;
        view.remove_transient(indicator);

        match result {
            Ok(response) => self.render_response(view, response, voice_response),
            Err(e) => {
                tracing::warn!("Chat request failed: {e:#}");
                view.append(Turn::new(error_message(&e.to_string()), TurnOrigin::Error));
                Ok(())
            }
        }
    }

    /// Renders a parsed response: an error entry, or a bot entry plus
    /// best-effort playback.
    fn render_response<V: TranscriptView>(
        &mut self,
        view: &mut V,
        response: ChatResponse,
        voice_response: bool,
    ) -> anyhow::Result<()> {
        if let Some(error) = response.error {
            tracing::warn!("Backend reported error: {error}");
            view.append(Turn::new(error_message(&error), TurnOrigin::Error));
            return Ok(());
        }

        view.append(Turn::new(response.reply, TurnOrigin::Bot));

        if voice_response {
            if let Some(audio) = response.audio {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(audio.as_bytes())
                    .map_err(|e| anyhow::anyhow!("Invalid audio payload in reply: {e}"))?;
                self.playback.play(bytes)?;
            }
        }

        Ok(())
    }

    /// Clears the session history.
    ///
    /// The backend call is best-effort: a failure is logged and the local
    /// transcript is cleared regardless, followed by a single confirmation
    /// entry. Nothing is surfaced to the user on failure.
    pub async fn clear_history<V: TranscriptView>(&mut self, view: &mut V) {
        if let Err(e) = self.backend.clear_history(&self.session_id).await {
            tracing::error!("Failed to clear history on backend: {e:#}");
        }

        view.clear();
        view.append(Turn::new(HISTORY_CLEARED, TurnOrigin::System));
    }
}

/// Picks the best available failure message.
fn error_message(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        GENERIC_ERROR.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::TransientHandle;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Shared event log so view, backend, and playback interleavings can be
    /// asserted in one sequence.
    type Log = Arc<Mutex<Vec<String>>>;

    /// Logs every view call while delegating to the real transcript model.
    struct ProbeView {
        log: Log,
        inner: crate::transcript::Transcript,
    }

    impl ProbeView {
        fn new(log: Log) -> Self {
            Self {
                log,
                inner: crate::transcript::Transcript::new(),
            }
        }
    }

    impl TranscriptView for ProbeView {
        fn append(&mut self, turn: Turn) {
            let origin = match turn.origin {
                TurnOrigin::User => "user",
                TurnOrigin::Bot => "bot",
                TurnOrigin::System => "system",
                TurnOrigin::Error => "error",
            };
            self.log.lock().unwrap().push(format!("append:{origin}:{}", turn.content));
            self.inner.append(turn);
        }

        fn show_transient(&mut self, label: &str) -> TransientHandle {
            self.log.lock().unwrap().push(format!("show:{label}"));
            self.inner.show_transient(label)
        }

        fn remove_transient(&mut self, handle: TransientHandle) {
            self.log.lock().unwrap().push("remove".to_string());
            self.inner.remove_transient(handle);
        }

        fn clear(&mut self) {
            self.log.lock().unwrap().push("clear".to_string());
            self.inner.clear();
        }
    }

    struct ScriptedBackend {
        log: Log,
        chat_results: Mutex<VecDeque<anyhow::Result<ChatResponse>>>,
        requests: Mutex<Vec<ChatRequest>>,
        clear_result: Mutex<anyhow::Result<()>>,
        clear_sessions: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(log: Log) -> Self {
            Self {
                log,
                chat_results: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                clear_result: Mutex::new(Ok(())),
                clear_sessions: Mutex::new(Vec::new()),
            }
        }

        fn script(self, result: anyhow::Result<ChatResponse>) -> Self {
            self.chat_results.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl ChatBackend for Arc<ScriptedBackend> {
        async fn send_chat(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
            self.log.lock().unwrap().push("request".to_string());
            self.requests.lock().unwrap().push(request.clone());
            self.chat_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted chat call")
        }

        async fn clear_history(&self, session_id: &str) -> anyhow::Result<()> {
            self.clear_sessions.lock().unwrap().push(session_id.to_string());
            std::mem::replace(&mut *self.clear_result.lock().unwrap(), Ok(()))
        }
    }

    #[derive(Clone, Default)]
    struct ProbePlayback {
        played: Arc<Mutex<Vec<Vec<u8>>>>,
        fail: bool,
    }

    impl SpeechPlayback for ProbePlayback {
        fn play(&mut self, audio: Vec<u8>) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("no output device"));
            }
            self.played.lock().unwrap().push(audio);
            Ok(())
        }
    }

    fn reply(text: &str) -> ChatResponse {
        ChatResponse {
            reply: text.to_string(),
            audio: None,
            error: None,
        }
    }

    fn setup(
        results: Vec<anyhow::Result<ChatResponse>>,
        voice_response: bool,
    ) -> (
        Log,
        ProbeView,
        Arc<ScriptedBackend>,
        ProbePlayback,
        SessionClient<Arc<ScriptedBackend>, ProbePlayback>,
    ) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let mut backend = ScriptedBackend::new(log.clone());
        for result in results {
            backend = backend.script(result);
        }
        let backend = Arc::new(backend);
        let playback = ProbePlayback::default();
        let client = SessionClient::new(backend.clone(), playback.clone(), voice_response);
        let view = ProbeView::new(log.clone());
        (log, view, backend, playback, client)
    }

    #[tokio::test]
    async fn test_text_turn_lifecycle_order() {
        let (log, mut view, _backend, _playback, mut client) =
            setup(vec![Ok(reply("hi there"))], false);

        client
            .send_turn(&mut view, "hello", MessageKind::Text)
            .await
            .unwrap();

        // User entry lands before the request is issued; indicator wraps the
        // request and is gone before the reply renders.
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "append:user:hello",
                "show:Assistant is typing...",
                "request",
                "remove",
                "append:bot:hi there",
            ]
        );
    }

    #[tokio::test]
    async fn test_whitespace_text_turn_is_dropped() {
        let (log, mut view, backend, _playback, mut client) = setup(vec![], false);

        client.send_turn(&mut view, "   \t", MessageKind::Text).await.unwrap();
        client.send_turn(&mut view, "", MessageKind::Text).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert!(backend.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_content_is_trimmed_before_send() {
        let (_log, mut view, backend, _playback, mut client) =
            setup(vec![Ok(reply("ok"))], false);

        client
            .send_turn(&mut view, "  hello  ", MessageKind::Text)
            .await
            .unwrap();

        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].message, "hello");
        assert_eq!(requests[0].kind, MessageKind::Text);
    }

    #[tokio::test]
    async fn test_voice_turn_skips_user_entry_and_passes_payload_through() {
        let (log, mut view, backend, _playback, mut client) =
            setup(vec![Ok(reply("heard you"))], false);

        client.send_turn(&mut view, "UklGRg==", MessageKind::Voice).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "show:Assistant is typing...",
                "request",
                "remove",
                "append:bot:heard you",
            ]
        );
        let requests = backend.requests.lock().unwrap();
        assert_eq!(requests[0].message, "UklGRg==");
        assert_eq!(requests[0].kind, MessageKind::Voice);
    }

    #[tokio::test]
    async fn test_audio_reply_plays_when_voice_response_enabled() {
        let response = ChatResponse {
            reply: "spoken".to_string(),
            audio: Some("AQID".to_string()), // [1, 2, 3]
            error: None,
        };
        let (_log, mut view, _backend, playback, mut client) = setup(vec![Ok(response)], true);

        client.send_turn(&mut view, "say it", MessageKind::Text).await.unwrap();

        assert_eq!(*playback.played.lock().unwrap(), vec![vec![1u8, 2, 3]]);
    }

    #[tokio::test]
    async fn test_audio_reply_ignored_when_voice_response_disabled() {
        let response = ChatResponse {
            reply: "silent".to_string(),
            audio: Some("AQID".to_string()),
            error: None,
        };
        let (log, mut view, _backend, playback, mut client) = setup(vec![Ok(response)], false);

        client.send_turn(&mut view, "say it", MessageKind::Text).await.unwrap();

        assert!(playback.played.lock().unwrap().is_empty());
        assert!(log.lock().unwrap().contains(&"append:bot:silent".to_string()));
    }

    #[tokio::test]
    async fn test_playback_failure_propagates_after_bot_entry() {
        let response = ChatResponse {
            reply: "spoken".to_string(),
            audio: Some("AQID".to_string()),
            error: None,
        };
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let backend = Arc::new(ScriptedBackend::new(log.clone()).script(Ok(response)));
        let playback = ProbePlayback {
            fail: true,
            ..Default::default()
        };
        let mut client = SessionClient::new(backend, playback, true);
        let mut view = ProbeView::new(log.clone());

        let result = client.send_turn(&mut view, "say it", MessageKind::Text).await;

        assert!(result.is_err());
        // The reply still rendered; only the playback side effect failed
        assert!(log.lock().unwrap().contains(&"append:bot:spoken".to_string()));
    }

    #[tokio::test]
    async fn test_backend_error_field_renders_single_error_entry() {
        let response = ChatResponse {
            reply: String::new(),
            audio: None,
            error: Some("model unavailable".to_string()),
        };
        let (log, mut view, _backend, _playback, mut client) = setup(vec![Ok(response)], false);

        client.send_turn(&mut view, "hello", MessageKind::Text).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                "append:user:hello",
                "show:Assistant is typing...",
                "request",
                "remove",
                "append:error:model unavailable",
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_renders_error_entry() {
        let (log, mut view, _backend, _playback, mut client) =
            setup(vec![Err(anyhow::anyhow!("connection refused"))], false);

        client.send_turn(&mut view, "hello", MessageKind::Text).await.unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.last().unwrap(), "append:error:connection refused");
        // Indicator removed before the error rendered
        assert_eq!(log[log.len() - 2], "remove");
    }

    #[tokio::test]
    async fn test_blank_failure_message_falls_back_to_generic_notice() {
        let (log, mut view, _backend, _playback, mut client) =
            setup(vec![Err(anyhow::anyhow!("  "))], false);

        client.send_turn(&mut view, "hello", MessageKind::Text).await.unwrap();

        assert_eq!(
            log.lock().unwrap().last().unwrap(),
            "append:error:An error occurred. Please try again."
        );
    }

    #[tokio::test]
    async fn test_clear_history_wipes_view_and_confirms() {
        let (log, mut view, backend, _playback, mut client) = setup(vec![], false);

        client.clear_history(&mut view).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["clear", "append:system:Chat history cleared!"]
        );
        assert_eq!(
            *backend.clear_sessions.lock().unwrap(),
            vec![client.session_id().to_string()]
        );
    }

    #[tokio::test]
    async fn test_clear_history_ignores_backend_failure() {
        let (log, mut view, backend, _playback, mut client) = setup(vec![], false);
        *backend.clear_result.lock().unwrap() = Err(anyhow::anyhow!("backend down"));

        client.clear_history(&mut view).await;

        // Optimistic clear: identical outcome on failure
        assert_eq!(
            *log.lock().unwrap(),
            vec!["clear", "append:system:Chat history cleared!"]
        );
    }

    #[tokio::test]
    async fn test_toggle_voice_response_round_trips_and_tags_requests() {
        let (_log, mut view, backend, _playback, mut client) =
            setup(vec![Ok(reply("a")), Ok(reply("b"))], false);

        assert!(client.toggle_voice_response());
        client.send_turn(&mut view, "one", MessageKind::Text).await.unwrap();

        assert!(!client.toggle_voice_response());
        client.send_turn(&mut view, "two", MessageKind::Text).await.unwrap();

        let requests = backend.requests.lock().unwrap();
        assert!(requests[0].voice_response);
        assert!(!requests[1].voice_response);
    }

    #[tokio::test]
    async fn test_session_id_is_decimal_and_stable() {
        let (_log, _view, _backend, _playback, client) = setup(vec![], false);

        let id = client.session_id().to_string();
        assert!(!id.is_empty());
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(client.session_id(), id);
    }
}
