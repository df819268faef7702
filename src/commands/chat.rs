//! Interactive chat session.
//!
//! Wires the configuration, backend client, playback, capture adapter, and
//! chat screen into the main event loop.

use crate::backend::{HttpBackend, MessageKind};
use crate::capture::CaptureAdapter;
use crate::chat::{ChatCommand, ChatTui};
use crate::config::ConvoConfig;
use crate::playback::RodioPlayback;
use crate::session::SessionClient;
use crate::transcript::{TranscriptView, Turn, TurnOrigin};

/// Message rendered when the microphone cannot be opened.
const MIC_ERROR: &str = "Error accessing microphone. Please check your permissions.";

/// Runs the interactive chat session until the user quits.
///
/// One turn is in flight at a time: the loop awaits each send inline, so the
/// typing indicator is visible for exactly the life of the request and a new
/// send cannot start until the previous one resolves.
///
/// # Errors
/// - If the configuration cannot be loaded
/// - If the terminal UI cannot be initialized
pub async fn handle_chat(server_override: Option<String>) -> Result<(), anyhow::Error> {
    tracing::info!("=== convo chat started ===");

    let config = match ConvoConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            eprintln!(
                "Configuration error: {err}\n\nPlease check your ~/.config/convo/convo.toml file and try again."
            );
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let base_url = server_override.unwrap_or_else(|| config.server.base_url.clone());

    tracing::info!(
        "Configuration loaded: server={}, device={}, sample_rate={}Hz, voice_response={}",
        base_url,
        config.audio.device,
        config.audio.sample_rate,
        config.chat.voice_response
    );

    let backend = HttpBackend::new(&base_url);
    let playback = RodioPlayback::new();
    let mut client = SessionClient::new(backend, playback, config.chat.voice_response);
    let mut capture = CaptureAdapter::new(config.audio.sample_rate, config.audio.device.clone());

    tracing::info!("Session {} against {}", client.session_id(), base_url);

    let mut tui = ChatTui::new(client.voice_response_enabled())
        .map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    tui.append(Turn::new(
        format!("Connected to {base_url}. Type a message or press Ctrl-R to talk."),
        TurnOrigin::System,
    ));

    loop {
        tui.set_recording(capture.is_recording(), capture.level());

        match tui.handle_input() {
            Ok(ChatCommand::Continue) => {
                tui.draw().map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
            }
            Ok(ChatCommand::Send(message)) => {
                if let Err(e) = client.send_turn(&mut tui, &message, MessageKind::Text).await {
                    // Reply playback is best-effort; the turn itself already rendered
                    tracing::warn!("Reply playback failed: {e:#}");
                }
            }
            Ok(ChatCommand::ToggleRecording) => {
                if capture.is_recording() {
                    finish_recording(&mut capture, &mut client, &mut tui).await;
                } else if let Err(e) = capture.start() {
                    tracing::warn!("Microphone unavailable: {e:#}");
                    tui.append(Turn::new(MIC_ERROR, TurnOrigin::Bot));
                }
            }
            Ok(ChatCommand::ToggleVoiceResponse) => {
                let enabled = client.toggle_voice_response();
                tui.set_voice_response(enabled);
                tui.draw().map_err(|e| anyhow::anyhow!("Render failed: {e}"))?;
            }
            Ok(ChatCommand::ClearHistory) => {
                client.clear_history(&mut tui).await;
            }
            Ok(ChatCommand::Quit) => break,
            Err(e) => {
                tracing::error!("Input handling error: {}", e);
                return Err(anyhow::anyhow!("Input handling error: {e}"));
            }
        }
    }

    tui.cleanup()
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    tracing::info!("=== convo chat exited ===");
    Ok(())
}

/// Stops the active recording and sends the payload as a voice turn.
///
/// The pipeline is sequential: await the encoded payload, then await the
/// send, so each completed recording produces exactly one voice turn.
async fn finish_recording<B, P>(
    capture: &mut CaptureAdapter,
    client: &mut SessionClient<B, P>,
    tui: &mut ChatTui,
) where
    B: crate::backend::ChatBackend,
    P: crate::playback::SpeechPlayback,
{
    match capture.stop().await {
        Ok(Some(payload)) => {
            tui.set_recording(false, 0);
            if let Err(e) = client.send_turn(tui, &payload, MessageKind::Voice).await {
                tracing::warn!("Reply playback failed: {e:#}");
            }
        }
        Ok(None) => {
            // Nothing captured; stay quiet and let the user try again
            tui.set_recording(false, 0);
        }
        Err(e) => {
            tracing::error!("Failed to finalize recording: {e:#}");
            tui.set_recording(false, 0);
            tui.append(Turn::new(
                format!("Could not process the recording: {e}"),
                TurnOrigin::Error,
            ));
        }
    }
}
