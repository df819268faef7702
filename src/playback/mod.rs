//! Playback of synthesized speech replies.
//!
//! The backend ships audio as an opaque encoded payload (typically mp3).
//! Playback is fire-and-forget: once started it is not tracked, paused, or
//! cancelled, and the next reply simply starts a fresh sink.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, Sink};

/// Seam for playing a decoded audio reply.
///
/// The session client calls this with the raw (base64-decoded) bytes of the
/// reply payload. Implementations decide codec handling.
pub trait SpeechPlayback {
    /// Starts playing the payload without blocking.
    fn play(&mut self, audio: Vec<u8>) -> anyhow::Result<()>;
}

/// rodio-backed playback through the default output device.
///
/// Keeps the most recent output stream alive so detached sinks keep playing
/// while the chat loop continues.
#[derive(Default)]
pub struct RodioPlayback {
    // Dropping the stream silences any sink attached to it
    stream: Option<OutputStream>,
}

impl RodioPlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpeechPlayback for RodioPlayback {
    fn play(&mut self, audio: Vec<u8>) -> anyhow::Result<()> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| anyhow::anyhow!("No audio output device available: {e}"))?;
        let sink = Sink::try_new(&handle)
            .map_err(|e| anyhow::anyhow!("Failed to open audio output: {e}"))?;

        let source = Decoder::new(Cursor::new(audio))
            .map_err(|e| anyhow::anyhow!("Failed to decode audio reply: {e}"))?;

        sink.append(source);
        sink.detach();

        // Starting a new reply replaces the previous stream; an earlier reply
        // still playing is cut off at that point.
        self.stream = Some(stream);

        tracing::debug!("Speech playback started");
        Ok(())
    }
}
