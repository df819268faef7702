//! Voice capture for the chat protocol.
//!
//! Bridges microphone recording into the session as a voice turn. The
//! adapter is a two-state machine, `Idle -> Recording -> Idle`, driven by a
//! single toggle: starting while recording is ignored, and stopping is the
//! only way out of `Recording`. A completed recording is finalized into one
//! in-memory WAV and base64-encoded for transfer, yielding exactly one
//! payload per recording.

pub mod recorder;

use std::io::Cursor;

use anyhow::Result;
use base64::Engine;

use recorder::MicCapture;

/// Microphone-to-payload adapter.
///
/// Holding the capture session in an `Option` is what enforces the
/// at-most-one-active-recording invariant.
pub struct CaptureAdapter {
    sample_rate: u32,
    device: String,
    recording: Option<MicCapture>,
}

impl CaptureAdapter {
    /// Creates an idle adapter for the configured device and sample rate.
    pub fn new(sample_rate: u32, device: String) -> Self {
        Self {
            sample_rate,
            device,
            recording: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Recent input peak (0-100) while recording, 0 when idle.
    pub fn level(&self) -> u8 {
        self.recording
            .as_ref()
            .map(|capture| capture.recent_peak())
            .unwrap_or(0)
    }

    /// Enters `Recording` by opening the microphone.
    ///
    /// A no-op when already recording. On device or permission failure the
    /// adapter stays `Idle`; the caller reports the error once and the user
    /// may simply try again.
    ///
    /// # Errors
    /// - If the input device cannot be opened (missing, busy, or permission denied)
    pub fn start(&mut self) -> Result<()> {
        if self.recording.is_some() {
            tracing::debug!("Ignoring capture start: already recording");
            return Ok(());
        }

        let capture = MicCapture::open(self.sample_rate, &self.device)?;
        self.recording = Some(capture);
        Ok(())
    }

    /// Leaves `Recording` and finalizes the captured audio.
    ///
    /// Returns `None` when there was nothing to finalize: the adapter was
    /// idle, or the device delivered no samples. Otherwise the samples are
    /// encoded to WAV and then base64 on a blocking worker, and the payload
    /// is returned for the caller to send as a voice turn.
    ///
    /// # Errors
    /// - If WAV encoding fails
    /// - If the encoding task is cancelled
    pub async fn stop(&mut self) -> Result<Option<String>> {
        let Some(capture) = self.recording.take() else {
            tracing::debug!("Ignoring capture stop: not recording");
            return Ok(None);
        };

        let sample_rate = capture.sample_rate();
        let samples = capture.finish();

        if samples.is_empty() {
            tracing::warn!("Recording stopped with no samples captured");
            return Ok(None);
        }

        // Encoding a long recording is CPU work; keep it off the event loop
        let payload =
            tokio::task::spawn_blocking(move || encode_payload(&samples, sample_rate)).await??;

        Ok(Some(payload))
    }
}

/// Encodes mono PCM samples as a 16-bit WAV in memory.
fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// Finalizes samples into the transfer payload: WAV bytes, base64-encoded.
fn encode_payload(samples: &[i16], sample_rate: u32) -> Result<String> {
    let wav = encode_wav(samples, sample_rate)?;
    let payload = base64::engine::general_purpose::STANDARD.encode(&wav);

    tracing::debug!(
        "Encoded recording: {} samples -> {} WAV bytes -> {} base64 chars",
        samples.len(),
        wav.len(),
        payload.len()
    );

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let mut adapter = CaptureAdapter::new(16000, "default".to_string());
        assert!(!adapter.is_recording());
        assert_eq!(adapter.level(), 0);

        let payload = adapter.stop().await.unwrap();
        assert!(payload.is_none());
    }

    #[test]
    fn test_encode_wav_header_and_length() {
        let samples = vec![0i16, 1, -1, i16::MAX, i16::MIN];
        let wav = encode_wav(&samples, 16000).unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte canonical header followed by two bytes per sample
        assert_eq!(wav.len(), 44 + samples.len() * 2);
    }

    #[test]
    fn test_encode_payload_round_trips_through_base64() {
        let samples = vec![42i16; 100];
        let payload = encode_payload(&samples, 8000).unwrap();

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(payload.as_bytes())
            .unwrap();
        assert_eq!(decoded, encode_wav(&samples, 8000).unwrap());
    }

    #[test]
    fn test_encoded_wav_is_readable() {
        let samples = vec![100i16, -100, 200, -200];
        let wav = encode_wav(&samples, 22050).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 22050);
        let read: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(read, samples);
    }
}
