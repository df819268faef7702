//! Microphone capture built on cpal.
//!
//! Captures PCM from a configured or default input device at its native
//! sample rate, folding multi-channel audio down to mono by averaging
//! channels. The accumulated samples are handed back in one buffer when the
//! stream is finished.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// One microphone capture session.
///
/// Holds the live input stream; dropping or finishing it stops capture.
pub struct MicCapture {
    /// Actual recording sample rate from device
    sample_rate: u32,
    /// Accumulated mono samples (i16 PCM)
    samples: Arc<Mutex<Vec<i16>>>,
    /// Active audio input stream (kept alive during recording)
    stream: Option<cpal::Stream>,
}

impl MicCapture {
    /// Opens the input device and starts capturing.
    ///
    /// # Arguments
    /// * `requested_sample_rate` - Desired rate in Hz; the device rate wins if they differ
    /// * `device_name` - "default", a device name, or a numeric index from `convo list-devices`
    ///
    /// # Errors
    /// - If no input device is available or the named device is not found
    /// - If device configuration or stream creation fails (including missing
    ///   microphone permission)
    pub fn open(requested_sample_rate: u32, device_name: &str) -> Result<Self> {
        // Get device while suppressing ALSA library warnings
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();

            if device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| anyhow!("No audio input device available"))
            } else {
                find_device_by_name(&host, device_name)
            }
        })?;

        let resolved_name = device
            .name()
            .unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", resolved_name);

        let device_config = device.default_input_config()?;
        let device_sample_rate = device_config.sample_rate().0;
        let num_channels = device_config.channels() as usize;

        if device_sample_rate != requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                requested_sample_rate,
                device_sample_rate
            );
        }

        tracing::debug!(
            "Device configuration: {}Hz, {} channels",
            device_sample_rate,
            num_channels
        );

        let samples = Arc::new(Mutex::new(Vec::new()));
        let samples_arc = Arc::clone(&samples);

        let stream = device.build_input_stream(
            &device_config.into(),
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                fold_to_mono(data, &samples_arc, num_channels);
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )?;

        stream.play()?;
        tracing::debug!("Audio stream started");

        Ok(Self {
            sample_rate: device_sample_rate,
            samples,
            stream: Some(stream),
        })
    }

    /// Stops the stream and returns everything captured so far.
    pub fn finish(mut self) -> Vec<i16> {
        self.stream = None;

        let samples = self.samples.lock().unwrap().clone();
        let duration_secs = samples.len() as f32 / self.sample_rate as f32;
        tracing::info!(
            "Recording stopped: {:.2}s ({} samples at {}Hz)",
            duration_secs,
            samples.len(),
            self.sample_rate
        );

        samples
    }

    /// Returns the actual sample rate of the capture.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Recent input peak as a percentage of full scale, for the level meter.
    pub fn recent_peak(&self) -> u8 {
        const WINDOW: usize = 2048;

        let samples = self.samples.lock().unwrap();
        let start = samples.len().saturating_sub(WINDOW);
        let peak = samples[start..]
            .iter()
            .map(|&s| (s as i32).unsigned_abs())
            .max()
            .unwrap_or(0);

        ((peak * 100) / i16::MAX as u32).min(100) as u8
    }
}

/// Appends incoming device samples as mono by averaging all channels.
fn fold_to_mono(data: &[i16], samples_arc: &Arc<Mutex<Vec<i16>>>, num_channels: usize) {
    let mut samples = samples_arc.lock().unwrap();

    match num_channels {
        1 => {
            samples.extend_from_slice(data);
        }
        _ => {
            for chunk in data.chunks_exact(num_channels) {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                samples.push((sum / num_channels as i32) as i16);
            }
        }
    }
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device> {
    // Try to parse as a numeric index first
    if let Ok(index) = device_spec.parse::<usize>() {
        let devices: Vec<_> = host
            .input_devices()
            .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?
            .collect();

        if index < devices.len() {
            return Ok(devices.into_iter().nth(index).unwrap());
        } else {
            return Err(anyhow!(
                "Device index {} is out of range (0-{})",
                index,
                devices.len().saturating_sub(1)
            ));
        }
    }

    let devices = host
        .input_devices()
        .map_err(|e| anyhow!("Failed to enumerate devices: {e}"))?;

    for device in devices {
        if let Ok(name) = device.name() {
            if name == device_spec {
                return Ok(device);
            }
        }
    }

    Err(anyhow!(
        "Audio input device '{device_spec}' not found. Use 'convo list-devices' to see available devices."
    ))
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
/// On non-Linux platforms, this is a no-op since ALSA doesn't exist.
#[cfg(target_os = "linux")]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .map_err(|e| anyhow!("Failed to open /dev/null: {e}"))?;

    let dev_null_fd = dev_null.as_raw_fd();

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return Err(anyhow!("Failed to duplicate stderr"));
    }

    let redirect_result = unsafe { libc::dup2(dev_null_fd, libc::STDERR_FILENO) };
    if redirect_result == -1 {
        unsafe { libc::close(old_stderr) };
        return Err(anyhow!("Failed to redirect stderr"));
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// On non-Linux platforms, no stderr suppression is needed since ALSA doesn't exist.
#[cfg(not(target_os = "linux"))]
pub fn suppress_alsa_warnings<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_to_mono_averages_stereo_pairs() {
        let samples = Arc::new(Mutex::new(Vec::new()));
        fold_to_mono(&[100, 300, -50, 50], &samples, 2);
        assert_eq!(*samples.lock().unwrap(), vec![200, 0]);
    }

    #[test]
    fn test_fold_to_mono_passes_mono_through() {
        let samples = Arc::new(Mutex::new(vec![1]));
        fold_to_mono(&[2, 3], &samples, 1);
        assert_eq!(*samples.lock().unwrap(), vec![1, 2, 3]);
    }
}
