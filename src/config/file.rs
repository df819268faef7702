//! Configuration file management for convo.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Backend server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the assistant backend, e.g. "http://127.0.0.1:5000".
    /// The chat and clear-history endpoints are resolved relative to it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `convo list-devices`
    /// - device name from `convo list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Recording sample rate in Hz (16000 recommended for speech recognition)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

/// Chat behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatConfig {
    /// Whether spoken replies are enabled at startup. Can be toggled at
    /// runtime with Ctrl-T; the toggle is not written back to this file.
    #[serde(default)]
    pub voice_response: bool,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvoConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ConvoConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit path.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config_content = fs::read_to_string(path)?;
        let config: ConvoConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to an explicit path.
    ///
    /// # Errors
    /// - If the file cannot be written
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Retrieves the path to the config file, creating the parent directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    let config_path = home.join(".config").join("convo").join("convo.toml");

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }

    Ok(config_path)
}

/// Writes the default configuration file if none exists yet.
///
/// Called once at startup so users always have a file to edit with
/// `convo config`. An existing file is never touched.
///
/// # Errors
/// - If the config directory cannot be determined or created
/// - If the default file cannot be written
pub fn ensure_config_exists() -> anyhow::Result<()> {
    let config_path = get_config_path()?;

    if config_path.exists() {
        return Ok(());
    }

    ConvoConfig::default().save_to(&config_path)?;
    tracing::info!("Default configuration written to {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ConvoConfig::default();
        assert_eq!(config.server.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.audio.sample_rate, 16000);
        assert!(!config.chat.voice_response);
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("convo.toml");

        let mut config = ConvoConfig::default();
        config.server.base_url = "http://example.com:8080".to_string();
        config.chat.voice_response = true;
        config.save_to(&path).unwrap();

        let loaded = ConvoConfig::load_from(&path).unwrap();
        assert_eq!(loaded.server.base_url, "http://example.com:8080");
        assert!(loaded.chat.voice_response);
        assert_eq!(loaded.audio.sample_rate, 16000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ConvoConfig = toml::from_str(
            r#"
            [server]
            base_url = "http://10.0.0.2:5000"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "http://10.0.0.2:5000");
        assert_eq!(config.audio.device, "default");
        assert!(!config.chat.voice_response);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(toml::from_str::<ConvoConfig>("server = 42").is_err());
    }
}
