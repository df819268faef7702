//! Configuration management for convo.
//!
//! This module handles loading and saving application configuration from TOML
//! files. Configuration is stored in the user's config directory; a default
//! file is written on first run.

pub mod file;

pub use file::{ensure_config_exists, get_config_path, ConvoConfig};
