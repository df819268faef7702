//! Application command handlers for convo.
//!
//! This module organizes command handling into separate submodules, each responsible for a specific
//! application command.
//!
//! # Commands
//! - `chat`: Interactive chat session (default)
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod chat;
pub mod config;
pub mod list_devices;
pub mod logs;

pub use chat::handle_chat;
pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
