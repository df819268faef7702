//! Interactive chat screen.
//!
//! Terminal rendering and input handling for the chat workflow.

pub mod ui;

pub use ui::{ChatCommand, ChatTui};
