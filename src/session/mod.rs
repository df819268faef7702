//! Chat session management.
//!
//! The session client owns the session identifier and mediates every outbound
//! turn and its response: transcript updates, the typing indicator, and
//! optional playback of synthesized replies.

pub mod client;

pub use client::SessionClient;
