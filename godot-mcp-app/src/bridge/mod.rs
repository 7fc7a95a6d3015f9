//! Godot Editor Bridge Module
//!
//! This module provides the persistent WebSocket connection between the
//! MCP server and the Godot editor plugin. Many concurrent tool calls
//! are multiplexed over the one physical channel; each carries a
//! correlation token that pairs it with its eventual reply.
//!
//! ## Architecture
//!
//! ```text
//! Tool / resource handlers --send_command--> GodotConnection
//!                                                 |
//!                                        correlation table
//!                                                 |
//!                                   WebSocket ws://127.0.0.1:9080
//!                                                 |
//!                                     Godot editor plugin (GDScript)
//! ```
//!
//! ## Modules
//!
//! - [`types`]: Wire types and command names for the bridge protocol
//! - [`connection`]: Connection lifecycle, correlation and dispatch

mod connection;
mod types;

// Re-export public API
pub use connection::{
    BridgeError,
    GodotConnection,
};

pub use types::{
    ConnectionStatus,
    GodotCommand,
    GodotReply,
    ReplyStatus,
    DEFAULT_COMMAND_TIMEOUT_MS,
    DEFAULT_GODOT_URL,
    commands,
};
