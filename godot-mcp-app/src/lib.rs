//! godot-mcp application library
//!
//! An MCP server that exposes the Godot editor's capabilities (scene
//! graph inspection, script editing, asset listing, debug output) to
//! AI-assistant clients. Tool and resource handlers forward named
//! commands to the editor through the [`bridge`] connection layer.

pub mod app;
pub mod bridge;
pub mod mcp;
