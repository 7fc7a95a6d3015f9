//! Types for the Godot editor bridge
//!
//! This module defines the data structures for WebSocket communication
//! between the MCP server and the Godot editor plugin.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default WebSocket address of the Godot editor plugin
pub const DEFAULT_GODOT_URL: &str = "ws://127.0.0.1:9080";

/// Default per-command timeout in milliseconds
///
/// Also bounds the connect handshake.
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 10_000;

/// Bridge connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No channel to the editor exists
    #[default]
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// The WebSocket channel is open
    Connected,
}

/// Command sent from the MCP server to the Godot editor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GodotCommand {
    /// Command name (e.g., "get_script", "list_project_files")
    #[serde(rename = "type")]
    pub command: String,
    /// Command parameters as a JSON object
    pub params: Value,
    /// Unique correlation token for matching the reply
    pub command_id: String,
}

/// Reply status reported by the Godot editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Reply from the Godot editor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GodotReply {
    /// Whether the command succeeded on the editor side
    pub status: ReplyStatus,
    /// Result payload (success replies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error description (error replies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Correlation token of the originating command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
}

/// Command names understood by the Godot editor plugin
pub mod commands {
    /// Read a script's source
    pub const GET_SCRIPT: &str = "get_script";
    /// Read a script's metadata
    pub const GET_SCRIPT_METADATA: &str = "get_script_metadata";
    /// List project files, optionally filtered by extension
    pub const LIST_PROJECT_FILES: &str = "list_project_files";
    /// Full scene tree of the currently open scene
    pub const GET_FULL_SCENE_TREE: &str = "get_full_scene_tree";
    /// Summary of the currently open scene
    pub const GET_CURRENT_SCENE_STRUCTURE: &str = "get_current_scene_structure";
    /// Editor debug output log
    pub const GET_DEBUG_OUTPUT: &str = "get_debug_output";
    /// Create a new script file
    pub const CREATE_SCRIPT: &str = "create_script";
    /// Update a property on a scene node
    pub const UPDATE_NODE_PROPERTY: &str = "update_node_property";
    /// Generate a script from a description
    pub const AI_GENERATE_SCRIPT: &str = "ai_generate_script";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_wire_format() {
        let command = GodotCommand {
            command: "get_script".to_string(),
            params: json!({ "path": "res://player.gd" }),
            command_id: "cmd_0".to_string(),
        };

        let frame: Value = serde_json::to_value(&command).unwrap();
        assert_eq!(frame["type"], "get_script");
        assert_eq!(frame["params"]["path"], "res://player.gd");
        assert_eq!(frame["commandId"], "cmd_0");
    }

    #[test]
    fn test_reply_parsing() {
        let success: GodotReply = serde_json::from_str(
            r#"{"status":"success","result":{"content":"x"},"commandId":"cmd_0"}"#,
        )
        .unwrap();
        assert_eq!(success.status, ReplyStatus::Success);
        assert_eq!(success.result, Some(json!({ "content": "x" })));
        assert_eq!(success.command_id.as_deref(), Some("cmd_0"));

        let error: GodotReply =
            serde_json::from_str(r#"{"status":"error","message":"no such node","commandId":"cmd_1"}"#)
                .unwrap();
        assert_eq!(error.status, ReplyStatus::Error);
        assert_eq!(error.message.as_deref(), Some("no such node"));
    }

    #[test]
    fn test_reply_without_command_id() {
        let reply: GodotReply = serde_json::from_str(r#"{"status":"success"}"#).unwrap();
        assert!(reply.command_id.is_none());
        assert!(reply.result.is_none());
    }
}
