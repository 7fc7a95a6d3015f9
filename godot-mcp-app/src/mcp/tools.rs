//! MCP Tool Definitions
//!
//! Godot scene/script/asset tools exposed via MCP.

use serde_json::json;
use super::types::McpTool;

/// Get all available MCP tools
pub fn get_all_tools() -> Vec<McpTool> {
    vec![
        // =================================================================
        // Scene inspection
        // =================================================================
        McpTool {
            name: "get_full_scene_tree".to_string(),
            description: "Get the complete node hierarchy of the currently open scene.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        McpTool {
            name: "get_current_scene_structure".to_string(),
            description: "Get the path and root node of the currently open scene.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        McpTool {
            name: "get_debug_output".to_string(),
            description: "Get the debug output log from the Godot editor.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        McpTool {
            name: "update_node_transform".to_string(),
            description: "Update position, rotation, or scale of a node in the current scene.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "node_path": {
                        "type": "string",
                        "description": "Path to the node to update (e.g. '/root/MainScene/Player')."
                    },
                    "position": {
                        "type": "array",
                        "items": { "type": "number" },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "New position as [x, y]."
                    },
                    "rotation": {
                        "type": "number",
                        "description": "New rotation in radians."
                    },
                    "scale": {
                        "type": "array",
                        "items": { "type": "number" },
                        "minItems": 2,
                        "maxItems": 2,
                        "description": "New scale as [x, y]."
                    }
                },
                "required": ["node_path"]
            }),
        },
        // =================================================================
        // Scripts
        // =================================================================
        McpTool {
            name: "get_script".to_string(),
            description: "Read the source of a script in the project.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Script path (e.g. 'res://player.gd')."
                    }
                },
                "required": ["path"]
            }),
        },
        McpTool {
            name: "create_script".to_string(),
            description: "Create a new script file in the project.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "script_path": {
                        "type": "string",
                        "description": "Where to create the script (e.g. 'res://enemy.gd')."
                    },
                    "content": {
                        "type": "string",
                        "description": "Script source to write."
                    }
                },
                "required": ["script_path", "content"]
            }),
        },
        McpTool {
            name: "ai_generate_script".to_string(),
            description: "Generate a GDScript from a natural language description.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "description": {
                        "type": "string",
                        "description": "What the script should do (e.g. 'A player controller for a 2D platformer')."
                    },
                    "node_type": {
                        "type": "string",
                        "description": "The node type this script is for (e.g. 'CharacterBody2D'). Default: 'Node'."
                    },
                    "create_file": {
                        "type": "boolean",
                        "description": "Whether to save the generated script as a new file."
                    },
                    "file_path": {
                        "type": "string",
                        "description": "Where to save the script (only used if create_file is true)."
                    }
                },
                "required": ["description"]
            }),
        },
        // =================================================================
        // Assets
        // =================================================================
        McpTool {
            name: "list_project_files".to_string(),
            description: "List project files, optionally filtered by extension.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "extensions": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Extensions to match (e.g. ['.gd', '.tscn']). Empty lists everything."
                    }
                }
            }),
        },
    ]
}

/// Get a tool by name
pub fn get_tool_by_name(name: &str) -> Option<McpTool> {
    get_all_tools().into_iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_lookup() {
        assert!(get_tool_by_name("get_script").is_some());
        assert!(get_tool_by_name("update_node_transform").is_some());
        assert!(get_tool_by_name("no_such_tool").is_none());
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in get_all_tools() {
            assert_eq!(
                tool.input_schema["type"], "object",
                "schema for {} is not an object",
                tool.name
            );
        }
    }
}
