//! MCP Tool Executor
//!
//! Executes tools by forwarding commands to the Godot editor over the
//! bridge and formatting the replies as text.

use serde::Deserialize;
use serde_json::{Value, json};

use super::tools::get_tool_by_name;
use super::types::ToolResult;
use crate::bridge::{GodotConnection, commands};

#[derive(Debug, Deserialize)]
struct GetScriptParams {
    path: String,
}

#[derive(Debug, Deserialize)]
struct CreateScriptParams {
    script_path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ListProjectFilesParams {
    #[serde(default)]
    extensions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateNodeTransformParams {
    node_path: String,
    position: Option<[f64; 2]>,
    rotation: Option<f64>,
    scale: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct AiGenerateScriptParams {
    description: String,
    node_type: Option<String>,
    #[serde(default)]
    create_file: bool,
    #[serde(default)]
    file_path: String,
}

/// Execute a tool by name
pub async fn execute_tool(
    conn: &GodotConnection,
    tool_name: &str,
    args: Value,
) -> Result<ToolResult, String> {
    let _tool = get_tool_by_name(tool_name)
        .ok_or_else(|| format!("Tool not found: {tool_name}"))?;

    tracing::debug!("executing tool {tool_name} with args {args}");

    match tool_name {
        "get_full_scene_tree" => get_full_scene_tree(conn).await,
        "get_current_scene_structure" => get_current_scene_structure(conn).await,
        "get_debug_output" => get_debug_output(conn).await,
        "update_node_transform" => update_node_transform(conn, parse_params(args)?).await,
        "get_script" => get_script(conn, parse_params(args)?).await,
        "create_script" => create_script(conn, parse_params(args)?).await,
        "ai_generate_script" => ai_generate_script(conn, parse_params(args)?).await,
        "list_project_files" => list_project_files(conn, parse_params(args)?).await,
        other => Err(format!("Tool not implemented: {other}")),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("Invalid params: {e}"))
}

fn text_result(text: impl Into<String>) -> Result<ToolResult, String> {
    Ok(ToolResult::success(Value::String(text.into())))
}

async fn get_full_scene_tree(conn: &GodotConnection) -> Result<ToolResult, String> {
    match conn.send_command(commands::GET_FULL_SCENE_TREE, json!({})).await {
        Ok(result) => {
            if result.as_object().is_none_or(|root| root.is_empty()) {
                return text_result("No scene is currently open or the scene is empty.");
            }
            text_result(format!("Scene Tree:\n{}", format_scene_node(&result, 0)))
        }
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

/// Render a scene node and its children as an indented tree
fn format_scene_node(node: &Value, depth: usize) -> String {
    let indent = "  ".repeat(depth);
    let name = node.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or("Node");
    let mut output = format!("{indent}{name} ({node_type})");

    if let Some(children) = node.get("children").and_then(Value::as_array) {
        for child in children {
            output.push('\n');
            output.push_str(&format_scene_node(child, depth + 1));
        }
    }

    output
}

async fn get_current_scene_structure(conn: &GodotConnection) -> Result<ToolResult, String> {
    match conn
        .send_command(commands::GET_CURRENT_SCENE_STRUCTURE, json!({}))
        .await
    {
        Ok(result) => {
            let Some(path) = result.get("path").and_then(Value::as_str) else {
                return text_result("No scene is currently open.");
            };
            let root_name = result
                .get("root_node_name")
                .and_then(Value::as_str)
                .unwrap_or("<unknown>");
            let root_type = result
                .get("root_node_type")
                .and_then(Value::as_str)
                .unwrap_or("Node");
            text_result(format!(
                "Current Scene: {path}\nRoot Node: {root_name} ({root_type})"
            ))
        }
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn get_debug_output(conn: &GodotConnection) -> Result<ToolResult, String> {
    match conn.send_command(commands::GET_DEBUG_OUTPUT, json!({})).await {
        Ok(result) => {
            let output = result.get("output").and_then(Value::as_str).unwrap_or("");
            if output.is_empty() {
                return text_result("No debug output available.");
            }
            text_result(format!("Debug Output:\n{output}"))
        }
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn update_node_transform(
    conn: &GodotConnection,
    params: UpdateNodeTransformParams,
) -> Result<ToolResult, String> {
    let mut updates = serde_json::Map::new();
    let mut changes = Vec::new();

    if let Some([x, y]) = params.position {
        updates.insert("position".to_string(), json!({ "x": x, "y": y }));
        changes.push(format!("position to ({x}, {y})"));
    }
    if let Some(rotation) = params.rotation {
        updates.insert("rotation".to_string(), json!(rotation));
        changes.push(format!("rotation to {rotation:.2} rad"));
    }
    if let Some([x, y]) = params.scale {
        updates.insert("scale".to_string(), json!({ "x": x, "y": y }));
        changes.push(format!("scale to ({x}, {y})"));
    }
    if changes.is_empty() {
        return Err("Invalid params: nothing to update".to_string());
    }

    let command_params = json!({
        "node_path": params.node_path,
        "property": "_transform",
        "value": Value::Object(updates),
    });

    match conn
        .send_command(commands::UPDATE_NODE_PROPERTY, command_params)
        .await
    {
        Ok(_) => text_result(format!(
            "Updated {} for node at {}",
            changes.join(", "),
            params.node_path
        )),
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn get_script(conn: &GodotConnection, params: GetScriptParams) -> Result<ToolResult, String> {
    match conn
        .send_command(commands::GET_SCRIPT, json!({ "path": params.path }))
        .await
    {
        Ok(result) => {
            let content = result.get("content").and_then(Value::as_str).unwrap_or("");
            text_result(content)
        }
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn create_script(
    conn: &GodotConnection,
    params: CreateScriptParams,
) -> Result<ToolResult, String> {
    let command_params = json!({
        "script_path": params.script_path,
        "content": params.content,
    });
    match conn.send_command(commands::CREATE_SCRIPT, command_params).await {
        Ok(_) => text_result(format!("Created script at {}", params.script_path)),
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn ai_generate_script(
    conn: &GodotConnection,
    params: AiGenerateScriptParams,
) -> Result<ToolResult, String> {
    let command_params = json!({
        "description": params.description,
        "node_type": params.node_type.as_deref().unwrap_or("Node"),
        "create_file": params.create_file,
        "file_path": params.file_path,
    });

    match conn
        .send_command(commands::AI_GENERATE_SCRIPT, command_params)
        .await
    {
        Ok(result) => {
            let content = result.get("content").and_then(Value::as_str).unwrap_or("");
            let saved = params.create_file
                && !params.file_path.is_empty()
                && result.get("success").and_then(Value::as_bool).unwrap_or(false);
            let text = if saved {
                format!(
                    "Generated script based on \"{}\" and saved to {}:\n\n```gdscript\n{content}\n```",
                    params.description, params.file_path
                )
            } else {
                format!(
                    "Generated script based on \"{}\":\n\n```gdscript\n{content}\n```",
                    params.description
                )
            };
            text_result(text)
        }
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}

async fn list_project_files(
    conn: &GodotConnection,
    params: ListProjectFilesParams,
) -> Result<ToolResult, String> {
    match conn
        .send_command(
            commands::LIST_PROJECT_FILES,
            json!({ "extensions": params.extensions }),
        )
        .await
    {
        Ok(result) => Ok(ToolResult::success(result)),
        Err(e) => Ok(ToolResult::error(e.to_string())),
    }
}
