//! MCP Resource Definitions
//!
//! Read-only views over the Godot project: script content and listings,
//! asset listings by type, and the editor debug log.

use serde_json::{Value, json};

use super::types::{McpResource, ResourceContents};
use crate::bridge::{GodotConnection, commands};

/// Script shown by the `godot/script` and `godot/script/metadata` resources
const DEFAULT_SCRIPT_PATH: &str = "res://default_script.gd";

/// Asset categories served under `godot/assets/{type}`
const ASSET_TYPES: &[(&str, &[&str])] = &[
    ("images", &[".png", ".jpg", ".jpeg", ".webp", ".svg", ".bmp", ".tga"]),
    ("audio", &[".ogg", ".mp3", ".wav", ".opus"]),
    ("fonts", &[".ttf", ".otf", ".fnt", ".font"]),
    ("models", &[".glb", ".gltf", ".obj", ".fbx"]),
    ("shaders", &[".gdshader", ".shader"]),
    ("resources", &[".tres", ".res", ".theme", ".material"]),
    ("all", &[]),
];

/// Get all available MCP resources
pub fn get_all_resources() -> Vec<McpResource> {
    let mut resources = vec![
        McpResource {
            uri: "godot/script".to_string(),
            name: "Script Content".to_string(),
            mime_type: "text/plain".to_string(),
            description: Some("Content of the project's default script.".to_string()),
        },
        McpResource {
            uri: "godot/scripts".to_string(),
            name: "Script List".to_string(),
            mime_type: "application/json".to_string(),
            description: Some("All GDScript and C# scripts in the project.".to_string()),
        },
        McpResource {
            uri: "godot/script/metadata".to_string(),
            name: "Script Metadata".to_string(),
            mime_type: "application/json".to_string(),
            description: None,
        },
        McpResource {
            uri: "godot/debug/log".to_string(),
            name: "Godot Debug Output".to_string(),
            mime_type: "text/plain".to_string(),
            description: Some("The editor's debug output log.".to_string()),
        },
    ];

    for (asset_type, _) in ASSET_TYPES {
        resources.push(McpResource {
            uri: format!("godot/assets/{asset_type}"),
            name: format!("Assets: {asset_type}"),
            mime_type: "application/json".to_string(),
            description: None,
        });
    }

    resources
}

/// Extensions for an asset category, if the category exists
fn asset_extensions(asset_type: &str) -> Option<&'static [&'static str]> {
    ASSET_TYPES
        .iter()
        .find(|(name, _)| *name == asset_type)
        .map(|(_, extensions)| *extensions)
}

/// Read a resource by URI
pub async fn read_resource(
    conn: &GodotConnection,
    uri: &str,
) -> Result<ResourceContents, String> {
    match uri {
        "godot/script" => {
            let result = conn
                .send_command(commands::GET_SCRIPT, json!({ "path": DEFAULT_SCRIPT_PATH }))
                .await
                .map_err(|e| e.to_string())?;
            let content = result.get("content").and_then(Value::as_str).unwrap_or("");
            Ok(text_contents(uri, content.to_string()))
        }

        "godot/scripts" => {
            let result = conn
                .send_command(
                    commands::LIST_PROJECT_FILES,
                    json!({ "extensions": [".gd", ".cs"] }),
                )
                .await
                .map_err(|e| e.to_string())?;
            let files: Vec<String> = result
                .get("files")
                .and_then(Value::as_array)
                .map(|files| {
                    files
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let gdscripts: Vec<&String> =
                files.iter().filter(|f| f.ends_with(".gd")).collect();
            let csharp_scripts: Vec<&String> =
                files.iter().filter(|f| f.ends_with(".cs")).collect();
            Ok(json_contents(
                uri,
                &json!({
                    "scripts": files,
                    "count": files.len(),
                    "gdscripts": gdscripts,
                    "csharp_scripts": csharp_scripts,
                }),
            ))
        }

        "godot/script/metadata" => {
            let result = conn
                .send_command(
                    commands::GET_SCRIPT_METADATA,
                    json!({ "path": DEFAULT_SCRIPT_PATH }),
                )
                .await
                .map_err(|e| e.to_string())?;
            Ok(json_contents(uri, &result))
        }

        "godot/debug/log" => {
            let result = conn
                .send_command(commands::GET_DEBUG_OUTPUT, json!({}))
                .await
                .map_err(|e| e.to_string())?;
            let output = result.get("output").and_then(Value::as_str).unwrap_or("");
            let text = if output.is_empty() {
                "No debug output available.".to_string()
            } else {
                output.to_string()
            };
            Ok(text_contents(uri, text))
        }

        _ => {
            if let Some(asset_type) = uri.strip_prefix("godot/assets/") {
                let extensions = asset_extensions(asset_type)
                    .ok_or_else(|| format!("Unknown asset type: {asset_type}"))?;
                let result = conn
                    .send_command(
                        commands::LIST_PROJECT_FILES,
                        json!({ "extensions": extensions }),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                let files = result
                    .get("files")
                    .cloned()
                    .unwrap_or_else(|| json!([]));
                let count = files.as_array().map_or(0, Vec::len);
                return Ok(json_contents(
                    uri,
                    &json!({
                        "assetType": asset_type,
                        "extensions": extensions,
                        "count": count,
                        "files": files,
                    }),
                ));
            }
            Err(format!("Unknown resource: {uri}"))
        }
    }
}

fn text_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents {
        uri: uri.to_string(),
        mime_type: "text/plain".to_string(),
        text,
    }
}

fn json_contents(uri: &str, value: &Value) -> ResourceContents {
    ResourceContents {
        uri: uri.to_string(),
        mime_type: "application/json".to_string(),
        text: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_extensions() {
        assert!(asset_extensions("images").unwrap().contains(&".png"));
        assert_eq!(asset_extensions("all"), Some(&[] as &[&str]));
        assert!(asset_extensions("videos").is_none());
    }

    #[test]
    fn test_resource_catalogue_covers_asset_types() {
        let resources = get_all_resources();
        for (asset_type, _) in ASSET_TYPES {
            let uri = format!("godot/assets/{asset_type}");
            assert!(
                resources.iter().any(|r| r.uri == uri),
                "missing resource {uri}"
            );
        }
        assert!(resources.iter().any(|r| r.uri == "godot/debug/log"));
    }
}
