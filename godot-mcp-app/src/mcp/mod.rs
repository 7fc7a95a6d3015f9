//! MCP (Model Context Protocol) Server
//!
//! Exposes Godot editor capabilities via MCP for Claude Code and other
//! AI agents.
//!
//! Tools exposed:
//! - get_full_scene_tree / get_current_scene_structure: Scene inspection
//! - get_script / create_script / ai_generate_script: Script editing
//! - update_node_transform: Node manipulation
//! - list_project_files: Asset listing
//! - get_debug_output: Editor log access
//!
//! Resources exposed under `godot/`: script content and listings, asset
//! listings by type, and the debug log.

mod executor;
mod resources;
mod server;
mod tools;
mod types;

pub use server::start_mcp_server;
pub use types::ToolResult;
