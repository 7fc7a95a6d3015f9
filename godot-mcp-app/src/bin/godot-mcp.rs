pub fn main() {
    godot_mcp_app::app::launch()
}
