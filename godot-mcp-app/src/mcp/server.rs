//! MCP HTTP Server
//!
//! HTTP server for the MCP protocol on port 9090+.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use super::executor::execute_tool;
use super::resources::{get_all_resources, read_resource};
use super::tools::get_all_tools;
use super::types::*;
use crate::bridge::GodotConnection;

const MCP_HTTP_BASE_PORT: u16 = 9090;
const MCP_HTTP_PORT_ATTEMPTS: u16 = 10;

/// Start the MCP HTTP server, returning the bound port
pub async fn start_mcp_server(conn: Arc<GodotConnection>) -> Result<u16, String> {
    // Find an available port
    let mut listener: Option<TcpListener> = None;
    let mut bound_port: u16 = 0;

    for offset in 0..MCP_HTTP_PORT_ATTEMPTS {
        let port = MCP_HTTP_BASE_PORT + offset;
        match TcpListener::bind(format!("127.0.0.1:{port}")).await {
            Ok(l) => {
                listener = Some(l);
                bound_port = port;
                break;
            }
            Err(e) => {
                tracing::debug!("port {port} unavailable: {e}");
            }
        }
    }

    let listener = listener.ok_or_else(|| {
        format!(
            "Failed to bind MCP server to any port in range {}-{}",
            MCP_HTTP_BASE_PORT,
            MCP_HTTP_BASE_PORT + MCP_HTTP_PORT_ATTEMPTS - 1
        )
    })?;

    tracing::info!("MCP server starting on port {bound_port}");
    tokio::spawn(accept_loop(listener, conn));

    Ok(bound_port)
}

async fn accept_loop(listener: TcpListener, conn: Arc<GodotConnection>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tracing::debug!("connection from {addr}");
                let conn = Arc::clone(&conn);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, conn).await {
                        tracing::debug!("connection error: {e}");
                    }
                });
            }
            Err(e) => {
                tracing::error!("accept error: {e}");
            }
        }
    }
}

/// Handle an HTTP connection
async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    conn: Arc<GodotConnection>,
) -> Result<(), String> {
    let (reader, mut writer) = stream.split();
    let mut buf_reader = BufReader::new(reader);

    // Read HTTP request line
    let mut request_line = String::new();
    buf_reader
        .read_line(&mut request_line)
        .await
        .map_err(|e| e.to_string())?;

    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() < 2 {
        return send_text_response(&mut writer, 400, "Bad Request").await;
    }

    let method = parts[0];
    let path = parts[1];

    // Read headers
    let mut content_length: usize = 0;
    loop {
        let mut header_line = String::new();
        buf_reader
            .read_line(&mut header_line)
            .await
            .map_err(|e| e.to_string())?;
        if header_line.trim().is_empty() {
            break;
        }
        if header_line.to_lowercase().starts_with("content-length:") {
            if let Some(len_str) = header_line.split(':').nth(1) {
                content_length = len_str.trim().parse().unwrap_or(0);
            }
        }
    }

    // Read body if present
    let body = if content_length > 0 {
        let mut body_buf = vec![0u8; content_length];
        tokio::io::AsyncReadExt::read_exact(&mut buf_reader, &mut body_buf)
            .await
            .map_err(|e| e.to_string())?;
        String::from_utf8(body_buf).unwrap_or_default()
    } else {
        String::new()
    };

    // Route request
    match (method, path) {
        ("POST", "/mcp") | ("POST", "/mcp/") => {
            handle_mcp_request(&mut writer, &body, &conn).await
        }
        ("GET", "/health") | ("GET", "/health/") => {
            let status = json!({
                "status": "ok",
                "godot_connected": conn.is_connected(),
            });
            send_json_response(&mut writer, 200, &status).await
        }
        _ => send_text_response(&mut writer, 404, "Not Found").await,
    }
}

/// Handle an MCP JSON-RPC request
async fn handle_mcp_request(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    body: &str,
    conn: &GodotConnection,
) -> Result<(), String> {
    let request: JsonRpcRequest = match serde_json::from_str(body) {
        Ok(req) => req,
        Err(e) => {
            let response =
                JsonRpcResponse::error(JsonRpcId::Null, PARSE_ERROR, format!("Parse error: {e}"));
            return send_json_response(writer, 200, &serde_json::to_value(response).unwrap())
                .await;
        }
    };

    tracing::debug!("method: {}", request.method);

    // Notifications have no id - acknowledge silently
    if request.id.is_none() {
        return send_json_response(writer, 202, &json!({})).await;
    }

    let id = request.id.unwrap_or(JsonRpcId::Null);

    let response = match request.method.as_str() {
        "initialize" => handle_initialize(id),
        "tools/list" => handle_tools_list(id),
        "tools/call" => handle_tools_call(id, request.params, conn).await,
        "resources/list" => handle_resources_list(id),
        "resources/read" => handle_resources_read(id, request.params, conn).await,
        "ping" => JsonRpcResponse::success(id, json!({ "pong": true })),
        _ => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Method not found: {}", request.method),
        ),
    };

    send_json_response(writer, 200, &serde_json::to_value(response).unwrap()).await
}

fn handle_initialize(id: JsonRpcId) -> JsonRpcResponse {
    let result = InitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(false),
                list_changed: Some(false),
            }),
        },
        server_info: ServerInfo {
            name: SERVER_NAME.to_string(),
            version: SERVER_VERSION.to_string(),
        },
    };

    JsonRpcResponse::success(id, serde_json::to_value(result).unwrap())
}

fn handle_tools_list(id: JsonRpcId) -> JsonRpcResponse {
    let tools = get_all_tools();
    JsonRpcResponse::success(id, json!({ "tools": tools }))
}

fn handle_resources_list(id: JsonRpcId) -> JsonRpcResponse {
    let resources = get_all_resources();
    JsonRpcResponse::success(id, json!({ "resources": resources }))
}

async fn handle_tools_call(
    id: JsonRpcId,
    params: Option<Value>,
    conn: &GodotConnection,
) -> JsonRpcResponse {
    let params: ToolCallParams = match params {
        Some(p) => match serde_json::from_value(p) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}"));
            }
        },
        None => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params");
        }
    };

    let args = params.arguments.unwrap_or(json!({}));
    let result = execute_tool(conn, &params.name, args).await;

    match result {
        Ok(tool_result) => {
            let content = if tool_result.success {
                match tool_result.result {
                    Value::String(text) => text,
                    other => serde_json::to_string_pretty(&other).unwrap_or_default(),
                }
            } else {
                tool_result
                    .error
                    .unwrap_or_else(|| "Unknown error".to_string())
            };

            let call_result = ToolCallResult {
                content: vec![ToolContent {
                    content_type: "text".to_string(),
                    text: content,
                }],
                is_error: if tool_result.success { None } else { Some(true) },
            };

            JsonRpcResponse::success(id, serde_json::to_value(call_result).unwrap())
        }
        Err(e) => {
            tracing::error!("tool execution error: {e}");
            let call_result = ToolCallResult {
                content: vec![ToolContent {
                    content_type: "text".to_string(),
                    text: e,
                }],
                is_error: Some(true),
            };

            JsonRpcResponse::success(id, serde_json::to_value(call_result).unwrap())
        }
    }
}

async fn handle_resources_read(
    id: JsonRpcId,
    params: Option<Value>,
    conn: &GodotConnection,
) -> JsonRpcResponse {
    let params: ResourceReadParams = match params {
        Some(p) => match serde_json::from_value(p) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}"));
            }
        },
        None => {
            return JsonRpcResponse::error(id, INVALID_PARAMS, "Missing params");
        }
    };

    match read_resource(conn, &params.uri).await {
        Ok(contents) => {
            JsonRpcResponse::success(id, json!({ "contents": [contents] }))
        }
        Err(e) => {
            tracing::error!("resource read error: {e}");
            JsonRpcResponse::error(id, INTERNAL_ERROR, e)
        }
    }
}

/// Send a plain text HTTP response
async fn send_text_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status: u16,
    body: &str,
) -> Result<(), String> {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );

    writer
        .write_all(response.as_bytes())
        .await
        .map_err(|e| e.to_string())?;
    writer.flush().await.map_err(|e| e.to_string())?;
    Ok(())
}

/// Send a JSON HTTP response
async fn send_json_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status: u16,
    body: &Value,
) -> Result<(), String> {
    let body_str = serde_json::to_string(body).unwrap_or_default();

    let status_text = match status {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body_str.len(),
        body_str
    );

    writer
        .write_all(response.as_bytes())
        .await
        .map_err(|e| e.to_string())?;
    writer.flush().await.map_err(|e| e.to_string())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio_tungstenite::tungstenite::Message;

    use crate::bridge::GodotReply;

    /// Fake editor that answers every command with a success reply
    /// echoing the requested script path as content.
    async fn spawn_fake_editor() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    while let Some(Ok(Message::Text(text))) = read.next().await {
                        let command: Value = serde_json::from_str(text.as_str()).unwrap();
                        let reply = GodotReply {
                            status: crate::bridge::ReplyStatus::Success,
                            result: Some(json!({
                                "content": format!("extends Node # {}", command["params"]["path"]),
                            })),
                            message: None,
                            command_id: command["commandId"].as_str().map(str::to_string),
                        };
                        let frame = serde_json::to_string(&reply).unwrap();
                        if write.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    /// Issue one HTTP request against the server and return the raw response
    async fn http_request(addr: std::net::SocketAddr, request: String) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    fn post_mcp(body: &str) -> String {
        format!(
            "POST /mcp HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let editor_url = spawn_fake_editor().await;
        let conn = Arc::new(GodotConnection::new(
            editor_url.as_str(),
            Duration::from_millis(2_000),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(accept_loop(listener, conn));

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {
                "name": "get_script",
                "arguments": { "path": "res://player.gd" },
            },
        })
        .to_string();

        let response = http_request(addr, post_mcp(&body)).await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("res://player.gd"));
        assert!(!response.contains("isError"));
    }

    #[tokio::test]
    async fn test_health_and_unknown_method() {
        let conn = Arc::new(GodotConnection::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(accept_loop(listener, conn));

        let health = http_request(
            addr,
            "GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n".to_string(),
        )
        .await;
        assert!(health.starts_with("HTTP/1.1 200"));
        assert!(health.contains("\"godot_connected\":false"));

        let body = json!({
            "jsonrpc": "2.0",
            "id": 2,
            "method": "bogus/method",
        })
        .to_string();
        let response = http_request(addr, post_mcp(&body)).await;
        assert!(response.contains(&METHOD_NOT_FOUND.to_string()));
    }

    #[tokio::test]
    async fn test_tools_list_contains_catalogue() {
        let conn = Arc::new(GodotConnection::default());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(accept_loop(listener, conn));

        let body = json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/list" }).to_string();
        let response = http_request(addr, post_mcp(&body)).await;
        assert!(response.contains("get_full_scene_tree"));
        assert!(response.contains("ai_generate_script"));
    }
}
