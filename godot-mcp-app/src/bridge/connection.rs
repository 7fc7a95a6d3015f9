//! Godot editor connection
//!
//! Maintains a single WebSocket channel to the Godot editor plugin and
//! correlates command replies to their originating calls. The connection
//! is established lazily on the first command and re-established on
//! demand after a close.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::types::{
    ConnectionStatus, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_GODOT_URL, GodotCommand, GodotReply,
    ReplyStatus,
};

/// Errors surfaced by the bridge
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// The connect attempt failed at the transport level
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    /// The connect attempt exceeded the configured timeout
    #[error("connection timeout")]
    ConnectTimeout,
    /// No reply arrived before the per-command deadline
    #[error("command timed out: {command}")]
    Timeout { command: String },
    /// The channel closed while the command was pending
    #[error("connection closed")]
    ConnectionClosed,
    /// A send was attempted while no channel is live
    #[error("not connected to the Godot editor")]
    NotConnected,
    /// The editor reported an error reply
    #[error("{0}")]
    Editor(String),
    /// The outbound command could not be serialized
    #[error("failed to encode command: {0}")]
    Encode(String),
}

/// Command awaiting its reply
struct PendingCommand {
    /// Command name, carried for the timeout diagnostic
    command: String,
    tx: oneshot::Sender<Result<Value, BridgeError>>,
}

enum ChannelState {
    Disconnected,
    Connecting {
        /// Identifies the in-flight attempt so a superseded connect
        /// cannot install a stale channel
        attempt: u64,
        notify: broadcast::Sender<Result<(), BridgeError>>,
    },
    Connected {
        sender: mpsc::Sender<Message>,
        /// Identifies the live channel so a stale reader task cannot
        /// tear down its successor
        generation: u64,
    },
}

struct Inner {
    url: String,
    timeout: Duration,
    state: Mutex<ChannelState>,
    pending: Mutex<HashMap<String, PendingCommand>>,
    next_command_id: AtomicU64,
    generation: AtomicU64,
}

/// Shared connection to the Godot editor
///
/// Cheap to clone; all clones share the same channel, correlation table
/// and command counter.
#[derive(Clone)]
pub struct GodotConnection {
    inner: Arc<Inner>,
}

impl GodotConnection {
    /// Create a connection that will dial `url` lazily on first use
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                timeout,
                state: Mutex::new(ChannelState::Disconnected),
                pending: Mutex::new(HashMap::new()),
                next_command_id: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Current lifecycle state of the channel
    pub fn status(&self) -> ConnectionStatus {
        match &*self.inner.state.lock() {
            ChannelState::Disconnected => ConnectionStatus::Disconnected,
            ChannelState::Connecting { .. } => ConnectionStatus::Connecting,
            ChannelState::Connected { .. } => ConnectionStatus::Connected,
        }
    }

    /// Check whether the editor channel is open
    pub fn is_connected(&self) -> bool {
        matches!(*self.inner.state.lock(), ChannelState::Connected { .. })
    }

    /// Open the channel if it is not open already
    ///
    /// Concurrent callers share a single physical connect attempt and
    /// all observe that attempt's outcome.
    pub async fn ensure_connected(&self) -> Result<(), BridgeError> {
        enum Step {
            Wait(broadcast::Receiver<Result<(), BridgeError>>),
            Open {
                attempt: u64,
                notify: broadcast::Sender<Result<(), BridgeError>>,
            },
        }

        loop {
            let step = {
                let mut state = self.inner.state.lock();
                match &*state {
                    ChannelState::Connected { .. } => return Ok(()),
                    ChannelState::Connecting { notify, .. } => Step::Wait(notify.subscribe()),
                    ChannelState::Disconnected => {
                        let attempt = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
                        let (notify, _) = broadcast::channel(1);
                        *state = ChannelState::Connecting {
                            attempt,
                            notify: notify.clone(),
                        };
                        Step::Open { attempt, notify }
                    }
                }
            };

            match step {
                Step::Wait(mut outcome) => match outcome.recv().await {
                    Ok(result) => return result,
                    // The opener went away without reporting; start over.
                    Err(_) => continue,
                },
                Step::Open { attempt, notify } => {
                    let outcome = self.open_channel(attempt).await;
                    if outcome.is_err() {
                        let mut state = self.inner.state.lock();
                        if matches!(&*state, ChannelState::Connecting { attempt: a, .. } if *a == attempt)
                        {
                            *state = ChannelState::Disconnected;
                        }
                    }
                    let _ = notify.send(outcome.clone());
                    return outcome;
                }
            }
        }
    }

    /// Dial the editor and install the channel tasks
    async fn open_channel(&self, attempt: u64) -> Result<(), BridgeError> {
        tracing::info!("connecting to Godot editor at {}", self.inner.url);

        let connect = connect_async(self.inner.url.as_str());
        let (ws, _) = tokio::time::timeout(self.inner.timeout, connect)
            .await
            .map_err(|_| BridgeError::ConnectTimeout)?
            .map_err(|e| BridgeError::Connect {
                url: self.inner.url.clone(),
                reason: e.to_string(),
            })?;

        let (mut write, mut read) = ws.split();
        let (sender, mut outbound) = mpsc::channel::<Message>(32);

        {
            let mut state = self.inner.state.lock();
            // A disconnect may have raced the handshake; if so, drop the
            // new socket instead of installing it.
            if !matches!(&*state, ChannelState::Connecting { attempt: a, .. } if *a == attempt) {
                tracing::debug!("connect attempt {attempt} superseded");
                return Err(BridgeError::ConnectionClosed);
            }
            *state = ChannelState::Connected {
                sender: sender.clone(),
                generation: attempt,
            };
        }

        tokio::spawn(async move {
            while let Some(msg) = outbound.recv().await {
                if write.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                match frame {
                    Ok(Message::Text(text)) => Self::handle_frame(&inner, text.as_str()),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("websocket error: {e}");
                        break;
                    }
                }
            }
            Self::teardown(&inner, attempt);
        });

        tracing::info!("connected to Godot editor");
        Ok(())
    }

    /// Send a command and wait for the correlated reply
    ///
    /// Produces exactly one outcome per call: the reply's result, the
    /// editor's error, a timeout, or a connection failure.
    pub async fn send_command(&self, command: &str, params: Value) -> Result<Value, BridgeError> {
        self.ensure_connected().await?;

        let id = self.inner.next_command_id.fetch_add(1, Ordering::Relaxed);
        let command_id = format!("cmd_{id}");
        let frame = serde_json::to_string(&GodotCommand {
            command: command.to_string(),
            params,
            command_id: command_id.clone(),
        })
        .map_err(|e| BridgeError::Encode(e.to_string()))?;

        let sender = match &*self.inner.state.lock() {
            ChannelState::Connected { sender, .. } => sender.clone(),
            _ => return Err(BridgeError::NotConnected),
        };

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(
            command_id.clone(),
            PendingCommand {
                command: command.to_string(),
                tx,
            },
        );

        tracing::debug!("sending {command} as {command_id}");
        if sender.send(Message::Text(frame.into())).await.is_err() {
            // The channel died between registration and send.  If teardown
            // already drained the entry, the oneshot carries the close error.
            if self.inner.pending.lock().remove(&command_id).is_some() {
                return Err(BridgeError::ConnectionClosed);
            }
        }

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(BridgeError::ConnectionClosed),
            Err(_) => {
                self.inner.pending.lock().remove(&command_id);
                Err(BridgeError::Timeout {
                    command: command.to_string(),
                })
            }
        }
    }

    /// Tear down the channel and fail everything in flight
    ///
    /// Idempotent; a later `send_command` reconnects lazily.
    pub fn disconnect(&self) {
        let previous =
            std::mem::replace(&mut *self.inner.state.lock(), ChannelState::Disconnected);
        if matches!(previous, ChannelState::Disconnected) {
            return;
        }
        // Dropping the Connected sender ends the writer task, which
        // closes the socket.
        drop(previous);
        Self::drain_pending(&self.inner, BridgeError::ConnectionClosed);
        tracing::info!("disconnected from Godot editor");
    }

    /// Route one inbound frame to its pending command
    fn handle_frame(inner: &Inner, text: &str) {
        let reply: GodotReply = match serde_json::from_str(text) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("dropping malformed reply frame: {e}");
                return;
            }
        };

        let Some(command_id) = reply.command_id else {
            tracing::debug!("dropping reply without commandId");
            return;
        };
        let Some(pending) = inner.pending.lock().remove(&command_id) else {
            // Late or duplicate reply after timeout eviction.
            tracing::debug!("no pending command for reply {command_id}");
            return;
        };

        let outcome = match reply.status {
            ReplyStatus::Success => Ok(reply.result.unwrap_or(Value::Null)),
            ReplyStatus::Error => Err(BridgeError::Editor(
                reply
                    .message
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
        };
        tracing::debug!("completing {} ({command_id})", pending.command);
        let _ = pending.tx.send(outcome);
    }

    /// Reader-task exit path: reset state and drain, once per generation
    fn teardown(inner: &Inner, generation: u64) {
        {
            let mut state = inner.state.lock();
            if !matches!(&*state, ChannelState::Connected { generation: g, .. } if *g == generation)
            {
                return;
            }
            *state = ChannelState::Disconnected;
        }
        tracing::info!("Godot editor connection closed");
        Self::drain_pending(inner, BridgeError::ConnectionClosed);
    }

    /// Fail every pending command with `error` and clear the table
    fn drain_pending(inner: &Inner, error: BridgeError) {
        let drained: Vec<PendingCommand> =
            inner.pending.lock().drain().map(|(_, p)| p).collect();
        for pending in drained {
            let _ = pending.tx.send(Err(error.clone()));
        }
    }
}

impl Default for GodotConnection {
    fn default() -> Self {
        Self::new(
            DEFAULT_GODOT_URL,
            Duration::from_millis(DEFAULT_COMMAND_TIMEOUT_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::net::TcpListener;

    /// What the fake editor does with a received command
    enum EditorAction {
        Reply(String),
        Silent,
        Close,
    }

    fn success_reply(command_id: &str, result: Value) -> String {
        serde_json::to_string(&json!({
            "status": "success",
            "result": result,
            "commandId": command_id,
        }))
        .unwrap()
    }

    /// Spawn a fake Godot editor; `on_command` decides the reaction to
    /// each received command. Returns the ws URL and an accept counter.
    async fn spawn_editor<F>(on_command: F) -> (String, Arc<AtomicUsize>)
    where
        F: Fn(GodotCommand) -> Vec<EditorAction> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let accepted_counter = accepted.clone();
        let on_command = Arc::new(on_command);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                accepted_counter.fetch_add(1, Ordering::SeqCst);
                let on_command = on_command.clone();
                tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (mut write, mut read) = ws.split();
                    while let Some(Ok(msg)) = read.next().await {
                        let Message::Text(text) = msg else { continue };
                        let Ok(command) = serde_json::from_str::<GodotCommand>(text.as_str())
                        else {
                            continue;
                        };
                        for action in on_command(command.clone()) {
                            match action {
                                EditorAction::Reply(frame) => {
                                    if write.send(Message::Text(frame.into())).await.is_err() {
                                        return;
                                    }
                                }
                                EditorAction::Silent => {}
                                EditorAction::Close => {
                                    let _ = write.send(Message::Close(None)).await;
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });

        (format!("ws://{addr}"), accepted)
    }

    fn test_connection(url: &str) -> GodotConnection {
        GodotConnection::new(url, Duration::from_millis(2_000))
    }

    #[tokio::test]
    async fn test_success_reply_resolves_result() {
        let (url, _) = spawn_editor(|command| {
            assert_eq!(command.command, "get_script");
            assert_eq!(command.command_id, "cmd_0");
            vec![EditorAction::Reply(success_reply(
                &command.command_id,
                json!({ "content": "x" }),
            ))]
        })
        .await;

        let conn = test_connection(&url);
        let result = conn
            .send_command("get_script", json!({ "path": "res://a.gd" }))
            .await
            .unwrap();
        assert_eq!(result, json!({ "content": "x" }));
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_error_reply_rejects_with_message() {
        let (url, _) = spawn_editor(|command| {
            let frame = serde_json::to_string(&json!({
                "status": "error",
                "message": "script not found",
                "commandId": command.command_id,
            }))
            .unwrap();
            vec![EditorAction::Reply(frame)]
        })
        .await;

        let conn = test_connection(&url);
        let err = conn
            .send_command("get_script", json!({ "path": "res://missing.gd" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Editor(ref m) if m == "script not found"));
        // An application error leaves the channel healthy.
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_timeout_evicts_pending_command() {
        let (url, _) = spawn_editor(|_| vec![EditorAction::Silent]).await;

        let conn = GodotConnection::new(url.as_str(), Duration::from_millis(150));
        let err = conn
            .send_command("get_debug_output", json!({}))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("timed out"));
        assert!(message.contains("get_debug_output"));
        assert!(conn.inner.pending.lock().is_empty());
        // A per-command timeout is not a channel fault.
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_out_of_order_replies_resolve_correct_callers() {
        let seen: Arc<Mutex<Vec<GodotCommand>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_editor = seen.clone();
        let (url, _) = spawn_editor(move |command| {
            let mut seen = seen_by_editor.lock();
            seen.push(command);
            if seen.len() < 2 {
                return vec![EditorAction::Silent];
            }
            // Reply in reverse order of arrival.
            seen.iter()
                .rev()
                .map(|c| {
                    EditorAction::Reply(success_reply(
                        &c.command_id,
                        json!({ "echo": c.command }),
                    ))
                })
                .collect()
        })
        .await;

        let conn = test_connection(&url);
        let (first, second) = tokio::join!(
            conn.send_command("get_script", json!({ "path": "res://a.gd" })),
            conn.send_command("get_script_metadata", json!({ "path": "res://a.gd" })),
        );
        assert_eq!(first.unwrap(), json!({ "echo": "get_script" }));
        assert_eq!(second.unwrap(), json!({ "echo": "get_script_metadata" }));
    }

    #[tokio::test]
    async fn test_close_drains_all_pending() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        let (url, _) = spawn_editor(move |_| {
            if counter_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                vec![EditorAction::Silent]
            } else {
                vec![EditorAction::Close]
            }
        })
        .await;

        let conn = test_connection(&url);
        let (first, second) = tokio::join!(
            conn.send_command("get_script", json!({ "path": "res://a.gd" })),
            conn.send_command("get_debug_output", json!({})),
        );
        assert!(matches!(first.unwrap_err(), BridgeError::ConnectionClosed));
        assert!(matches!(second.unwrap_err(), BridgeError::ConnectionClosed));
        assert!(conn.inner.pending.lock().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_connected_single_attempt() {
        let (url, accepted) = spawn_editor(|_| vec![EditorAction::Silent]).await;

        let conn = test_connection(&url);
        let (a, b) = tokio::join!(conn.ensure_connected(), conn.ensure_connected());
        a.unwrap();
        b.unwrap();
        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(conn.status(), ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get an address nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let conn = test_connection(&format!("ws://{addr}"));
        let err = conn.send_command("get_script", json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::Connect { .. }));
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent_and_reconnects_lazily() {
        let (url, accepted) = spawn_editor(|command| {
            vec![EditorAction::Reply(success_reply(
                &command.command_id,
                json!({ "ok": true }),
            ))]
        })
        .await;

        let conn = test_connection(&url);
        conn.ensure_connected().await.unwrap();
        conn.disconnect();
        conn.disconnect();
        assert!(!conn.is_connected());

        // The next command dials again.
        let result = conn.send_command("get_debug_output", json!({})).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        assert_eq!(accepted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_malformed_and_stale_frames_are_dropped() {
        let (url, _) = spawn_editor(|command| {
            vec![
                EditorAction::Reply("not json".to_string()),
                EditorAction::Reply(success_reply("cmd_9999", json!({ "stale": true }))),
                EditorAction::Reply(success_reply(&command.command_id, json!({ "ok": true }))),
            ]
        })
        .await;

        let conn = test_connection(&url);
        let result = conn.send_command("get_script", json!({})).await.unwrap();
        assert_eq!(result, json!({ "ok": true }));
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_tokens_are_distinct_and_monotonic() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_by_editor = seen.clone();
        let (url, _) = spawn_editor(move |command| {
            seen_by_editor.lock().push(command.command_id.clone());
            vec![EditorAction::Reply(success_reply(
                &command.command_id,
                Value::Null,
            ))]
        })
        .await;

        let conn = test_connection(&url);
        for _ in 0..3 {
            conn.send_command("get_debug_output", json!({})).await.unwrap();
        }
        assert_eq!(*seen.lock(), vec!["cmd_0", "cmd_1", "cmd_2"]);
    }
}
