//! A single stdio session with an MCP server process.

use super::config::ServerConfig;
use super::error::McpError;
use super::protocol::{
    CallToolResult, Incoming, InitializeResult, JsonRpcNotification, JsonRpcReply,
    JsonRpcRequest, ListToolsResult, McpToolDef, ServerInfo, PROTOCOL_VERSION,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};

/// Default per-request timeout. Browser tools can be slow.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// How long a server gets to exit after stdin is closed before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct SessionIo {
    writer: Option<BoxedWriter>,
    reader: Lines<BufReader<BoxedReader>>,
}

/// Live connection to one MCP server.
///
/// Requests are serialized: one in flight at a time, matching the single
/// cooperative loop that drives the agent.
pub struct McpSession {
    name: String,
    io: tokio::sync::Mutex<SessionIo>,
    child: tokio::sync::Mutex<Option<Child>>,
    server_info: Mutex<Option<ServerInfo>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    request_timeout: Duration,
}

impl McpSession {
    /// Build a session over an arbitrary byte transport.
    pub fn from_transport(
        name: impl Into<String>,
        reader: BoxedReader,
        writer: BoxedWriter,
        child: Option<Child>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            io: tokio::sync::Mutex::new(SessionIo {
                writer: Some(writer),
                reader: BufReader::new(reader).lines(),
            }),
            child: tokio::sync::Mutex::new(child),
            server_info: Mutex::new(None),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            request_timeout,
        }
    }

    /// Spawn the server process described by `config` and wire up its stdio.
    pub fn spawn(
        name: &str,
        config: &ServerConfig,
        request_timeout: Duration,
    ) -> Result<Self, McpError> {
        let command = config.command.as_deref().unwrap_or_default();
        let mut child = Command::new(command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| McpError::Spawn {
                server: name.to_string(),
                command: command.to_string(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::protocol(name, "child stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::protocol(name, "child stdout unavailable"))?;

        if let Some(stderr) = child.stderr.take() {
            let server = name.to_string();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %server, "{line}");
                }
            });
        }

        tracing::info!(server = name, command, args = ?config.args, "Spawned MCP server");

        Ok(Self::from_transport(
            name,
            Box::new(stdout),
            Box::new(stdin),
            Some(child),
            request_timeout,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().clone()
    }

    /// `initialize` handshake followed by `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let raw = self.request("initialize", Some(params)).await?;
        let result: InitializeResult = serde_json::from_value(raw)
            .map_err(|e| McpError::protocol(&self.name, format!("bad initialize result: {e}")))?;

        self.notify("notifications/initialized", None).await?;

        tracing::info!(
            server = %self.name,
            remote = result.server_info.as_ref().map_or("?", |s| s.name.as_str()),
            protocol = result.protocol_version.as_deref().unwrap_or("?"),
            "MCP session initialized"
        );
        *self.server_info.lock() = result.server_info.clone();
        Ok(result)
    }

    /// All tools the server advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let raw = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(raw)
                .map_err(|e| McpError::protocol(&self.name, format!("bad tools/list result: {e}")))?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let raw = self
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;
        serde_json::from_value(raw)
            .map_err(|e| McpError::protocol(&self.name, format!("bad tools/call result: {e}")))
    }

    /// Send a request and wait for the matching response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.is_closed() {
            return Err(McpError::closed(&self.name));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        })
        .map_err(|e| McpError::protocol(&self.name, e.to_string()))?;

        let mut io = self.io.lock().await;
        write_line(&self.name, &mut io, &line).await?;

        let response = tokio::time::timeout(self.request_timeout, read_response(&self.name, &mut io, id))
            .await
            .map_err(|_| McpError::Timeout {
                server: self.name.clone(),
                method: method.to_string(),
                timeout: self.request_timeout,
            })??;

        if let Some(error) = response.error {
            return Err(McpError::Rpc {
                server: self.name.clone(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        })
        .map_err(|e| McpError::protocol(&self.name, e.to_string()))?;
        let mut io = self.io.lock().await;
        write_line(&self.name, &mut io, &line).await
    }

    /// Close stdin, give the server a grace period to exit, then kill it.
    /// Calling this more than once is a no-op.
    pub async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(mut writer) = self.io.lock().await.writer.take() {
            let _ = writer.shutdown().await;
        }

        let Some(mut child) = self.child.lock().await.take() else {
            tracing::debug!(server = %self.name, "MCP session closed");
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(server = %self.name, %status, "MCP server exited");
            }
            Ok(Err(e)) => return Err(McpError::io(&self.name, e)),
            Err(_) => {
                tracing::warn!(server = %self.name, "MCP server did not exit in time; killing");
                child.kill().await.map_err(|e| McpError::io(&self.name, e))?;
            }
        }
        Ok(())
    }
}

async fn write_line(server: &str, io: &mut SessionIo, line: &str) -> Result<(), McpError> {
    let writer = io.writer.as_mut().ok_or_else(|| McpError::closed(server))?;
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| McpError::io(server, e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| McpError::io(server, e))?;
    writer.flush().await.map_err(|e| McpError::io(server, e))
}

async fn read_response(
    server: &str,
    io: &mut SessionIo,
    id: u64,
) -> Result<super::protocol::JsonRpcResponse, McpError> {
    loop {
        let line = io
            .reader
            .next_line()
            .await
            .map_err(|e| McpError::io(server, e))?
            .ok_or_else(|| McpError::closed(server))?;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match Incoming::parse(trimmed) {
            Some(Incoming::Response(response)) if response.id_matches(id) => return Ok(response),
            Some(Incoming::Response(response)) => {
                tracing::debug!(server, stale_id = ?response.id, "Skipping response for another request");
            }
            Some(Incoming::ServerRequest { id, method }) => {
                tracing::debug!(server, %method, "Answering server-initiated request");
                let reply = serde_json::to_string(&JsonRpcReply::to_server_request(id, &method))
                    .map_err(|e| McpError::protocol(server, e.to_string()))?;
                write_line(server, io, &reply).await?;
            }
            Some(Incoming::ServerNotification { method }) => {
                tracing::debug!(server, %method, "Ignoring server notification");
            }
            None => {
                tracing::debug!(server, "Ignoring non-JSON output: {trimmed}");
            }
        }
    }
}
