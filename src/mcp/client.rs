use super::config::McpConfig;
use super::error::McpError;
use super::protocol::McpToolDef;
use super::session::{McpSession, DEFAULT_REQUEST_TIMEOUT};
use super::traits::SessionClient;
use crate::tools::{Tool, ToolResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Client for every server listed in an MCP config file.
///
/// Construction only parses the config; processes start in
/// [`McpClient::create_all_sessions`].
pub struct McpClient {
    config: McpConfig,
    sessions: Mutex<Vec<Arc<McpSession>>>,
    request_timeout: Duration,
}

impl McpClient {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(Vec::new()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub async fn from_config_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = McpConfig::load(path.as_ref()).await?;
        tracing::info!(
            path = %path.as_ref().display(),
            servers = config.servers.len(),
            "MCP config loaded"
        );
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Start and initialize a session per configured server.
    ///
    /// Each session joins the open set as soon as its process exists, so a
    /// failed handshake still gets cleaned up by [`SessionClient::close_all_sessions`].
    pub async fn create_all_sessions(&self) -> Result<usize> {
        for (name, server) in &self.config.servers {
            let session = Arc::new(McpSession::spawn(name, server, self.request_timeout)?);
            self.add_session(Arc::clone(&session));
            session
                .initialize()
                .await
                .with_context(|| format!("Failed to initialize MCP server '{name}'"))?;
        }
        Ok(self.session_count())
    }

    /// Register an already-connected session.
    pub fn add_session(&self, session: Arc<McpSession>) {
        self.sessions.lock().push(session);
    }

    pub fn sessions(&self) -> Vec<Arc<McpSession>> {
        self.sessions.lock().clone()
    }

    /// Tools from every open session, exposed through the [`Tool`] trait.
    ///
    /// When two servers advertise the same name, the first server wins.
    pub async fn tools(&self) -> Result<Vec<Box<dyn Tool>>> {
        let mut seen = HashSet::new();
        let mut tools: Vec<Box<dyn Tool>> = Vec::new();

        for session in self.sessions() {
            let defs = session
                .list_tools()
                .await
                .with_context(|| format!("Failed to list tools from '{}'", session.name()))?;
            tracing::info!(server = %session.name(), count = defs.len(), "Discovered MCP tools");

            for def in defs {
                if !seen.insert(def.name.clone()) {
                    tracing::warn!(
                        server = %session.name(),
                        tool = %def.name,
                        "Duplicate tool name; keeping the first registration"
                    );
                    continue;
                }
                tools.push(Box::new(McpTool::new(Arc::clone(&session), def)));
            }
        }

        Ok(tools)
    }
}

#[async_trait]
impl SessionClient for McpClient {
    fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    async fn close_all_sessions(&self) -> Result<()> {
        let sessions = std::mem::take(&mut *self.sessions.lock());
        let mut failures = Vec::new();

        for session in sessions {
            if let Err(error) = session.close().await {
                tracing::warn!(server = %session.name(), "Failed to close MCP session: {error}");
                failures.push(error.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("Failed to close {} MCP session(s): {}", failures.len(), failures.join("; "))
        }
    }

    fn name(&self) -> &str {
        "mcp"
    }
}

/// A tool advertised by an MCP server.
pub struct McpTool {
    session: Arc<McpSession>,
    def: McpToolDef,
    schema: serde_json::Value,
}

impl McpTool {
    pub fn new(session: Arc<McpSession>, def: McpToolDef) -> Self {
        let schema = normalize_schema(def.input_schema.clone());
        Self {
            session,
            def,
            schema,
        }
    }

    pub fn server(&self) -> &str {
        self.session.name()
    }
}

/// Function-calling APIs want an object schema with `properties`.
fn normalize_schema(schema: Option<serde_json::Value>) -> serde_json::Value {
    let mut schema = match schema {
        Some(serde_json::Value::Object(map)) => serde_json::Value::Object(map),
        _ => serde_json::json!({ "type": "object" }),
    };
    if schema.get("properties").is_none() {
        schema["properties"] = serde_json::json!({});
    }
    schema
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.def.name
    }

    fn description(&self) -> &str {
        self.def.description.as_deref().unwrap_or_default()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.schema.clone()
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolResult> {
        let args = if args.is_null() {
            serde_json::json!({})
        } else {
            args
        };

        match self.session.call_tool(&self.def.name, args).await {
            Ok(result) if result.is_error => Ok(ToolResult::failed(result.text())),
            Ok(result) => Ok(ToolResult::ok(result.text())),
            Err(error @ McpError::Rpc { .. }) => Ok(ToolResult::failed(error.to_string())),
            Err(error) => Err(error.into()),
        }
    }
}
