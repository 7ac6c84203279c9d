//! Tool-server configuration file (`mcpServers` layout).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Parsed contents of the MCP config file, e.g. `browser_mcp.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    /// Servers keyed by name. Ordered so sessions start deterministically.
    #[serde(rename = "mcpServers", default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

/// One tool server. Only the stdio transport (`command`) is supported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// HTTP/SSE endpoint. Recognized only to produce a clear error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl McpConfig {
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(contents).context("Failed to parse MCP config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read MCP config file {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("Invalid MCP config {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, server) in &self.servers {
            match (&server.command, &server.url) {
                (Some(command), _) if !command.trim().is_empty() => {}
                (_, Some(url)) => anyhow::bail!(
                    "MCP server '{name}' uses an HTTP endpoint ({url}); only stdio servers with a `command` are supported"
                ),
                _ => anyhow::bail!("MCP server '{name}' has no `command`"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stdio_servers() {
        let config = McpConfig::from_json(
            r#"{
                "mcpServers": {
                    "playwright": {
                        "command": "npx",
                        "args": ["@playwright/mcp@latest"],
                        "env": {"DISPLAY": ":1"}
                    },
                    "airbnb": {"command": "npx", "args": ["-y", "@openbnb/mcp-server-airbnb"]}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.servers.len(), 2);
        let playwright = &config.servers["playwright"];
        assert_eq!(playwright.command.as_deref(), Some("npx"));
        assert_eq!(playwright.args, vec!["@playwright/mcp@latest"]);
        assert_eq!(playwright.env.get("DISPLAY").map(String::as_str), Some(":1"));
        // BTreeMap keeps start order stable.
        let names: Vec<&str> = config.servers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["airbnb", "playwright"]);
    }

    #[test]
    fn empty_server_map_is_allowed() {
        let config = McpConfig::from_json(r#"{"mcpServers": {}}"#).unwrap();
        assert!(config.servers.is_empty());
        let config = McpConfig::from_json("{}").unwrap();
        assert!(config.servers.is_empty());
    }

    #[test]
    fn server_without_command_is_rejected() {
        let err = McpConfig::from_json(r#"{"mcpServers": {"broken": {"args": []}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("'broken' has no `command`"));
    }

    #[test]
    fn http_server_is_rejected_with_clear_message() {
        let err = McpConfig::from_json(
            r#"{"mcpServers": {"remote": {"url": "http://localhost:8931/sse"}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only stdio servers"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(McpConfig::from_json("{not json").is_err());
    }

    #[tokio::test]
    async fn load_reports_missing_file_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("browser_mcp.json");
        let err = McpConfig::load(&path).await.unwrap_err();
        assert!(format!("{err:#}").contains("browser_mcp.json"));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("browser_mcp.json");
        std::fs::write(&path, r#"{"mcpServers": {"fs": {"command": "mcp-fs"}}}"#).unwrap();
        let config = McpConfig::load(&path).await.unwrap();
        assert!(config.servers.contains_key("fs"));
    }
}
