use std::time::Duration;

/// Failures talking to an MCP server.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("failed to start MCP server '{server}' ({command}): {source}")]
    Spawn {
        server: String,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server '{server}' I/O error: {source}")]
    Io {
        server: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP server '{server}' sent an invalid message: {message}")]
    Protocol { server: String, message: String },

    #[error("MCP server '{server}' returned error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("MCP server '{server}' did not answer {method} within {timeout:?}")]
    Timeout {
        server: String,
        method: String,
        timeout: Duration,
    },

    #[error("MCP session '{server}' is closed")]
    Closed { server: String },
}

impl McpError {
    pub(crate) fn io(server: &str, source: std::io::Error) -> Self {
        Self::Io {
            server: server.to_string(),
            source,
        }
    }

    pub(crate) fn protocol(server: &str, message: impl Into<String>) -> Self {
        Self::Protocol {
            server: server.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn closed(server: &str) -> Self {
        Self::Closed {
            server: server.to_string(),
        }
    }
}
