//! Model Context Protocol client: starts the tool servers and talks to them
//! for the chat session.
//!
//! [`McpClient`] reads an `mcpServers` config file, spawns each server as a
//! child process speaking newline-delimited JSON-RPC over stdio, and exposes
//! the advertised tools through [`crate::tools::Tool`]. The chat loop only
//! sees the narrow [`SessionClient`] trait.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod traits;

pub use client::{McpClient, McpTool};
pub use config::{McpConfig, ServerConfig};
pub use error::McpError;
pub use session::McpSession;
pub use traits::SessionClient;
