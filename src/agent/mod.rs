#[allow(clippy::module_inception)]
pub mod agent;
pub mod traits;


pub use agent::{AgentBuilder, McpAgent, DEFAULT_SYSTEM_PROMPT};
pub use traits::ChatAgent;
