pub mod schema;

pub use schema::{
    load_dotenv, load_dotenv_from, resolve_api_key, AgentConfig, Config, ConfigError,
    ConfigOverrides, API_KEY_ENV, DEFAULT_MCP_CONFIG,
};
