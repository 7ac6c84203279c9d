use std::fmt;
use std::path::{Path, PathBuf};

use crate::security::redact;

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Default tool-server configuration file, resolved against the working directory.
pub const DEFAULT_MCP_CONFIG: &str = "browser_mcp.json";

// ── Errors ────────────────────────────────────────────────────────

/// Fatal configuration problems. Raised before any client or agent exists.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is missing. Please add it to your environment or .env file.")]
    MissingApiKey,
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

// ── Top-level config ──────────────────────────────────────────────

/// Runtime configuration for a chat session.
///
/// Resolution order: defaults → `MCPCHAT_*` env vars → CLI flags. The API key
/// always comes from `GROQ_API_KEY`.
#[derive(Clone)]
pub struct Config {
    /// Provider credential. Empty until [`Config::load`] resolves it.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible endpoint.
    pub api_url: String,
    /// Provider ID understood by [`crate::providers::create_provider`].
    pub provider: String,
    /// Model identifier sent with every request. Default: `"llama3-70b-8192"`.
    pub model: String,
    /// Model temperature (0.0–2.0). Default: `0.7`.
    pub temperature: f64,
    /// Path to the `mcpServers` JSON file. Default: `browser_mcp.json`.
    pub mcp_config_path: PathBuf,
    /// Agent behaviour (`max_steps`, memory).
    pub agent: AgentConfig,
}

/// Agent orchestration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Maximum provider round-trips per user message. Default: `15`.
    pub max_steps: usize,
    /// Keep conversation history across turns. Default: `true`.
    pub memory_enabled: bool,
    /// Maximum conversation history messages retained. Default: `50`.
    pub max_history_messages: usize,
}

fn default_agent_max_steps() -> usize {
    15
}

fn default_agent_max_history_messages() -> usize {
    50
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_agent_max_steps(),
            memory_enabled: true,
            max_history_messages: default_agent_max_history_messages(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: "https://api.groq.com/openai/v1".into(),
            provider: "groq".into(),
            model: "llama3-70b-8192".into(),
            temperature: 0.7,
            mcp_config_path: PathBuf::from(DEFAULT_MCP_CONFIG),
            agent: AgentConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("mcp_config_path", &self.mcp_config_path)
            .field("agent", &self.agent)
            .finish()
    }
}

/// Values supplied on the command line. `None` keeps the env/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub mcp_config: Option<PathBuf>,
    pub model: Option<String>,
    pub max_steps: Option<usize>,
    pub temperature: Option<f64>,
    pub no_memory: bool,
}

impl Config {
    /// Build the effective configuration and resolve the credential.
    ///
    /// Fails with [`ConfigError::MissingApiKey`] when `GROQ_API_KEY` is unset
    /// or blank.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.apply_overrides(overrides);
        config.api_key = resolve_api_key()?;
        config.validate()?;

        tracing::info!(
            model = %config.model,
            provider = %config.provider,
            mcp_config = %config.mcp_config_path.display(),
            api_key = %redact(&config.api_key),
            max_steps = config.agent.max_steps,
            memory = config.agent.memory_enabled,
            "Config loaded"
        );
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Some(model) = non_empty_env("MCPCHAT_MODEL") {
            self.model = model;
        }

        if let Some(url) = non_empty_env("MCPCHAT_API_URL") {
            self.api_url = url;
        }

        if let Some(path) = non_empty_env("MCPCHAT_MCP_CONFIG") {
            self.mcp_config_path = PathBuf::from(path);
        }

        if let Some(raw) = non_empty_env("MCPCHAT_MAX_STEPS") {
            match raw.parse::<usize>() {
                Ok(steps) => self.agent.max_steps = steps,
                Err(error) => {
                    tracing::warn!(value = %raw, "Ignoring invalid MCPCHAT_MAX_STEPS: {error}");
                }
            }
        }
    }

    /// Apply command-line overrides on top of the current values.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(path) = &overrides.mcp_config {
            self.mcp_config_path = path.clone();
        }
        if let Some(model) = &overrides.model {
            self.model = model.clone();
        }
        if let Some(steps) = overrides.max_steps {
            self.agent.max_steps = steps;
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if overrides.no_memory {
            self.agent.memory_enabled = false;
        }
    }

    /// Validate values that would otherwise fail at an arbitrary point mid-session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "model",
                message: "must not be empty".into(),
            });
        }
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_url",
                message: "must not be empty".into(),
            });
        }
        if self.agent.max_steps == 0 {
            return Err(ConfigError::Invalid {
                field: "max_steps",
                message: "must be greater than 0".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid {
                field: "temperature",
                message: format!("{} is outside 0.0..=2.0", self.temperature),
            });
        }
        Ok(())
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Read the provider credential from the process environment.
pub fn resolve_api_key() -> Result<String, ConfigError> {
    non_empty_env(API_KEY_ENV).ok_or(ConfigError::MissingApiKey)
}

/// Load `.env` from the working directory or one of its parents. Returns the
/// loaded path, or `None` when no file exists. Parse errors are returned.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    ignore_missing(dotenvy::dotenv())
}

/// Load a specific dotenv file. Returns `false` when it does not exist.
pub fn load_dotenv_from(path: &Path) -> Result<bool, dotenvy::Error> {
    Ok(ignore_missing(dotenvy::from_path(path))?.is_some())
}

fn ignore_missing<T>(result: Result<T, dotenvy::Error>) -> Result<Option<T>, dotenvy::Error> {
    match result {
        Ok(loaded) => Ok(Some(loaded)),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::{Mutex, MutexGuard};

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            API_KEY_ENV,
            "MCPCHAT_MODEL",
            "MCPCHAT_API_URL",
            "MCPCHAT_MCP_CONFIG",
            "MCPCHAT_MAX_STEPS",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.provider, "groq");
        assert_eq!(c.model, "llama3-70b-8192");
        assert!((c.temperature - 0.7).abs() < f64::EPSILON);
        assert!(c.api_key.is_empty());
        assert_eq!(c.mcp_config_path, PathBuf::from("browser_mcp.json"));
        assert_eq!(c.agent.max_steps, 15);
        assert!(c.agent.memory_enabled);
    }

    #[test]
    fn debug_output_redacts_api_key() {
        let c = Config {
            api_key: "gsk_live_secret_value".into(),
            ..Config::default()
        };
        let rendered = format!("{c:?}");
        assert!(!rendered.contains("gsk_live_secret_value"));
        assert!(rendered.contains("gsk_***"));
    }

    #[test]
    fn validate_rejects_zero_steps() {
        let mut c = Config::default();
        c.agent.max_steps = 0;
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let c = Config {
            temperature: 2.5,
            ..Config::default()
        };
        assert!(matches!(
            c.validate(),
            Err(ConfigError::Invalid {
                field: "temperature",
                ..
            })
        ));
    }

    #[test]
    fn cli_overrides_take_effect() {
        let mut c = Config::default();
        c.apply_overrides(&ConfigOverrides {
            mcp_config: Some(PathBuf::from("/tmp/servers.json")),
            model: Some("llama-3.3-70b-versatile".into()),
            max_steps: Some(4),
            temperature: Some(0.2),
            no_memory: true,
        });
        assert_eq!(c.mcp_config_path, PathBuf::from("/tmp/servers.json"));
        assert_eq!(c.model, "llama-3.3-70b-versatile");
        assert_eq!(c.agent.max_steps, 4);
        assert!((c.temperature - 0.2).abs() < f64::EPSILON);
        assert!(!c.agent.memory_enabled);
    }

    // ── Env override tests ───────────────────────────────────

    #[tokio::test]
    async fn load_fails_without_api_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();

        let err = Config::load(&ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[tokio::test]
    async fn load_treats_blank_api_key_as_missing() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        std::env::set_var(API_KEY_ENV, "   ");

        let result = Config::load(&ConfigOverrides::default());
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn load_reads_api_key_from_env() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        std::env::set_var(API_KEY_ENV, "  gsk_test_key  ");

        let config = Config::load(&ConfigOverrides::default()).unwrap();
        assert_eq!(config.api_key, "gsk_test_key");

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_model_and_steps() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        std::env::set_var("MCPCHAT_MODEL", "mixtral-8x7b-32768");
        std::env::set_var("MCPCHAT_MAX_STEPS", "7");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.model, "mixtral-8x7b-32768");
        assert_eq!(config.agent.max_steps, 7);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_invalid_steps_is_ignored() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        std::env::set_var("MCPCHAT_MAX_STEPS", "lots");

        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.agent.max_steps, 15);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn cli_override_beats_env() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        std::env::set_var(API_KEY_ENV, "gsk_test_key");
        std::env::set_var("MCPCHAT_MODEL", "from-env");

        let config = Config::load(&ConfigOverrides {
            model: Some("from-cli".into()),
            ..ConfigOverrides::default()
        })
        .unwrap();
        assert_eq!(config.model, "from-cli");

        clear_env_test_vars();
    }

    // ── .env loading ─────────────────────────────────────────

    #[test]
    fn missing_dotenv_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load_dotenv_from(&dir.path().join(".env")).unwrap();
        assert!(!loaded);
    }

    #[test]
    fn dotenv_values_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "MCPCHAT_DOTENV_TEST_VALUE=from-file\n").unwrap();

        assert!(load_dotenv_from(&path).unwrap());
        assert_eq!(
            std::env::var("MCPCHAT_DOTENV_TEST_VALUE").as_deref(),
            Ok("from-file")
        );
        std::env::remove_var("MCPCHAT_DOTENV_TEST_VALUE");
    }

    #[test]
    fn malformed_dotenv_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "this is not a dotenv line\n").unwrap();

        let err = load_dotenv_from(&path).unwrap_err();
        assert!(matches!(err, dotenvy::Error::LineParse(..)));
    }
}
