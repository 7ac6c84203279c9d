#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::redundant_closure_for_method_calls,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{Context, Result};
use clap::Parser;
use mcpchat::agent::McpAgent;
use mcpchat::chat;
use mcpchat::config::{self, Config, ConfigOverrides};
use mcpchat::mcp::McpClient;
use mcpchat::providers;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let t: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if !(0.0..=2.0).contains(&t) {
        return Err("temperature must be between 0.0 and 2.0".to_string());
    }
    Ok(t)
}

fn parse_max_steps(s: &str) -> std::result::Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n == 0 {
        return Err("max steps must be greater than 0".to_string());
    }
    Ok(n)
}

/// Chat with a tool-using LLM agent backed by MCP servers.
#[derive(Parser, Debug)]
#[command(name = "mcpchat")]
#[command(version)]
#[command(about = "Interactive chat with an LLM agent that can use MCP server tools.", long_about = None)]
struct Cli {
    /// MCP server config file (default: browser_mcp.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model to use (default: llama3-70b-8192)
    #[arg(long)]
    model: Option<String>,

    /// Maximum model round-trips per query (default: 15)
    #[arg(long, value_name = "N", value_parser = parse_max_steps)]
    max_steps: Option<usize>,

    /// Do not carry conversation history between turns
    #[arg(long)]
    no_memory: bool,

    /// Temperature (0.0 - 2.0)
    #[arg(long, value_parser = parse_temperature)]
    temperature: Option<f64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            mcp_config: self.config.clone(),
            model: self.model.clone(),
            max_steps: self.max_steps,
            temperature: self.temperature,
            no_memory: self.no_memory,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install default crypto provider for Rustls TLS.
    if let Err(e) = rustls::crypto::ring::default_provider().install_default() {
        eprintln!("Warning: Failed to install default crypto provider: {e:?}");
    }

    let cli = Cli::parse();

    // Loaded before logging so RUST_LOG may come from .env; reported below.
    let dotenv = config::load_dotenv();

    // Logs go to stderr and default to WARN so they stay out of the transcript.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    match dotenv {
        Ok(Some(path)) => info!(path = %path.display(), "Loaded .env"),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env: {e}"),
    }

    let config = Config::load(&cli.overrides())?;

    let code = match run_chat(config).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };

    // A stdin read may still be parked on a blocking thread, which would
    // stall runtime shutdown until the operator presses Enter.
    std::process::exit(code);
}

async fn run_chat(config: Config) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"Initializing MCP Agent...\n").await?;
    stdout.flush().await?;

    let client = Arc::new(McpClient::from_config_file(&config.mcp_config_path).await?);

    let interrupt = std::pin::pin!(wait_for_interrupt());
    let stdin = BufReader::new(tokio::io::stdin());
    let exit = chat::start(
        client,
        move |client| async move { build_agent(&config, &client).await },
        stdin,
        &mut stdout,
        interrupt,
    )
    .await?;
    info!(?exit, "Chat session ended");
    Ok(())
}

/// Start the tool servers and wire up the agent.
async fn build_agent(config: &Config, client: &McpClient) -> Result<McpAgent> {
    let sessions = client.create_all_sessions().await?;
    let tools = client.tools().await?;
    info!(sessions, tools = tools.len(), "MCP servers ready");

    let provider = providers::create_provider(
        &config.provider,
        Some(&config.api_key),
        Some(&config.api_url),
    )?;

    McpAgent::builder()
        .provider(provider)
        .tools(tools)
        .config(config)
        .build()
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_without_flags_keeps_defaults() {
        let cli = Cli::try_parse_from(["mcpchat"]).unwrap();
        let overrides = cli.overrides();
        assert!(overrides.mcp_config.is_none());
        assert!(overrides.model.is_none());
        assert!(overrides.max_steps.is_none());
        assert!(overrides.temperature.is_none());
        assert!(!overrides.no_memory);
    }

    #[test]
    fn cli_flags_map_to_overrides() {
        let cli = Cli::try_parse_from([
            "mcpchat",
            "--config",
            "servers.json",
            "--model",
            "mixtral-8x7b-32768",
            "--max-steps",
            "5",
            "--no-memory",
            "--temperature",
            "0.2",
        ])
        .unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.mcp_config, Some(PathBuf::from("servers.json")));
        assert_eq!(overrides.model.as_deref(), Some("mixtral-8x7b-32768"));
        assert_eq!(overrides.max_steps, Some(5));
        assert_eq!(overrides.temperature, Some(0.2));
        assert!(overrides.no_memory);
    }

    #[test]
    fn cli_rejects_out_of_range_values() {
        assert!(Cli::try_parse_from(["mcpchat", "--temperature", "3.5"]).is_err());
        assert!(Cli::try_parse_from(["mcpchat", "--max-steps", "0"]).is_err());
    }
}
