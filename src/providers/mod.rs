//! Provider subsystem for model inference backends.
//!
//! Each provider implements the [`Provider`] trait defined in [`traits`] and is
//! registered in the factory function [`create_provider`] by its canonical
//! string key. Everything the chat client talks to speaks the
//! OpenAI-compatible chat completions format, so the factory only has to pick
//! a base URL and an auth style for [`compatible::OpenAiCompatibleProvider`].

pub mod compatible;
pub mod traits;

pub use compatible::OpenAiCompatibleProvider;
pub use traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall};

const MAX_API_ERROR_CHARS: usize = 200;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

fn is_secret_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn token_end(input: &str, from: usize) -> usize {
    let mut end = from;
    for (i, c) in input[from..].char_indices() {
        if is_secret_char(c) {
            end = from + i + c.len_utf8();
        } else {
            break;
        }
    }
    end
}

/// Scrub known secret-like token prefixes from provider error strings.
///
/// Redacts tokens with prefixes like `gsk_`, `sk-`, `xoxb-`, `ghp_`, and
/// `github_pat_`.
pub fn scrub_secret_patterns(input: &str) -> String {
    const PREFIXES: [&str; 8] = [
        "gsk_",
        "sk-",
        "xoxb-",
        "xoxp-",
        "ghp_",
        "gho_",
        "ghu_",
        "github_pat_",
    ];

    let mut scrubbed = input.to_string();

    for prefix in PREFIXES {
        let mut search_from = 0;
        loop {
            let Some(rel) = scrubbed[search_from..].find(prefix) else {
                break;
            };

            let start = search_from + rel;
            let content_start = start + prefix.len();
            let end = token_end(&scrubbed, content_start);

            if end == content_start {
                search_from = content_start;
                continue;
            }

            scrubbed.replace_range(start..end, "[REDACTED]");
            search_from = start + "[REDACTED]".len();
        }
    }

    scrubbed
}

/// Sanitize API error text by scrubbing secrets and truncating length.
pub fn sanitize_api_error(input: &str) -> String {
    let scrubbed = scrub_secret_patterns(input);

    if scrubbed.chars().count() <= MAX_API_ERROR_CHARS {
        return scrubbed;
    }

    let mut end = MAX_API_ERROR_CHARS;
    while end > 0 && !scrubbed.is_char_boundary(end) {
        end -= 1;
    }

    format!("{}...", &scrubbed[..end])
}

/// Build a sanitized provider error from a failed HTTP response.
pub async fn api_error(provider: &str, response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read provider error body>".to_string());
    let sanitized = sanitize_api_error(&body);
    anyhow::anyhow!("{provider} API error ({status}): {sanitized}")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Factory: create the right provider from its config name.
///
/// `api_url` overrides the provider's default base URL. `custom:<URL>` selects
/// any OpenAI-compatible endpoint.
pub fn create_provider(
    name: &str,
    api_key: Option<&str>,
    api_url: Option<&str>,
) -> anyhow::Result<Box<dyn Provider>> {
    let key = non_empty(api_key);
    let url_override = non_empty(api_url);

    if let Some(custom_url) = name.strip_prefix("custom:") {
        let base = url_override.unwrap_or(custom_url);
        if base.trim().is_empty() {
            anyhow::bail!("Custom provider requires a URL: custom:<URL>");
        }
        return Ok(Box::new(OpenAiCompatibleProvider::new("Custom", base, key)));
    }

    match name {
        "groq" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "Groq",
            url_override.unwrap_or(GROQ_BASE_URL),
            key,
        ))),
        "openai-compatible" => {
            let Some(base) = url_override else {
                anyhow::bail!("Provider \"openai-compatible\" requires an API URL");
            };
            Ok(Box::new(OpenAiCompatibleProvider::new("OpenAI-compatible", base, key)))
        }
        _ => anyhow::bail!(
            "Unknown provider: {name}. Use \"groq\" or \"custom:<URL>\" for an OpenAI-compatible endpoint."
        ),
    }
}
