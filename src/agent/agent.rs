use super::traits::ChatAgent;
use crate::config::Config;
use crate::providers::{ChatMessage, ChatRequest, Provider, ToolCall};
use crate::tools::{find_tool, tool_specs, Tool, ToolSpec};
use anyhow::Result;
use async_trait::async_trait;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
Use a tool when it helps answer the user's request, then answer from its results. \
If no tool is needed, answer directly.";

/// Tool-using agent: calls the model, runs whatever tools it asks for, and
/// feeds the results back until it answers or runs out of steps.
pub struct McpAgent {
    provider: Box<dyn Provider>,
    tools: Vec<Box<dyn Tool>>,
    tool_specs: Vec<ToolSpec>,
    model: String,
    temperature: f64,
    max_steps: usize,
    memory_enabled: bool,
    max_history_messages: usize,
    system_prompt: String,
    history: Vec<ChatMessage>,
}

pub struct AgentBuilder {
    provider: Option<Box<dyn Provider>>,
    tools: Vec<Box<dyn Tool>>,
    model: Option<String>,
    temperature: f64,
    max_steps: usize,
    memory_enabled: bool,
    max_history_messages: usize,
    system_prompt: Option<String>,
}

impl AgentBuilder {
    pub fn new() -> Self {
        let defaults = crate::config::AgentConfig::default();
        Self {
            provider: None,
            tools: Vec::new(),
            model: None,
            temperature: 0.7,
            max_steps: defaults.max_steps,
            memory_enabled: defaults.memory_enabled,
            max_history_messages: defaults.max_history_messages,
            system_prompt: None,
        }
    }

    pub fn provider(mut self, provider: Box<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Vec<Box<dyn Tool>>) -> Self {
        self.tools = tools;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn memory_enabled(mut self, enabled: bool) -> Self {
        self.memory_enabled = enabled;
        self
    }

    pub fn max_history_messages(mut self, max: usize) -> Self {
        self.max_history_messages = max;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Apply model and agent settings from the runtime config.
    pub fn config(self, config: &Config) -> Self {
        self.model(config.model.clone())
            .temperature(config.temperature)
            .max_steps(config.agent.max_steps)
            .memory_enabled(config.agent.memory_enabled)
            .max_history_messages(config.agent.max_history_messages)
    }

    pub fn build(self) -> Result<McpAgent> {
        let provider = self
            .provider
            .ok_or_else(|| anyhow::anyhow!("provider is required"))?;
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("model is required"))?;
        if self.max_steps == 0 {
            anyhow::bail!("max_steps must be greater than 0");
        }

        let tool_specs = tool_specs(&self.tools);
        Ok(McpAgent {
            provider,
            tools: self.tools,
            tool_specs,
            model,
            temperature: self.temperature,
            max_steps: self.max_steps,
            memory_enabled: self.memory_enabled,
            max_history_messages: self.max_history_messages,
            system_prompt: self
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            history: Vec::new(),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl McpAgent {
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn initial_messages(&self, query: &str) -> Vec<ChatMessage> {
        let retained = if self.memory_enabled {
            self.history.len()
        } else {
            0
        };
        let mut messages = Vec::with_capacity(retained + 2);
        messages.push(ChatMessage::system(self.system_prompt.as_str()));
        if self.memory_enabled {
            messages.extend(self.history.iter().cloned());
        }
        messages.push(ChatMessage::user(query));
        messages
    }

    async fn reason(&self, mut messages: Vec<ChatMessage>) -> Result<String> {
        let tools = (!self.tool_specs.is_empty() && self.provider.supports_native_tools())
            .then_some(self.tool_specs.as_slice());

        for step in 1..=self.max_steps {
            let response = self
                .provider
                .chat(
                    ChatRequest {
                        messages: &messages,
                        tools,
                    },
                    &self.model,
                    self.temperature,
                )
                .await?;

            if !response.has_tool_calls() {
                tracing::debug!(step, "Agent produced final answer");
                return Ok(response.text.unwrap_or_default());
            }

            tracing::debug!(step, calls = response.tool_calls.len(), "Agent requested tools");
            let content = response.text_or_empty().to_string();
            messages.push(ChatMessage::assistant_with_tools(
                content,
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                let output = self.execute_tool_call(call).await;
                messages.push(ChatMessage::tool(call.id.as_str(), output));
            }
        }

        anyhow::bail!(
            "Agent stopped after reaching the maximum number of steps ({})",
            self.max_steps
        )
    }

    /// Run one tool call. Failures become text for the model rather than
    /// aborting the turn.
    async fn execute_tool_call(&self, call: &ToolCall) -> String {
        let Some(tool) = find_tool(&self.tools, &call.name) else {
            tracing::warn!(tool = %call.name, "Model called an unknown tool");
            return format!("Error: unknown tool '{}'", call.name);
        };

        let args: serde_json::Value = match serde_json::from_str(&call.arguments) {
            Ok(args) => args,
            Err(e) => return format!("Error: invalid JSON arguments for '{}': {e}", call.name),
        };

        tracing::info!(tool = %call.name, "Executing tool");
        match tool.execute(args).await {
            Ok(result) => {
                if !result.success {
                    tracing::warn!(tool = %call.name, error = ?result.error, "Tool reported failure");
                }
                result.to_model_text()
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, "Tool execution failed: {e:#}");
                format!("Error: {e}")
            }
        }
    }

    fn remember(&mut self, query: &str, answer: &str) {
        if !self.memory_enabled {
            return;
        }
        self.history.push(ChatMessage::user(query));
        self.history.push(ChatMessage::assistant(answer));

        if self.history.len() > self.max_history_messages {
            let excess = self.history.len() - self.max_history_messages;
            self.history.drain(..excess);
        }
    }
}

#[async_trait]
impl ChatAgent for McpAgent {
    async fn run(&mut self, query: &str) -> Result<String> {
        let messages = self.initial_messages(query);
        let answer = self.reason(messages).await?;
        self.remember(query, &answer);
        Ok(answer)
    }

    fn clear_conversation_history(&mut self) {
        tracing::info!(messages = self.history.len(), "Clearing conversation history");
        self.history.clear();
    }

    fn name(&self) -> &str {
        "mcp"
    }
}
