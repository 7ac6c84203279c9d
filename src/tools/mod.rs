//! Tool surface exposed to the LLM during the agent's reasoning loop.
//!
//! Every tool implements the [`Tool`] trait defined in [`traits`]: a name, a
//! description, a JSON parameter schema, and an async `execute` returning a
//! structured [`ToolResult`]. The chat client does not ship built-in tools;
//! the registry is filled from the MCP servers listed in the config file (see
//! [`crate::mcp::McpClient::tools`]).

pub mod traits;

pub use traits::{Tool, ToolResult, ToolSpec};

/// Collect the LLM-facing specs of a tool registry.
pub fn tool_specs(tools: &[Box<dyn Tool>]) -> Vec<ToolSpec> {
    tools.iter().map(|tool| tool.spec()).collect()
}

/// Find a tool by the name the model used to call it.
pub fn find_tool<'a>(tools: &'a [Box<dyn Tool>], name: &str) -> Option<&'a dyn Tool> {
    tools
        .iter()
        .find(|tool| tool.name() == name)
        .map(|tool| tool.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the `text` argument"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "text": { "type": "string" } },
                "required": ["text"]
            })
        }

        async fn execute(&self, args: serde_json::Value) -> anyhow::Result<ToolResult> {
            Ok(ToolResult::ok(args["text"].as_str().unwrap_or_default()))
        }
    }

    #[test]
    fn tool_spec_generation() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let specs = tool_specs(&tools);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(specs[0].description, "Echo the `text` argument");
        assert!(specs[0].parameters["properties"].is_object());
    }

    #[tokio::test]
    async fn find_tool_by_name() {
        let tools: Vec<Box<dyn Tool>> = vec![Box::new(EchoTool)];
        let tool = find_tool(&tools, "echo").expect("echo should be registered");
        let result = tool
            .execute(serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hi");
        assert!(find_tool(&tools, "missing").is_none());
    }

    #[test]
    fn tool_result_model_text() {
        assert_eq!(ToolResult::ok("done").to_model_text(), "done");
        assert_eq!(ToolResult::failed("boom").to_model_text(), "Error: boom");
        let partial = ToolResult {
            success: false,
            output: "partial".into(),
            error: Some("timeout".into()),
        };
        assert_eq!(partial.to_model_text(), "Error: timeout\npartial");
    }

    #[test]
    fn tool_result_with_error_serde() {
        let result = ToolResult::failed("boom");
        let json = serde_json::to_string(&result).unwrap();
        let parsed: ToolResult = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
    }
}
