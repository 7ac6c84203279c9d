//! Agent interface consumed by the interactive chat loop.

use async_trait::async_trait;

/// A conversational agent: one query in, one answer out.
///
/// Implement this trait to put a different reasoning strategy (or a test
/// double) behind the REPL. History retention is the agent's business; the
/// loop only asks for it to be cleared.
#[async_trait]
pub trait ChatAgent: Send {
    /// Answer a single user query. Errors are reported to the operator and the
    /// session continues.
    async fn run(&mut self, query: &str) -> anyhow::Result<String>;

    /// Forget the retained conversation.
    fn clear_conversation_history(&mut self);

    fn name(&self) -> &str {
        "agent"
    }
}
