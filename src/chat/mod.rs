//! Interactive chat session: reads operator input, forwards queries to a
//! [`ChatAgent`](crate::agent::ChatAgent), and closes the tool sessions on the
//! way out.

pub mod command;
pub mod guard;
pub mod loop_;

pub use command::ChatCommand;
pub use guard::SessionGuard;
pub use loop_::{chat_loop, run, start, LoopExit};

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const BANNER: &str = "\n=== Interactive MCP Chat ===\n\
Enter 'exit' to end the chat.\n\
Enter 'clear' to clear the memory.\n\
====================================\n";

pub async fn print_banner<W: AsyncWrite + Unpin>(out: &mut W) -> Result<()> {
    out.write_all(BANNER.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn banner_lists_commands() {
        let mut out = Vec::new();
        print_banner(&mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("\n=== Interactive MCP Chat ===\n"));
        assert!(text.contains("Enter 'exit' to end the chat.\n"));
        assert!(text.contains("Enter 'clear' to clear the memory.\n"));
        assert!(text.ends_with("====================================\n"));
    }
}
