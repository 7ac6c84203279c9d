use super::command::ChatCommand;
use super::guard::SessionGuard;
use crate::agent::ChatAgent;
use crate::mcp::SessionClient;
use anyhow::{Context, Result};
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Why the chat loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Operator typed `exit`
    Exit,
    /// Interrupt fired while reading input or waiting on the agent
    Interrupted,
    /// Input stream closed
    EndOfInput,
}

async fn emit<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Drive the REPL until `exit`, end of input, or `interrupt` resolves.
///
/// Each read and each agent call races the interrupt; an abandoned agent call
/// is simply dropped. Agent errors are printed and the loop keeps going.
pub async fn chat_loop<A, R, W, I>(
    agent: &mut A,
    input: R,
    out: &mut W,
    mut interrupt: Pin<&mut I>,
) -> Result<LoopExit>
where
    A: ChatAgent + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let mut lines = input.lines();

    loop {
        emit(out, "\nYou: ").await?;

        let line = tokio::select! {
            biased;
            () = interrupt.as_mut() => {
                emit(out, "\nInterrupted by user.\n").await?;
                return Ok(LoopExit::Interrupted);
            }
            line = lines.next_line() => line.context("Failed to read operator input")?,
        };

        let Some(line) = line else {
            tracing::debug!("Input closed");
            return Ok(LoopExit::EndOfInput);
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Exit => {
                emit(out, "Exiting...\n").await?;
                return Ok(LoopExit::Exit);
            }
            ChatCommand::Clear => {
                agent.clear_conversation_history();
                emit(out, "Memory cleared.\n").await?;
            }
            ChatCommand::Query(query) => {
                emit(out, "\nAssistant: ").await?;

                let result = tokio::select! {
                    biased;
                    () = interrupt.as_mut() => {
                        emit(out, "\nInterrupted by user.\n").await?;
                        return Ok(LoopExit::Interrupted);
                    }
                    result = agent.run(query) => result,
                };

                match result {
                    Ok(answer) => emit(out, &format!("{answer}\n")).await?,
                    Err(e) => {
                        tracing::warn!(agent = agent.name(), "Agent turn failed: {e:#}");
                        emit(out, &format!("\nError: {e:#}\n")).await?;
                    }
                }
            }
        }
    }
}

/// Run the chat loop, then shut the guard down whatever the outcome.
///
/// A loop error takes precedence over a shutdown error in the return value;
/// both are logged.
pub async fn run<A, C, R, W, I>(
    agent: &mut A,
    guard: SessionGuard<C>,
    input: R,
    out: &mut W,
    interrupt: Pin<&mut I>,
) -> Result<LoopExit>
where
    A: ChatAgent + ?Sized,
    C: SessionClient,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let outcome = chat_loop(agent, input, out, interrupt).await;
    if let Err(e) = &outcome {
        tracing::error!("Chat loop failed: {e:#}");
    }

    let shutdown = guard.shutdown(out).await;
    if let Err(e) = &shutdown {
        tracing::error!("Failed to close sessions: {e:#}");
    }

    let exit = outcome?;
    shutdown.context("Failed to close sessions")?;
    Ok(exit)
}

/// Whole session lifecycle: build the agent with `prepare`, print the banner,
/// run the loop, and close the client's sessions on every path, including a
/// failed `prepare`.
pub async fn start<C, A, P, F, R, W, I>(
    client: C,
    prepare: P,
    input: R,
    out: &mut W,
    interrupt: Pin<&mut I>,
) -> Result<LoopExit>
where
    C: SessionClient + Clone,
    A: ChatAgent,
    P: FnOnce(C) -> F,
    F: Future<Output = Result<A>>,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    I: Future<Output = ()>,
{
    let guard = SessionGuard::new(client.clone());

    let prepared = match prepare(client).await {
        Ok(agent) => super::print_banner(out).await.map(|()| agent),
        Err(e) => Err(e),
    };

    let mut agent = match prepared {
        Ok(agent) => agent,
        Err(e) => {
            tracing::error!("Startup failed: {e:#}");
            if let Err(close_err) = guard.shutdown(out).await {
                tracing::error!("Failed to close sessions: {close_err:#}");
            }
            return Err(e);
        }
    };

    run(&mut agent, guard, input, out, interrupt).await
}
