use crate::mcp::SessionClient;
use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Owns the MCP client for the lifetime of the chat and closes its sessions
/// exactly once.
///
/// [`SessionGuard::shutdown`] consumes the guard, so a second close cannot be
/// expressed. Dropping the guard without calling it only logs a warning; the
/// server processes are then reaped by `kill_on_drop`.
pub struct SessionGuard<C: SessionClient> {
    client: C,
    shut_down: bool,
}

impl<C: SessionClient> SessionGuard<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            shut_down: false,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Close every open session and report it on `out`. Nothing is printed
    /// when no session was ever opened.
    pub async fn shutdown<W>(mut self, out: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        self.shut_down = true;
        let client = &self.client;

        if !client.has_open_sessions() {
            tracing::debug!(client = client.name(), "No open sessions to close");
            return Ok(());
        }

        let count = client.session_count();
        client.close_all_sessions().await?;
        tracing::info!(client = client.name(), sessions = count, "Closed all sessions");
        out.write_all(b"Closed all sessions.\n").await?;
        out.flush().await?;
        Ok(())
    }
}

impl<C: SessionClient> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        if !self.shut_down && self.client.has_open_sessions() {
            tracing::warn!(
                client = self.client.name(),
                sessions = self.client.session_count(),
                "Session guard dropped without shutdown"
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Client double that counts close calls.
    #[derive(Clone, Default)]
    pub(crate) struct CountingClient {
        pub(crate) open: Arc<AtomicUsize>,
        pub(crate) closes: Arc<AtomicUsize>,
        pub(crate) fail_close: bool,
    }

    impl CountingClient {
        pub(crate) fn with_sessions(count: usize) -> Self {
            let client = Self::default();
            client.open.store(count, Ordering::SeqCst);
            client
        }

        pub(crate) fn close_calls(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionClient for CountingClient {
        fn session_count(&self) -> usize {
            self.open.load(Ordering::SeqCst)
        }

        async fn close_all_sessions(&self) -> anyhow::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.open.store(0, Ordering::SeqCst);
            if self.fail_close {
                anyhow::bail!("server did not exit");
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn shutdown_closes_open_sessions_once() {
        let client = CountingClient::with_sessions(2);
        let guard = SessionGuard::new(client.clone());
        assert_eq!(guard.client().session_count(), 2);

        let mut out = Vec::new();
        guard.shutdown(&mut out).await.unwrap();

        assert_eq!(client.close_calls(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "Closed all sessions.\n");
    }

    #[tokio::test]
    async fn shutdown_without_sessions_is_silent() {
        let client = CountingClient::default();
        let mut out = Vec::new();
        SessionGuard::new(client.clone())
            .shutdown(&mut out)
            .await
            .unwrap();

        assert_eq!(client.close_calls(), 0);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn shutdown_reports_close_failure() {
        let client = CountingClient {
            fail_close: true,
            ..CountingClient::with_sessions(1)
        };
        let mut out = Vec::new();
        let err = SessionGuard::new(client.clone())
            .shutdown(&mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("server did not exit"));
        assert_eq!(client.close_calls(), 1);
        assert!(out.is_empty());
    }

    #[test]
    fn dropping_guard_does_not_close() {
        let client = CountingClient::with_sessions(1);
        drop(SessionGuard::new(client.clone()));
        assert_eq!(client.close_calls(), 0);
    }
}
