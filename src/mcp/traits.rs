use async_trait::async_trait;
use std::sync::Arc;

/// Owner of the live tool-provider sessions.
///
/// The chat loop only needs to know whether anything is open and how to close
/// it; how sessions are created is up to the implementation.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Number of sessions currently open.
    fn session_count(&self) -> usize;

    /// Close every open session. A second call finds nothing to close.
    async fn close_all_sessions(&self) -> anyhow::Result<()>;

    fn name(&self) -> &str;

    fn has_open_sessions(&self) -> bool {
        self.session_count() > 0
    }
}

#[async_trait]
impl<T: SessionClient + ?Sized> SessionClient for Arc<T> {
    fn session_count(&self) -> usize {
        (**self).session_count()
    }

    async fn close_all_sessions(&self) -> anyhow::Result<()> {
        (**self).close_all_sessions().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
