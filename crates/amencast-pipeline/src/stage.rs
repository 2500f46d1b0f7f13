//! The contract every bus-connected stage implements.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use amencast_bus::{BusMessage, Subscription};

use crate::errors::PipelineError;

/// A long-running pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Short name for logs and health output.
    fn name(&self) -> &'static str;

    /// Streams currently holding per-stream state in this stage.
    fn active_streams(&self) -> usize;

    /// Subscribe and process messages until `shutdown` fires.
    ///
    /// Every per-stream task is stopped before this returns. A stage runs
    /// at most once.
    async fn run(&self, shutdown: CancellationToken) -> Result<(), PipelineError>;
}

/// An owned receiver handed out once, when the stage starts running.
pub(crate) struct TakeOnce<T>(Mutex<Option<mpsc::UnboundedReceiver<T>>>);

impl<T> TakeOnce<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self(Mutex::new(Some(rx)))
    }

    pub(crate) fn take(
        &self,
        stage: &'static str,
    ) -> Result<mpsc::UnboundedReceiver<T>, PipelineError> {
        self.0
            .lock()
            .take()
            .ok_or(PipelineError::AlreadyRunning(stage))
    }
}

/// Next bus message, or [`PipelineError::SubscriptionClosed`].
pub(crate) async fn next_message(sub: &mut Subscription) -> Result<BusMessage, PipelineError> {
    sub.recv().await.ok_or(PipelineError::SubscriptionClosed)
}

/// Await and discard every task handle.
pub(crate) async fn join_all(handles: Vec<tokio::task::JoinHandle<()>>) {
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(error = %e, "stream task panicked");
            }
        }
    }
}
