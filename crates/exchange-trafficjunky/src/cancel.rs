//! Run-scoped cancellation.
//!
//! Every network call and rate-limiter wait races a [`CancelToken`], so a run
//! that exceeds its deadline unwinds instead of hanging on a stalled request.

use crate::error::{MarketplaceError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Cancels this token and every clone of it.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone of this token, so this only errors on teardown
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Cancels the token after `deadline` unless the returned task is aborted first.
    pub fn cancel_after(&self, deadline: Duration) -> JoinHandle<()> {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(?deadline, "Run deadline reached, cancelling");
            token.cancel();
        })
    }

    /// Runs `fut` unless the token is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceError::Cancelled`] if the token fires before `fut`
    /// completes, otherwise whatever `fut` returns.
    pub async fn guard<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(MarketplaceError::Cancelled);
        }

        tokio::select! {
            biased;
            () = self.cancelled() => Err(MarketplaceError::Cancelled),
            result = fut => result,
        }
    }
}
