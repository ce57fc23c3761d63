//! Applies bid updates to the marketplace.
//!
//! Updates are sent one at a time in the order given; the API handle waits on
//! the shared rate limiter before each call. A failed update is logged and
//! recorded in its [`UpdateOutcome`] and never stops the batch.

use crate::cancel::CancelToken;
use crate::error::MarketplaceError;
use crate::traits::CampaignApi;
use std::sync::Arc;
use std::time::Duration;
use undercut_core::model::BidUpdate;

/// Whether updates are sent or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    #[default]
    Live,
    ReadOnly,
}

impl DispatchMode {
    #[must_use]
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            Self::ReadOnly
        } else {
            Self::Live
        }
    }
}

/// Result of sending one update.
#[derive(Debug)]
pub struct UpdateOutcome {
    pub update: BidUpdate,
    /// Calls made for this update, retries included.
    pub attempts: u32,
    /// Last error, `None` on success.
    pub error: Option<MarketplaceError>,
}

impl UpdateOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// False when the update failed before any request left the process:
    /// a rejected identifier, or cancellation while waiting to send.
    #[must_use]
    pub fn reached_marketplace(&self) -> bool {
        !matches!(
            self.error,
            Some(MarketplaceError::Cancelled | MarketplaceError::InvalidIdentifier(_))
        )
    }
}

pub struct UpdateDispatcher {
    api: Arc<dyn CampaignApi>,
    mode: DispatchMode,
    retries: u32,
    retry_delay: Option<Duration>,
    cancel: CancelToken,
}

impl std::fmt::Debug for UpdateDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateDispatcher")
            .field("mode", &self.mode)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl UpdateDispatcher {
    pub fn new(api: Arc<dyn CampaignApi>, mode: DispatchMode) -> Self {
        Self {
            api,
            mode,
            retries: 0,
            retry_delay: None,
            cancel: CancelToken::new(),
        }
    }

    /// Extra attempts for an update that failed with a transient error.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Fixed pause between retries instead of the error's suggested delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Token that interrupts retry pauses.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Sends every update and returns one outcome per attempted update.
    ///
    /// In read-only mode nothing is sent and the result is empty.
    pub async fn dispatch(&self, updates: &[BidUpdate]) -> Vec<UpdateOutcome> {
        if self.mode == DispatchMode::ReadOnly {
            tracing::info!(proposed = updates.len(), "Read-only run, not sending updates");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(updates.len());
        for update in updates {
            outcomes.push(self.send(update).await);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(
            attempted = outcomes.len(),
            failed,
            "Dispatched bid updates"
        );
        outcomes
    }

    async fn send(&self, update: &BidUpdate) -> UpdateOutcome {
        let mut attempts = 0;

        let error = loop {
            attempts += 1;

            let err = match self.api.set_bid(&update.bid_id, update.new_bid).await {
                Ok(()) => {
                    tracing::info!(
                        campaign_id = %update.campaign_id,
                        bid_id = %update.bid_id,
                        previous = %update.previous_bid,
                        new = %update.new_bid,
                        "Updated bid"
                    );
                    break None;
                }
                Err(e) => e,
            };

            if !err.is_transient() || attempts > self.retries {
                tracing::error!(
                    campaign_id = %update.campaign_id,
                    bid_id = %update.bid_id,
                    attempts,
                    error = %err,
                    "Failed to update bid"
                );
                break Some(err);
            }

            let delay = self.retry_delay.unwrap_or_else(|| {
                Duration::from_millis(err.retry_delay_ms().unwrap_or(1000))
            });
            tracing::warn!(bid_id = %update.bid_id, attempts, ?delay, error = %err, "Retrying bid update");

            let paused = self
                .cancel
                .guard(async {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await;
            if let Err(cancelled) = paused {
                break Some(cancelled);
            }
        };

        UpdateOutcome {
            update: update.clone(),
            attempts,
            error,
        }
    }
}
