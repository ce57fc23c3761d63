//! One complete undercut run.
//!
//! Sign in, resolve the campaign set, build the snapshot, reconcile and
//! dispatch. A run shares a single [`RateLimiter`] and [`CancelToken`] across
//! every call, and the token fires when the run deadline elapses.

use crate::aggregator::{AccountStateAggregator, CampaignFilter};
use crate::auth::{ApiKey, Credentials, CredentialsConfig};
use crate::cancel::CancelToken;
use crate::client::{MarketplaceClient, MarketplaceClientConfig};
use crate::dispatcher::{DispatchMode, UpdateDispatcher, UpdateOutcome};
use crate::error::{MarketplaceError, Result};
use crate::rate_limit::RateLimiter;
use crate::session::{AuthenticatedSession, SessionConfig};
use std::sync::Arc;
use undercut_core::clock::MarketClock;
use undercut_core::config::EngineConfig;
use undercut_core::model::BidUpdate;
use undercut_core::reconciler::BidReconciler;

/// What a run computed and sent.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Every update the reconciler produced.
    pub proposed: Vec<BidUpdate>,
    /// One entry per update sent. Empty for read-only runs.
    pub outcomes: Vec<UpdateOutcome>,
    pub read_only: bool,
    pub campaigns: usize,
    pub bids: usize,
}

impl RunReport {
    /// Updates sent to the marketplace, successful or not. Updates that
    /// failed before a request was made are left out.
    #[must_use]
    pub fn attempted(&self) -> Vec<BidUpdate> {
        self.outcomes
            .iter()
            .filter(|o| o.reached_marketplace())
            .map(|o| o.update.clone())
            .collect()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }
}

pub struct AdsEngine {
    config: EngineConfig,
    credentials: Credentials,
    api_key: ApiKey,
}

impl std::fmt::Debug for AdsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsEngine")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl AdsEngine {
    pub fn new(config: EngineConfig, credentials: Credentials, api_key: ApiKey) -> Self {
        Self {
            config,
            credentials,
            api_key,
        }
    }

    /// Reads credentials from `TJ_USERNAME`, `TJ_PASSWORD` and `TJ_API_KEY`.
    #[must_use]
    pub fn from_env(config: EngineConfig) -> Self {
        let env = CredentialsConfig::default();
        Self::new(config, Credentials::from_env(&env), ApiKey::from_env(&env))
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs once under the configured deadline.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, on sign-in failure, when the active
    /// campaign or campaign listing cannot be fetched, or when the deadline
    /// elapses before dispatch. Per-campaign, per-bid and per-update failures
    /// are logged and do not fail the run.
    pub async fn run_once(&self) -> Result<RunReport> {
        let clock = self
            .config
            .clock()
            .map_err(|e| MarketplaceError::Configuration(e.to_string()))?;
        let limiter = RateLimiter::new(self.config.request_interval())?;
        let cancel = CancelToken::new();

        let deadline = cancel.cancel_after(self.config.run_timeout());
        let result = self.run(clock, limiter, cancel).await;
        deadline.abort();

        match &result {
            Ok(report) => tracing::info!(
                campaigns = report.campaigns,
                bids = report.bids,
                proposed = report.proposed.len(),
                attempted = report.outcomes.len(),
                failed = report.failed(),
                read_only = report.read_only,
                "Run complete"
            ),
            Err(e) => tracing::error!(error = %e, "Run failed"),
        }
        result
    }

    async fn run(
        &self,
        clock: MarketClock,
        limiter: RateLimiter,
        cancel: CancelToken,
    ) -> Result<RunReport> {
        let session = AuthenticatedSession::establish(
            &self.credentials,
            SessionConfig::from_engine(&self.config)?.with_clock(clock),
            limiter.clone(),
            cancel.clone(),
        )
        .await?;

        let client = MarketplaceClient::new(
            MarketplaceClientConfig::from_engine(&self.config),
            self.api_key.clone(),
            limiter,
            cancel.clone(),
        )?;

        // No live active ids means no restriction, same as an empty allow-list
        let filter = if self.config.campaign_allow_list.is_empty() {
            CampaignFilter::from_ids(session.list_active_campaign_ids().await?)
        } else {
            CampaignFilter::from_ids(self.config.campaign_allow_list.iter().cloned())
        };

        let client = Arc::new(client);
        let aggregator = AccountStateAggregator::new(client.clone(), Arc::new(session));
        let state = aggregator.build(&filter).await?;

        // A snapshot cut short by the deadline is degraded everywhere; don't act on it
        if cancel.is_cancelled() {
            return Err(MarketplaceError::Cancelled);
        }

        let reconciler = BidReconciler::new(self.config.undercut_amount, clock);
        let proposed = reconciler.reconcile(&state);
        tracing::info!(
            undercut = %reconciler.undercut(),
            proposed = proposed.len(),
            "Reconciled snapshot"
        );
        for update in &proposed {
            tracing::info!(
                campaign_id = %update.campaign_id,
                bid_id = %update.bid_id,
                previous = %update.previous_bid,
                new = %update.new_bid,
                "Proposed bid update"
            );
        }

        let dispatcher = UpdateDispatcher::new(client, DispatchMode::from_read_only(self.config.read_only))
            .with_retries(self.config.dispatch_retries)
            .with_cancel(cancel);
        let outcomes = dispatcher.dispatch(&proposed).await;

        Ok(RunReport {
            proposed,
            outcomes,
            read_only: dispatcher.mode() == DispatchMode::ReadOnly,
            campaigns: state.len(),
            bids: state.bid_count(),
        })
    }
}
