//! Builds one [`AccountState`] per run.
//!
//! Campaigns are fetched concurrently, one task per campaign, all sharing the
//! run's rate limiter through the API handles. Each task owns the
//! [`Campaign`] it builds; the snapshot is assembled only after every task has
//! been joined.

use crate::error::Result;
use crate::traits::{CampaignApi, MarketDepthSource};
use crate::types::BidSummary;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use undercut_core::model::{AccountState, Bid, Campaign, CampaignId};

// =============================================================================
// CampaignFilter
// =============================================================================

/// Which campaigns a snapshot covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignFilter {
    /// Every campaign on the account.
    All,
    /// Only these campaign ids.
    Only(HashSet<CampaignId>),
}

impl CampaignFilter {
    /// Allow-list semantics: an empty list means every campaign.
    #[must_use]
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<CampaignId>,
    {
        let ids: HashSet<CampaignId> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            Self::All
        } else {
            Self::Only(ids)
        }
    }

    #[must_use]
    pub fn allows(&self, campaign_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(ids) => ids.contains(campaign_id),
        }
    }
}

// =============================================================================
// AccountStateAggregator
// =============================================================================

pub struct AccountStateAggregator {
    api: Arc<dyn CampaignApi>,
    depth: Arc<dyn MarketDepthSource>,
}

impl std::fmt::Debug for AccountStateAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountStateAggregator").finish_non_exhaustive()
    }
}

impl AccountStateAggregator {
    pub fn new(api: Arc<dyn CampaignApi>, depth: Arc<dyn MarketDepthSource>) -> Self {
        Self { api, depth }
    }

    /// Fetches every campaign allowed by `filter` with its bids and the
    /// competing price on each active bid's spot.
    ///
    /// Per-campaign and per-bid failures are logged and degraded: a campaign
    /// whose bids cannot be listed keeps zero bids, a bid whose competing
    /// price cannot be fetched keeps a competing price of zero.
    ///
    /// # Errors
    ///
    /// Only a failure of the campaign listing itself is returned.
    pub async fn build(&self, filter: &CampaignFilter) -> Result<AccountState> {
        let summaries = self.api.list_all_campaigns().await?;
        let now = Utc::now();

        let handles: Vec<_> = summaries
            .into_iter()
            .filter(|summary| filter.allows(&summary.id()))
            .map(|summary| {
                let id = summary.id();
                let is_active = summary.is_active_at(now);
                let task = tokio::spawn(fetch_campaign(
                    Arc::clone(&self.api),
                    Arc::clone(&self.depth),
                    id.clone(),
                    summary.name.clone(),
                    is_active,
                ));
                (id, summary.name, is_active, task)
            })
            .collect();

        tracing::info!(campaigns = handles.len(), "Fetching campaign bids");

        let mut campaigns = Vec::with_capacity(handles.len());
        for (id, name, is_active, task) in handles {
            match task.await {
                Ok(campaign) => campaigns.push(campaign),
                Err(e) => {
                    tracing::error!(campaign_id = %id, error = %e, "Campaign task failed, keeping it with no bids");
                    campaigns.push(Campaign::new(id, name, is_active, Vec::new()));
                }
            }
        }

        let state: AccountState = campaigns.into_iter().collect();
        tracing::info!(
            campaigns = state.len(),
            bids = state.bid_count(),
            "Built account snapshot"
        );
        Ok(state)
    }
}

async fn fetch_campaign(
    api: Arc<dyn CampaignApi>,
    depth: Arc<dyn MarketDepthSource>,
    campaign_id: CampaignId,
    name: String,
    is_active: bool,
) -> Campaign {
    let rows = match api.list_bids_for_campaign(&campaign_id).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(campaign_id = %campaign_id, error = %e, "Could not list bids, keeping campaign with no bids");
            Default::default()
        }
    };
    tracing::info!(campaign_id = %campaign_id, bids = rows.len(), "Got bids for campaign");

    let mut bids = Vec::with_capacity(rows.len());
    for summary in rows.into_values() {
        if let Some(bid) = enrich_bid(depth.as_ref(), &campaign_id, summary).await {
            bids.push(bid);
        }
    }

    let campaign = Campaign::new(campaign_id, name, is_active, bids);
    tracing::debug!(
        campaign_id = %campaign.campaign_id,
        live_bids = campaign.active_bid_count(),
        "Done processing campaign"
    );
    campaign
}

/// Converts a bid row, looking up the competing price when the bid is live.
/// Rows with an unparseable amount are dropped.
async fn enrich_bid(
    depth: &dyn MarketDepthSource,
    campaign_id: &str,
    summary: BidSummary,
) -> Option<Bid> {
    let amount = match summary.parsed_amount() {
        Ok(amount) => amount,
        Err(e) => {
            tracing::error!(campaign_id, bid_id = %summary.bid_id, error = %e, "Skipping bid");
            return None;
        }
    };

    let is_live = summary.is_live();
    let competing = if is_live {
        match depth
            .current_max_traffic_bid(&summary.bid_id, &summary.spot_id)
            .await
        {
            Ok(price) => price,
            Err(e) => {
                tracing::error!(
                    campaign_id,
                    bid_id = %summary.bid_id,
                    spot_id = %summary.spot_id,
                    error = %e,
                    "Could not fetch current max bid"
                );
                Decimal::ZERO
            }
        }
    } else {
        Decimal::ZERO
    };

    Some(Bid::new(
        summary.bid_id,
        amount,
        summary.spot_id,
        is_live,
        competing,
    ))
}
