//! Account snapshot and bid update types.
//!
//! All prices use `rust_decimal::Decimal`. The marketplace expects bid prices
//! with four decimal places.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Marketplace campaign id, kept as a string across JSON sources.
pub type CampaignId = String;

/// Marketplace bid (placement) id.
pub type BidId = String;

// =============================================================================
// Bid
// =============================================================================

/// One of our bids on an ad spot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bid {
    /// Bid identifier.
    pub bid_id: BidId,

    /// Our current price.
    pub amount: Decimal,

    /// Spot this bid targets.
    pub spot_id: String,

    /// True when the bid is active and not paused.
    pub is_active: bool,

    /// Highest competing price on the spot. Zero when inactive or unknown.
    pub current_max_traffic_bid: Decimal,
}

impl Bid {
    /// Creates a bid. An inactive bid never carries a competing price.
    #[must_use]
    pub fn new(
        bid_id: impl Into<BidId>,
        amount: Decimal,
        spot_id: impl Into<String>,
        is_active: bool,
        current_max_traffic_bid: Decimal,
    ) -> Self {
        Self {
            bid_id: bid_id.into(),
            amount,
            spot_id: spot_id.into(),
            is_active,
            current_max_traffic_bid: if is_active {
                current_max_traffic_bid
            } else {
                Decimal::ZERO
            },
        }
    }

    /// Returns true if a competing price is known for this bid's spot.
    #[must_use]
    pub fn has_market(&self) -> bool {
        !self.current_max_traffic_bid.is_zero()
    }
}

// =============================================================================
// Campaign
// =============================================================================

/// A campaign and the bids it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    pub campaign_id: CampaignId,
    pub name: String,
    pub is_active: bool,
    pub bids: HashMap<BidId, Bid>,
}

impl Campaign {
    #[must_use]
    pub fn new(
        campaign_id: impl Into<CampaignId>,
        name: impl Into<String>,
        is_active: bool,
        bids: impl IntoIterator<Item = Bid>,
    ) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            name: name.into(),
            is_active,
            bids: bids.into_iter().map(|b| (b.bid_id.clone(), b)).collect(),
        }
    }

    #[must_use]
    pub fn active_bid_count(&self) -> usize {
        self.bids.values().filter(|b| b.is_active).count()
    }
}

// =============================================================================
// AccountState
// =============================================================================

/// Immutable snapshot of all campaigns considered in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountState {
    campaigns: HashMap<CampaignId, Campaign>,
}

impl AccountState {
    #[must_use]
    pub fn campaign(&self, campaign_id: &str) -> Option<&Campaign> {
        self.campaigns.get(campaign_id)
    }

    pub fn campaigns(&self) -> impl Iterator<Item = &Campaign> {
        self.campaigns.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    #[must_use]
    pub fn bid_count(&self) -> usize {
        self.campaigns.values().map(|c| c.bids.len()).sum()
    }
}

impl FromIterator<Campaign> for AccountState {
    fn from_iter<I: IntoIterator<Item = Campaign>>(iter: I) -> Self {
        Self {
            campaigns: iter
                .into_iter()
                .map(|c| (c.campaign_id.clone(), c))
                .collect(),
        }
    }
}

// =============================================================================
// BidUpdate
// =============================================================================

/// A proposed or executed price change for one bid.
///
/// Serialized as one self-contained JSON object per update-log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidUpdate {
    pub campaign_id: CampaignId,
    pub bid_id: BidId,
    #[serde(with = "rust_decimal::serde::float")]
    pub previous_bid: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_bid: Decimal,
    /// Marketplace-local time the update was computed, see [`crate::clock::TIMESTAMP_FORMAT`].
    pub timestamp: String,
}

impl BidUpdate {
    /// Signed change from the previous price.
    #[must_use]
    pub fn delta(&self) -> Decimal {
        self.new_bid - self.previous_bid
    }
}
