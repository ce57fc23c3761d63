use crate::client::MarketplaceClient;
use crate::error::Result;
use crate::session::AuthenticatedSession;
use crate::types::{BidSummary, CampaignSummary};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Campaign and bid CRUD.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    async fn list_all_campaigns(&self) -> Result<Vec<CampaignSummary>>;
    async fn list_bids_for_campaign(&self, campaign_id: &str) -> Result<BTreeMap<u32, BidSummary>>;
    async fn set_bid(&self, bid_id: &str, amount: Decimal) -> Result<()>;
}

/// Highest competing bid per placement.
#[async_trait]
pub trait MarketDepthSource: Send + Sync {
    async fn current_max_traffic_bid(&self, bid_id: &str, spot_id: &str) -> Result<Decimal>;
}

#[async_trait]
impl CampaignApi for MarketplaceClient {
    async fn list_all_campaigns(&self) -> Result<Vec<CampaignSummary>> {
        MarketplaceClient::list_all_campaigns(self).await
    }

    async fn list_bids_for_campaign(&self, campaign_id: &str) -> Result<BTreeMap<u32, BidSummary>> {
        MarketplaceClient::list_bids_for_campaign(self, campaign_id).await
    }

    async fn set_bid(&self, bid_id: &str, amount: Decimal) -> Result<()> {
        MarketplaceClient::set_bid(self, bid_id, amount).await
    }
}

#[async_trait]
impl MarketDepthSource for AuthenticatedSession {
    async fn current_max_traffic_bid(&self, bid_id: &str, spot_id: &str) -> Result<Decimal> {
        AuthenticatedSession::current_max_traffic_bid(self, bid_id, spot_id).await
    }
}
