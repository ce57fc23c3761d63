//! Client for the documented TrafficJunky bid API.
//!
//! Every call carries the `api_key` query parameter, waits on the shared
//! [`RateLimiter`] and races the run's [`CancelToken`].
//!
//! # Example
//!
//! ```ignore
//! use undercut_trafficjunky::{ApiKey, CancelToken, MarketplaceClient, MarketplaceClientConfig, RateLimiter};
//!
//! let client = MarketplaceClient::new(
//!     MarketplaceClientConfig::default(),
//!     ApiKey::new("key"),
//!     RateLimiter::default(),
//!     CancelToken::new(),
//! )?;
//!
//! for campaign in client.list_all_campaigns().await? {
//!     println!("{} {}", campaign.id(), campaign.status);
//! }
//! ```

use crate::auth::ApiKey;
use crate::cancel::CancelToken;
use crate::error::{redact_url, MarketplaceError, Result};
use crate::rate_limit::RateLimiter;
use crate::types::{BidSummary, BidsResponse, CampaignSummary};
use reqwest::{Client, Method, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use undercut_core::config::{EngineConfig, TRAFFICJUNKY_API_URL};

/// Decimal places the API expects on bid prices.
pub const BID_PRICE_SCALE: u32 = 4;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct MarketplaceClientConfig {
    /// Base URL for the documented API.
    pub base_url: String,

    /// Value of the `User-Agent` header.
    pub user_agent: String,

    /// Per-request timeout.
    pub timeout: Duration,

    /// `maxResults` for the campaign listing.
    pub page_size: u32,
}

impl Default for MarketplaceClientConfig {
    fn default() -> Self {
        Self {
            base_url: TRAFFICJUNKY_API_URL.to_string(),
            user_agent: "Chrome".to_string(),
            timeout: Duration::from_secs(30),
            page_size: 300,
        }
    }
}

impl MarketplaceClientConfig {
    #[must_use]
    pub fn from_engine(config: &EngineConfig) -> Self {
        Self {
            base_url: config.endpoints.api_base_url.clone(),
            user_agent: config.http.user_agent.clone(),
            timeout: config.request_timeout(),
            page_size: config.campaign_page_size,
        }
    }

    /// Sets the base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

// =============================================================================
// MarketplaceClient
// =============================================================================

/// Stateless API-key client. Cheap to clone.
#[derive(Clone)]
pub struct MarketplaceClient {
    config: MarketplaceClientConfig,
    http: Client,
    api_key: ApiKey,
    limiter: RateLimiter,
    cancel: CancelToken,
}

impl std::fmt::Debug for MarketplaceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceClient")
            .field("base_url", &self.config.base_url)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl MarketplaceClient {
    /// # Errors
    ///
    /// Returns a network error if the HTTP client cannot be built.
    pub fn new(
        config: MarketplaceClientConfig,
        api_key: ApiKey,
        limiter: RateLimiter,
        cancel: CancelToken,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MarketplaceError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            api_key,
            limiter,
            cancel,
        })
    }

    /// Validates an identifier before it is placed in a URL path.
    ///
    /// Marketplace ids are numeric; anything that could alter the path is
    /// rejected.
    pub fn validate_identifier(id: &str) -> Result<&str> {
        if id.is_empty() {
            return Err(MarketplaceError::InvalidIdentifier(
                "identifier cannot be empty".to_string(),
            ));
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(MarketplaceError::InvalidIdentifier(format!(
                "must contain only alphanumeric, hyphen, or underscore: {id}"
            )));
        }

        if id.len() > 64 {
            return Err(MarketplaceError::InvalidIdentifier(format!(
                "exceeds maximum length of 64: {}",
                id.len()
            )));
        }

        Ok(id)
    }

    /// Builds `base_url + path` with the API key and `params` in the query.
    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let raw = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut url = Url::parse(&raw)
            .map_err(|e| MarketplaceError::Configuration(format!("invalid API URL '{raw}': {e}")))?;

        url.query_pairs_mut()
            .append_pair("api_key", self.api_key.expose())
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        Ok(url)
    }

    /// Waits for the limiter, sends the request and checks the status.
    async fn send(&self, method: Method, url: Url) -> Result<reqwest::Response> {
        self.limiter.wait(&self.cancel).await?;

        tracing::debug!(%method, url = %redact_url(&url), "API request");

        let response = self
            .cancel
            .guard(async {
                Ok::<_, MarketplaceError>(self.http.request(method, url.clone()).send().await?)
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::http(&url, status.as_u16()));
        }

        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.send(Method::GET, url).await?;
        self.cancel
            .guard(async { Ok::<_, MarketplaceError>(response.json::<T>().await?) })
            .await
    }

    // =========================================================================
    // Campaign Endpoints
    // =========================================================================

    /// Lists every campaign on the account.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error on non-2xx, or a malformed response error if the
    /// body is not a campaign list.
    pub async fn list_all_campaigns(&self) -> Result<Vec<CampaignSummary>> {
        let url = self.url(
            "/api/campaigns.json",
            &[("maxResults", self.config.page_size.to_string())],
        )?;

        let campaigns: Vec<CampaignSummary> = self.get(url).await?;
        tracing::debug!(count = campaigns.len(), "Listed campaigns");
        Ok(campaigns)
    }

    /// Lists the bids of one campaign, keyed by row index.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error on non-2xx, or a malformed response error if the
    /// body does not decode.
    pub async fn list_bids_for_campaign(
        &self,
        campaign_id: &str,
    ) -> Result<BTreeMap<u32, BidSummary>> {
        let campaign_id = Self::validate_identifier(campaign_id)?;
        let url = self.url(&format!("/api/bids/{campaign_id}.json"), &[])?;

        let response: BidsResponse = self.get(url).await?;
        Ok(response.bids)
    }

    // =========================================================================
    // Bid Endpoints
    // =========================================================================

    /// Sets a bid's price. Any 2xx is success and the body is discarded.
    ///
    /// # Errors
    ///
    /// Returns an HTTP error on non-2xx.
    pub async fn set_bid(&self, bid_id: &str, amount: Decimal) -> Result<()> {
        let bid_id = Self::validate_identifier(bid_id)?;
        let url = self.url(
            &format!("/api/bids/{bid_id}/set.json"),
            &[("bid", format_bid_price(amount))],
        )?;

        self.send(Method::PUT, url).await?;
        Ok(())
    }
}

/// Formats a price with the four decimal places the API expects.
#[must_use]
pub fn format_bid_price(amount: Decimal) -> String {
    format!("{:.4}", amount.round_dp(BID_PRICE_SCALE))
}
