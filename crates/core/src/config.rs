use crate::clock::{MarketClock, DEFAULT_TIME_ZONE};
use crate::reconciler::DEFAULT_UNDERCUT;
use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Documented bid/campaign API.
pub const TRAFFICJUNKY_API_URL: &str = "https://api.trafficjunky.com";

/// Public site hosting the sign-in form.
pub const TRAFFICJUNKY_SITE_URL: &str = "https://www.trafficjunky.com";

/// Member area serving the AJAX endpoints.
pub const TRAFFICJUNKY_MEMBERS_URL: &str = "https://members.trafficjunky.com";

/// Parameters for a single engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Margin subtracted from the best competing bid.
    pub undercut_amount: Decimal,
    /// Campaign ids to consider. Empty means every live active campaign.
    pub campaign_allow_list: Vec<String>,
    /// Compute updates without sending them.
    pub read_only: bool,
    /// IANA name of the marketplace time zone.
    pub time_zone: String,
    /// Deadline for the whole run.
    pub run_timeout_secs: u64,
    /// Extra attempts for a bid update that failed transiently.
    pub dispatch_retries: u32,
    /// `maxResults` for the campaign listing.
    pub campaign_page_size: u32,
    pub rate_limit: RateLimitConfig,
    pub http: HttpConfig,
    pub endpoints: EndpointConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Minimum spacing between any two marketplace calls.
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub api_base_url: String,
    pub site_base_url: String,
    pub members_base_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undercut_amount: DEFAULT_UNDERCUT,
            campaign_allow_list: Vec::new(),
            read_only: false,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            run_timeout_secs: 600,
            dispatch_retries: 0,
            campaign_page_size: 300,
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { interval_ms: 300 }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            user_agent: "Chrome".to_string(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_base_url: TRAFFICJUNKY_API_URL.to_string(),
            site_base_url: TRAFFICJUNKY_SITE_URL.to_string(),
            members_base_url: TRAFFICJUNKY_MEMBERS_URL.to_string(),
        }
    }
}

impl EndpointConfig {
    /// Points all three endpoints at one base URL (useful for testing).
    #[must_use]
    pub fn single(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_base_url: base_url.clone(),
            site_base_url: base_url.clone(),
            members_base_url: base_url,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_undercut(mut self, amount: Decimal) -> Self {
        self.undercut_amount = amount;
        self
    }

    #[must_use]
    pub fn with_campaign_allow_list<I, S>(mut self, campaign_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.campaign_allow_list = campaign_ids.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    #[must_use]
    pub fn with_rate_limit_interval(mut self, interval: Duration) -> Self {
        self.rate_limit.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[must_use]
    pub fn with_dispatch_retries(mut self, retries: u32) -> Self {
        self.dispatch_retries = retries;
        self
    }

    #[must_use]
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit.interval_ms)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    #[must_use]
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Builds the marketplace clock from `time_zone`.
    ///
    /// # Errors
    ///
    /// Returns an error if `time_zone` is not a known IANA zone.
    pub fn clock(&self) -> Result<MarketClock> {
        MarketClock::from_name(&self.time_zone)
    }

    /// Checks values that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.undercut_amount.is_sign_negative() {
            bail!("undercut_amount must not be negative: {}", self.undercut_amount);
        }
        if self.rate_limit.interval_ms == 0 {
            bail!("rate_limit.interval_ms must be positive");
        }
        if self.run_timeout_secs == 0 {
            bail!("run_timeout_secs must be positive");
        }
        if self.campaign_page_size == 0 {
            bail!("campaign_page_size must be positive");
        }
        self.clock()?;
        Ok(())
    }
}
