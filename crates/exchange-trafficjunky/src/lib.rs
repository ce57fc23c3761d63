//! TrafficJunky integration for the bid undercut engine.
//!
//! This crate provides:
//! - A shared fixed-interval rate limiter and run-scoped cancellation
//! - A cookie-authenticated member-site session for competing bid lookups
//! - An API-key client for the documented campaign and bid API
//! - Concurrent account snapshot aggregation and sequential update dispatch
//! - [`AdsEngine`], which ties one run together
//!
//! # Example
//!
//! ```ignore
//! use undercut_core::ConfigLoader;
//! use undercut_trafficjunky::AdsEngine;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?.with_read_only(true);
//!     let report = AdsEngine::from_env(config).run_once().await?;
//!     println!("{} updates proposed", report.proposed.len());
//!     Ok(())
//! }
//! ```
//!
//! # Authentication
//!
//! Set the following environment variables:
//!
//! - `TJ_USERNAME` / `TJ_PASSWORD`: member-site login
//! - `TJ_API_KEY`: key for the documented API
//!
//! # Endpoints
//!
//! - `GET /sign-in`, `POST /login` (site)
//! - `GET /campaign/ajaxlistv5` (members)
//! - `GET /campaign/viewbids/placementlist/` (members)
//! - `GET /api/campaigns.json` (API)
//! - `GET /api/bids/{campaign_id}.json` (API)
//! - `PUT /api/bids/{bid_id}/set.json` (API)

pub mod aggregator;
pub mod auth;
pub mod cancel;
pub mod client;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod rate_limit;
pub mod session;
pub mod traits;
pub mod types;

// Re-export main types for convenience
pub use aggregator::{AccountStateAggregator, CampaignFilter};
pub use auth::{ApiKey, Credentials, CredentialsConfig};
pub use cancel::CancelToken;
pub use client::{format_bid_price, MarketplaceClient, MarketplaceClientConfig};
pub use dispatcher::{DispatchMode, UpdateDispatcher, UpdateOutcome};
pub use engine::{AdsEngine, RunReport};
pub use error::{MarketplaceError, Result};
pub use rate_limit::{RateLimiter, DEFAULT_REQUEST_INTERVAL};
pub use session::{AuthenticatedSession, SessionConfig};
pub use traits::{CampaignApi, MarketDepthSource};
pub use types::{BidSummary, CampaignSummary};
