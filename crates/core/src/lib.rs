pub mod clock;
pub mod config;
pub mod config_loader;
pub mod model;
pub mod reconciler;
pub mod run_state;
pub mod update_log;

pub use clock::{MarketClock, DATE_FORMAT, DEFAULT_TIME_ZONE, TIMESTAMP_FORMAT};
pub use config::{EndpointConfig, EngineConfig, HttpConfig, RateLimitConfig};
pub use config_loader::ConfigLoader;
pub use model::{AccountState, Bid, BidId, BidUpdate, Campaign, CampaignId};
pub use reconciler::{BidReconciler, CLOSE_ENOUGH, DEFAULT_UNDERCUT};
pub use run_state::RunState;
pub use update_log::UpdateLog;
