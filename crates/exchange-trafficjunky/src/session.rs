//! Cookie-authenticated session against the member site.
//!
//! The member site has no API for competing bids, so the session signs in the
//! way a browser does: fetch the sign-in page, scrape the `_token` form field,
//! post it back with the credentials and keep the resulting cookies. The AJAX
//! endpoints then answer DataTables JSON.

use crate::auth::Credentials;
use crate::cancel::CancelToken;
use crate::error::{MarketplaceError, Result};
use crate::rate_limit::RateLimiter;
use crate::types::{table_rows, CampaignRow, PlacementRow};
use chrono::Utc;
use regex::Regex;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde_json::Value;
use std::time::Duration;
use undercut_core::clock::{MarketClock, DATE_FORMAT};
use undercut_core::config::{EngineConfig, TRAFFICJUNKY_MEMBERS_URL, TRAFFICJUNKY_SITE_URL};
use undercut_core::model::CampaignId;

/// Days covered by the dashboard listing.
pub const DASHBOARD_WINDOW_DAYS: i64 = 28;

/// Country the placement bid listing is requested for.
pub const PLACEMENT_COUNTRY: &str = "US";

/// Columns of the dashboard DataTable, in request order.
const DASHBOARD_COLUMNS: [&str; 18] = [
    "id",
    "campaignStatusString",
    "id",
    "campaignPermissionList",
    "name",
    "cookieTargeting",
    "adCount",
    "placementCount",
    "daily_budget",
    "daily_budget_left_display",
    "impressions",
    "clicks",
    "ctr",
    "conversions",
    "cost",
    "ecpm",
    "ecpc",
    "jsonLabels",
];

/// Dashboard columns the table can sort on.
fn is_sortable(column: usize) -> bool {
    matches!(column, 2 | 4 | 8..=16)
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Site hosting `/sign-in` and `/login`.
    pub site_base_url: String,

    /// Member area hosting the AJAX endpoints.
    pub members_base_url: String,

    pub user_agent: String,

    pub timeout: Duration,

    /// Time zone the dashboard window is computed in.
    pub clock: MarketClock,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            site_base_url: TRAFFICJUNKY_SITE_URL.to_string(),
            members_base_url: TRAFFICJUNKY_MEMBERS_URL.to_string(),
            user_agent: "Chrome".to_string(),
            timeout: Duration::from_secs(30),
            clock: MarketClock::default(),
        }
    }
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns a configuration error if the configured time zone is unknown.
    pub fn from_engine(config: &EngineConfig) -> Result<Self> {
        let clock = config
            .clock()
            .map_err(|e| MarketplaceError::Configuration(e.to_string()))?;

        Ok(Self {
            site_base_url: config.endpoints.site_base_url.clone(),
            members_base_url: config.endpoints.members_base_url.clone(),
            user_agent: config.http.user_agent.clone(),
            timeout: config.request_timeout(),
            clock,
        })
    }

    /// Points both the site and member area at one URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.site_base_url = url.clone();
        self.members_base_url = url;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: MarketClock) -> Self {
        self.clock = clock;
        self
    }
}

// =============================================================================
// AuthenticatedSession
// =============================================================================

/// A signed-in member-site session.
///
/// Only obtainable through [`AuthenticatedSession::establish`]; there is no
/// re-login, a rejected session surfaces as failing AJAX calls.
pub struct AuthenticatedSession {
    config: SessionConfig,
    http: Client,
    limiter: RateLimiter,
    cancel: CancelToken,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("members_base_url", &self.config.members_base_url)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedSession {
    /// Signs in and returns the authenticated session.
    ///
    /// The login POST is not checked for success beyond a 2xx status.
    ///
    /// # Errors
    ///
    /// - [`MarketplaceError::MissingCredentials`] if username or password is empty
    /// - [`MarketplaceError::TokenNotFound`] if the sign-in page has no `_token`
    /// - [`MarketplaceError::Http`] / [`MarketplaceError::Network`] on transport failure
    pub async fn establish(
        credentials: &Credentials,
        config: SessionConfig,
        limiter: RateLimiter,
        cancel: CancelToken,
    ) -> Result<Self> {
        credentials.validate()?;

        let http = Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MarketplaceError::Network(format!("failed to build HTTP client: {e}")))?;

        let session = Self {
            config,
            http,
            limiter,
            cancel,
        };

        let sign_in = session.url(&session.config.site_base_url, "/sign-in")?;
        let page = session.fetch_text(sign_in).await?;
        let token = scrape_login_token(&page)?.ok_or(MarketplaceError::TokenNotFound)?;

        let login = session.url(&session.config.site_base_url, "/login")?;
        session
            .post_form(
                login,
                &[
                    ("_token", token.as_str()),
                    ("username", credentials.username()),
                    ("password", credentials.password()),
                ],
            )
            .await?;

        tracing::info!("Signed in to member site");
        Ok(session)
    }

    fn url(&self, base: &str, path: &str) -> Result<Url> {
        let raw = format!("{}{}", base.trim_end_matches('/'), path);
        Url::parse(&raw)
            .map_err(|e| MarketplaceError::Configuration(format!("invalid site URL '{raw}': {e}")))
    }

    /// Waits for the limiter, sends the request and checks the status.
    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response> {
        self.limiter.wait(&self.cancel).await?;

        let response = self
            .cancel
            .guard(async { Ok::<_, MarketplaceError>(request.send().await?) })
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MarketplaceError::http(url, status.as_u16()));
        }
        Ok(response)
    }

    async fn fetch_text(&self, url: Url) -> Result<String> {
        tracing::debug!(%url, "GET");
        let response = self.send(self.http.get(url.clone()), &url).await?;
        self.cancel
            .guard(async { Ok::<_, MarketplaceError>(response.text().await?) })
            .await
    }

    async fn fetch_json(&self, url: Url) -> Result<Value> {
        tracing::debug!(%url, "GET");
        let response = self.send(self.http.get(url.clone()), &url).await?;
        self.cancel
            .guard(async { Ok::<_, MarketplaceError>(response.json::<Value>().await?) })
            .await
    }

    async fn post_form(&self, url: Url, form: &[(&str, &str)]) -> Result<()> {
        tracing::debug!(%url, "POST form");
        self.send(self.http.post(url.clone()).form(form), &url)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Lists ids of campaigns the dashboard reports as `active` over the
    /// trailing 28 days.
    ///
    /// # Errors
    ///
    /// Returns a malformed response error if the row list or a row's `id` or
    /// `status` field is missing or mistyped.
    pub async fn list_active_campaign_ids(&self) -> Result<Vec<CampaignId>> {
        const CONTEXT: &str = "campaign dashboard listing";

        let mut url = self.url(&self.config.members_base_url, "/campaign/ajaxlistv5")?;
        url.query_pairs_mut()
            .extend_pairs(dashboard_query(&self.config.clock, Utc::now()));

        let rows = table_rows(CONTEXT, self.fetch_json(url).await?)?;

        let mut ids = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            let row = CampaignRow::from_value(CONTEXT, index, row)?;
            if row.is_active() {
                ids.push(row.id.to_string());
            }
        }

        tracing::info!(count = ids.len(), rows = rows.len(), "Listed active campaigns");
        Ok(ids)
    }

    // =========================================================================
    // Placements
    // =========================================================================

    /// Returns the highest competing bid on a bid's spot, or zero when the
    /// placement has no competing rows.
    ///
    /// # Errors
    ///
    /// Transport and HTTP failures are returned, not folded into zero. A first
    /// row without a `"<label>$<amount>"` price column is malformed.
    pub async fn current_max_traffic_bid(&self, bid_id: &str, spot_id: &str) -> Result<Decimal> {
        let context = format!("placement list for bid {bid_id} spot {spot_id}");

        let mut url = self.url(&self.config.members_base_url, "/campaign/viewbids/placementlist/")?;
        url.query_pairs_mut()
            .append_pair("placementId", bid_id)
            .append_pair("spotId", spot_id)
            .append_pair("countryCode", PLACEMENT_COUNTRY)
            .append_pair("convertToReal", "true");

        let mut rows = table_rows(&context, self.fetch_json(url).await?)?;
        if rows.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let first = PlacementRow::from_value(&context, 0, rows.swap_remove(0))?;
        first.competing_price(&context)
    }
}

/// Extracts the value of the `_token` input from the sign-in page.
///
/// Attribute order and quoting vary, so each `<input>` tag is inspected on
/// its own.
fn scrape_login_token(html: &str) -> Result<Option<String>> {
    let compile = |pattern: &str| {
        Regex::new(pattern)
            .map_err(|e| MarketplaceError::Configuration(format!("invalid token pattern: {e}")))
    };
    let input_tag = compile(r"(?is)<input\b[^>]*>")?;
    let token_name = compile(r#"(?i)\bname\s*=\s*["']?_token\b"#)?;
    let value_attr = compile(r#"(?i)\bvalue\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#)?;

    let token = input_tag
        .find_iter(html)
        .map(|tag| tag.as_str())
        .filter(|tag| token_name.is_match(tag))
        .find_map(|tag| {
            let caps = value_attr.captures(tag)?;
            caps.get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string())
        })
        .filter(|token| !token.is_empty());
    Ok(token)
}

/// DataTables query for the campaign dashboard over the trailing window.
fn dashboard_query(clock: &MarketClock, now: chrono::DateTime<Utc>) -> Vec<(String, String)> {
    let (start, end) = clock.trailing_window(now, DASHBOARD_WINDOW_DAYS);
    let start = start.format(DATE_FORMAT).to_string();
    let end = end.format(DATE_FORMAT).to_string();

    let mut query = vec![
        ("sEcho".to_string(), "1".to_string()),
        ("iColumns".to_string(), DASHBOARD_COLUMNS.len().to_string()),
        ("sColumns".to_string(), DASHBOARD_COLUMNS.join(",")),
        ("iDisplayStart".to_string(), "0".to_string()),
        ("iDisplayLength".to_string(), "25".to_string()),
    ];

    for (i, column) in DASHBOARD_COLUMNS.iter().enumerate() {
        query.push((format!("mDataProp_{i}"), (*column).to_string()));
        query.push((format!("sSearch_{i}"), String::new()));
        query.push((format!("bRegex_{i}"), "false".to_string()));
        query.push((format!("bSearchable_{i}"), "true".to_string()));
        query.push((format!("bSortable_{i}"), is_sortable(i).to_string()));
    }

    query.extend([
        ("sSearch".to_string(), String::new()),
        ("bRegex".to_string(), "false".to_string()),
        ("iSortCol_0".to_string(), "2".to_string()),
        ("sSortDir_0".to_string(), "desc".to_string()),
        ("iSortingCols".to_string(), "1".to_string()),
        ("formURL".to_string(), format!("startDate={start}")),
        ("endDate".to_string(), end.clone()),
        ("isDashboard".to_string(), "true".to_string()),
        (
            "formJSON".to_string(),
            serde_json::json!({
                "startDate": start,
                "endDate": end,
                "isDashboard": "true",
            })
            .to_string(),
        ),
    ]);

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SIGN_IN_PAGE: &str = r#"<html><body>
        <form method="POST" action="/login">
            <input type="hidden" name="_token" value="csrf-abc123">
            <input type="text" name="username">
        </form></body></html>"#;

    async fn mount_login(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/sign-in"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SIGN_IN_PAGE))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .and(body_string_contains("_token=csrf-abc123"))
            .and(body_string_contains("username=advertiser"))
            .respond_with(
                ResponseTemplate::new(200).insert_header("set-cookie", "tj_session=s1; Path=/"),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    async fn session_for(server: &MockServer) -> AuthenticatedSession {
        mount_login(server).await;
        AuthenticatedSession::establish(
            &Credentials::new("advertiser", "hunter2"),
            SessionConfig::default().with_base_url(server.uri()),
            RateLimiter::new(Duration::from_millis(1)).unwrap(),
            CancelToken::new(),
        )
        .await
        .unwrap()
    }

    fn rows(value: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(value)
    }

    // ==================== Token Scraping ====================

    #[test]
    fn test_scrape_token_attribute_orders() {
        assert_eq!(
            scrape_login_token(SIGN_IN_PAGE).unwrap().as_deref(),
            Some("csrf-abc123")
        );
        assert_eq!(
            scrape_login_token(r#"<INPUT value='v2' type=hidden name='_token' />"#)
                .unwrap()
                .as_deref(),
            Some("v2")
        );
        assert_eq!(
            scrape_login_token("<input name=_token value=bare>")
                .unwrap()
                .as_deref(),
            Some("bare")
        );
    }

    #[test]
    fn test_scrape_token_missing() {
        assert_eq!(scrape_login_token("<html></html>").unwrap(), None);
        assert_eq!(
            scrape_login_token(r#"<input name="_token_other" value="x">"#).unwrap(),
            None
        );
        assert_eq!(
            scrape_login_token(r#"<input name="_token" value="">"#).unwrap(),
            None
        );
    }

    // ==================== Dashboard Query ====================

    #[test]
    fn test_dashboard_query_window_and_columns() {
        let now = Utc.with_ymd_and_hms(2024, 7, 10, 3, 0, 0).unwrap();
        let query = dashboard_query(&MarketClock::pacific(), now);
        let get = |key: &str| {
            query
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
                .unwrap()
        };

        // 03:00 UTC is still July 9th in Los Angeles
        assert_eq!(get("formURL"), "startDate=2024-06-11");
        assert_eq!(get("endDate"), "2024-07-09");
        assert_eq!(get("iColumns"), "18");
        assert_eq!(get("mDataProp_17"), "jsonLabels");
        assert_eq!(get("bSortable_2"), "true");
        assert_eq!(get("bSortable_3"), "false");
        assert_eq!(get("bSortable_16"), "true");
        assert_eq!(get("bSortable_17"), "false");

        let form: Value = serde_json::from_str(get("formJSON")).unwrap();
        assert_eq!(form["startDate"], "2024-06-11");
        assert_eq!(form["isDashboard"], "true");
    }

    // ==================== Establish ====================

    #[tokio::test]
    async fn test_establish_rejects_missing_credentials_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = AuthenticatedSession::establish(
            &Credentials::new("", ""),
            SessionConfig::default().with_base_url(server.uri()),
            RateLimiter::default(),
            CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketplaceError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_establish_fails_without_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sign-in"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>no form</html>"))
            .mount(&server)
            .await;

        let err = AuthenticatedSession::establish(
            &Credentials::new("advertiser", "hunter2"),
            SessionConfig::default().with_base_url(server.uri()),
            RateLimiter::new(Duration::from_millis(1)).unwrap(),
            CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MarketplaceError::TokenNotFound));
    }

    #[tokio::test]
    async fn test_establish_surfaces_login_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sign-in"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SIGN_IN_PAGE))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = AuthenticatedSession::establish(
            &Credentials::new("advertiser", "hunter2"),
            SessionConfig::default().with_base_url(server.uri()),
            RateLimiter::new(Duration::from_millis(1)).unwrap(),
            CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    // ==================== Active Campaigns ====================

    #[tokio::test]
    async fn test_list_active_campaign_ids_filters_status() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/ajaxlistv5"))
            .and(query_param("isDashboard", "true"))
            .respond_with(rows(serde_json::json!({"aaData": [
                {"id": 1002170291, "status": "active"},
                {"id": 1002170211, "status": "paused"},
                {"id": 1002170200.0, "status": "active"}
            ]})))
            .mount(&server)
            .await;

        let ids = session.list_active_campaign_ids().await.unwrap();
        assert_eq!(ids, vec!["1002170291".to_string(), "1002170200".to_string()]);
    }

    #[tokio::test]
    async fn test_list_active_campaign_ids_empty_rows() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/ajaxlistv5"))
            .respond_with(rows(serde_json::json!({"aaData": []})))
            .mount(&server)
            .await;

        assert!(session.list_active_campaign_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_active_campaign_ids_mistyped_field() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/ajaxlistv5"))
            .respond_with(rows(serde_json::json!({"aaData": {"id": 1}})))
            .mount(&server)
            .await;

        let err = session.list_active_campaign_ids().await.unwrap_err();
        assert!(matches!(err, MarketplaceError::MalformedResponse { .. }));
        assert!(err.to_string().contains("expected array, found object"));
    }

    // ==================== Placement Bids ====================

    #[tokio::test]
    async fn test_current_max_traffic_bid_parses_first_row() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/viewbids/placementlist/"))
            .and(query_param("placementId", "1039854091"))
            .and(query_param("spotId", "32"))
            .and(query_param("countryCode", "US"))
            .and(query_param("convertToReal", "true"))
            .respond_with(rows(serde_json::json!({"aaData": [
                ["1", "Top bid $1.500", "x"],
                ["2", "Second $1.200", "y"]
            ]})))
            .mount(&server)
            .await;

        let price = session
            .current_max_traffic_bid("1039854091", "32")
            .await
            .unwrap();
        assert_eq!(price, dec!(1.5));
    }

    #[tokio::test]
    async fn test_current_max_traffic_bid_empty_is_zero() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/viewbids/placementlist/"))
            .respond_with(rows(serde_json::json!({"aaData": []})))
            .mount(&server)
            .await;

        let price = session.current_max_traffic_bid("1", "32").await.unwrap();
        assert_eq!(price, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_current_max_traffic_bid_bad_price_format() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/viewbids/placementlist/"))
            .respond_with(rows(serde_json::json!({"aaData": [["1", "1.500"]]})))
            .mount(&server)
            .await;

        let err = session.current_max_traffic_bid("1", "32").await.unwrap_err();
        assert!(matches!(err, MarketplaceError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_current_max_traffic_bid_surfaces_http_error() {
        let server = MockServer::start().await;
        let session = session_for(&server).await;

        Mock::given(method("GET"))
            .and(path("/campaign/viewbids/placementlist/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = session.current_max_traffic_bid("1", "32").await.unwrap_err();
        assert_eq!(err.status(), Some(502));
        assert!(err.is_transient());
    }
}
