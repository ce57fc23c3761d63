//! Wire types for the TrafficJunky APIs.
//!
//! The documented API returns fixed JSON shapes and decodes straight into
//! serde structs. The member-site AJAX endpoints return DataTables payloads
//! (`{"aaData": [...]}`) whose rows are validated field by field so a schema
//! change fails with a precise [`MarketplaceError::MalformedResponse`].

use crate::error::{MarketplaceError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Layout of campaign end dates, e.g. `2024-12-31T23:59:59-0800`.
pub const END_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Row list field of DataTables payloads.
pub const ROWS_FIELD: &str = "aaData";

/// Status string of a running campaign.
pub const ACTIVE_STATUS: &str = "active";

// =============================================================================
// Documented API
// =============================================================================

/// Campaign entry from `GET /api/campaigns.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub campaign_id: i64,
    #[serde(rename = "campaign_name", default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub end_date: String,
}

impl CampaignSummary {
    /// Campaign id in its string form.
    #[must_use]
    pub fn id(&self) -> String {
        self.campaign_id.to_string()
    }

    /// A campaign is active when its status is `active` and its end date is
    /// in the future. An unparseable or missing end date counts as running.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != ACTIVE_STATUS {
            return false;
        }

        match DateTime::parse_from_str(&self.end_date, END_DATE_FORMAT) {
            Ok(end) => {
                tracing::debug!(
                    campaign_id = self.campaign_id,
                    end_date = %self.end_date,
                    parsed = %end,
                    "Parsed campaign end date"
                );
                end.with_timezone(&Utc) > now
            }
            Err(_) => true,
        }
    }
}

/// Bid entry from `GET /api/bids/{campaign_id}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidSummary {
    #[serde(default)]
    pub bid_id: String,
    /// Current price as a decimal string.
    #[serde(rename = "bid", default)]
    pub amount: String,
    #[serde(default)]
    pub spot_id: String,
    #[serde(rename = "isActive", default)]
    pub is_active: bool,
    #[serde(rename = "isPaused", default)]
    pub is_paused: i32,
}

impl BidSummary {
    /// Active and not paused.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.is_active && self.is_paused == 0
    }

    /// Parses the price string.
    ///
    /// # Errors
    ///
    /// Returns a malformed response error if `amount` is not a decimal.
    pub fn parsed_amount(&self) -> Result<Decimal> {
        Decimal::from_str(self.amount.trim()).map_err(|e| {
            MarketplaceError::malformed(
                format!("bid {}", self.bid_id),
                format!("bid amount '{}' is not a decimal: {e}", self.amount),
            )
        })
    }
}

/// Response of `GET /api/bids/{campaign_id}.json`: row index to bid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidsResponse {
    #[serde(default, deserialize_with = "bid_rows")]
    pub bids: BTreeMap<u32, BidSummary>,
}

/// Rows are keyed by their index as a JSON string. An empty bid list comes
/// back as `[]` (or `null`) rather than `{}`.
fn bid_rows<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<u32, BidSummary>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(rows) => rows
            .into_iter()
            .map(|(key, row)| {
                let index = u32::from_str(&key)
                    .map_err(|e| D::Error::custom(format!("bid row key '{key}': {e}")))?;
                let bid = BidSummary::deserialize(row).map_err(D::Error::custom)?;
                Ok((index, bid))
            })
            .collect(),
        Value::Array(rows) => (0u32..)
            .zip(rows)
            .map(|(index, row)| Ok((index, BidSummary::deserialize(row).map_err(D::Error::custom)?)))
            .collect(),
        other => Err(D::Error::custom(format!(
            "bids: expected object or array, found {}",
            json_kind(&other)
        ))),
    }
}

// =============================================================================
// Member-site AJAX
// =============================================================================

/// Returns the JSON kind of `value` for diagnostics.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Extracts the DataTables row list from a payload.
///
/// # Errors
///
/// Returns a malformed response error if the payload is not an object or the
/// row field is missing or not an array.
pub fn table_rows(context: &str, payload: Value) -> Result<Vec<Value>> {
    let Value::Object(mut fields) = payload else {
        return Err(MarketplaceError::wrong_type(
            context,
            "<root>",
            "object",
            json_kind(&payload),
        ));
    };

    match fields.remove(ROWS_FIELD) {
        Some(Value::Array(rows)) => Ok(rows),
        Some(other) => Err(MarketplaceError::wrong_type(
            context,
            ROWS_FIELD,
            "array",
            json_kind(&other),
        )),
        None => Err(MarketplaceError::malformed(
            context,
            format!("missing field '{ROWS_FIELD}'"),
        )),
    }
}

/// Row of the campaign dashboard listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignRow {
    pub id: i64,
    pub status: String,
}

impl CampaignRow {
    /// Validates one listing row.
    ///
    /// # Errors
    ///
    /// Returns a malformed response error naming the offending field.
    pub fn from_value(context: &str, index: usize, row: &Value) -> Result<Self> {
        let Value::Object(fields) = row else {
            return Err(MarketplaceError::wrong_type(
                context,
                &format!("{ROWS_FIELD}[{index}]"),
                "object",
                json_kind(row),
            ));
        };

        let id_value = fields.get("id").unwrap_or(&Value::Null);
        let id = integral(id_value).ok_or_else(|| {
            MarketplaceError::wrong_type(
                context,
                &format!("{ROWS_FIELD}[{index}].id"),
                "integer",
                json_kind(id_value),
            )
        })?;

        let status = match fields.get("status") {
            Some(Value::String(s)) => s.clone(),
            other => {
                return Err(MarketplaceError::wrong_type(
                    context,
                    &format!("{ROWS_FIELD}[{index}].status"),
                    "string",
                    json_kind(other.unwrap_or(&Value::Null)),
                ))
            }
        };

        Ok(Self { id, status })
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }
}

/// Accepts JSON integers and integral floats such as `1002170291.0`.
fn integral(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15)
            .map(|f| f as i64)
    })
}

/// Row of the per-placement bid listing: a list of display columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRow {
    columns: Vec<Value>,
}

impl PlacementRow {
    /// Column holding the `"<label>$<amount>"` price string.
    pub const PRICE_COLUMN: usize = 1;

    /// Validates one placement row.
    ///
    /// # Errors
    ///
    /// Returns a malformed response error if the row is not an array.
    pub fn from_value(context: &str, index: usize, row: Value) -> Result<Self> {
        match row {
            Value::Array(columns) => Ok(Self { columns }),
            other => Err(MarketplaceError::wrong_type(
                context,
                &format!("{ROWS_FIELD}[{index}]"),
                "array",
                json_kind(&other),
            )),
        }
    }

    /// Parses the competing price from the price column.
    ///
    /// # Errors
    ///
    /// Returns a malformed response error if the column is missing, not a
    /// string, or not of the form `<label>$<amount>`.
    pub fn competing_price(&self, context: &str) -> Result<Decimal> {
        let field = format!("{ROWS_FIELD}[0][{}]", Self::PRICE_COLUMN);
        match self.columns.get(Self::PRICE_COLUMN) {
            Some(Value::String(s)) => parse_price_label(context, s),
            Some(other) => Err(MarketplaceError::wrong_type(
                context,
                &field,
                "string",
                json_kind(other),
            )),
            None => Err(MarketplaceError::malformed(
                context,
                format!(
                    "row has {} columns, expected at least {}",
                    self.columns.len(),
                    Self::PRICE_COLUMN + 1
                ),
            )),
        }
    }
}

/// Parses `"<label>$<amount>"`, e.g. `"Top bid: $1.50"`.
///
/// # Errors
///
/// Returns a malformed response error unless the string splits on `$` into
/// exactly two parts and the second is a decimal.
pub fn parse_price_label(context: &str, label: &str) -> Result<Decimal> {
    let parts: Vec<&str> = label.split('$').collect();
    if parts.len() != 2 {
        return Err(MarketplaceError::malformed(
            context,
            format!("price '{label}' is not of the form <label>$<amount>"),
        ));
    }

    Decimal::from_str(parts[1].trim()).map_err(|e| {
        MarketplaceError::malformed(context, format!("price '{label}' has invalid amount: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn summary(status: &str, end_date: &str) -> CampaignSummary {
        CampaignSummary {
            campaign_id: 1_002_170_291,
            name: "Test".to_string(),
            status: status.to_string(),
            end_date: end_date.to_string(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
    }

    // ==================== Campaign Activity ====================

    #[test]
    fn test_active_with_future_end_date() {
        assert!(summary("active", "2024-12-31T23:59:59-0800").is_active_at(now()));
    }

    #[test]
    fn test_active_with_past_end_date_is_inactive() {
        assert!(!summary("active", "2024-06-30T23:59:59-0700").is_active_at(now()));
    }

    #[test]
    fn test_unparseable_end_date_counts_as_running() {
        assert!(summary("active", "").is_active_at(now()));
        assert!(summary("active", "0000-00-00 00:00:00").is_active_at(now()));
    }

    #[test]
    fn test_non_active_status_is_never_active() {
        for status in ["paused", "Active", "inactive", ""] {
            assert!(!summary(status, "2099-01-01T00:00:00+0000").is_active_at(now()));
            assert!(!summary(status, "").is_active_at(now()));
        }
    }

    #[test]
    fn test_campaign_summary_decoding() {
        let raw = json!([{
            "campaign_id": 1002170291,
            "campaign_name": "Spring",
            "status": "active",
            "end_date": "2024-12-31T23:59:59-0800",
            "extra": 1
        }, {
            "campaign_id": 1002170211
        }]);

        let campaigns: Vec<CampaignSummary> = serde_json::from_value(raw).unwrap();
        assert_eq!(campaigns[0].id(), "1002170291");
        assert_eq!(campaigns[0].name, "Spring");
        assert_eq!(campaigns[1].status, "");
    }

    // ==================== Bids ====================

    #[test]
    fn test_bids_response_indexed_map() {
        let raw = json!({
            "bids": {
                "0": {"bid_id": "1039854091", "bid": "0.4990", "spot_id": "32", "isActive": true, "isPaused": 0},
                "1": {"bid_id": "1039854092", "bid": "0.1000", "spot_id": "33", "isActive": true, "isPaused": 1}
            }
        });

        let response: BidsResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.bids.len(), 2);
        assert!(response.bids[&0].is_live());
        assert!(!response.bids[&1].is_live());
        assert_eq!(response.bids[&0].parsed_amount().unwrap(), dec!(0.499));
    }

    #[test]
    fn test_bids_response_from_body_text() {
        let body = r#"{"bids":{"3":{"bid_id":"7","bid":"1.2000","spot_id":"32","isActive":true,"isPaused":0}}}"#;

        let response: BidsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.bids.len(), 1);
        assert_eq!(response.bids[&3].bid_id, "7");
    }

    #[test]
    fn test_bids_response_rejects_non_numeric_key() {
        let raw = json!({"bids": {"first": {"bid_id": "7", "bid": "1", "spot_id": "1", "isActive": true, "isPaused": 0}}});
        let err = serde_json::from_value::<BidsResponse>(raw).unwrap_err();
        assert!(err.to_string().contains("first"));

        let err = serde_json::from_value::<BidsResponse>(json!({"bids": "none"})).unwrap_err();
        assert!(err.to_string().contains("expected object or array"));
    }

    #[test]
    fn test_bids_response_empty_list() {
        let response: BidsResponse = serde_json::from_value(json!({"bids": []})).unwrap();
        assert!(response.bids.is_empty());

        let response: BidsResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.bids.is_empty());
    }

    #[test]
    fn test_bid_amount_parse_failure() {
        let bid = BidSummary {
            bid_id: "1".to_string(),
            amount: "n/a".to_string(),
            spot_id: "32".to_string(),
            is_active: true,
            is_paused: 0,
        };
        assert!(matches!(
            bid.parsed_amount(),
            Err(MarketplaceError::MalformedResponse { .. })
        ));
    }

    // ==================== AJAX Tables ====================

    #[test]
    fn test_table_rows_requires_array_field() {
        assert!(table_rows("ctx", json!({"aaData": []})).unwrap().is_empty());

        let err = table_rows("ctx", json!({"aaData": "nope"})).unwrap_err();
        assert!(err.to_string().contains("expected array, found string"));

        let err = table_rows("ctx", json!({"other": []})).unwrap_err();
        assert!(err.to_string().contains("missing field 'aaData'"));

        let err = table_rows("ctx", json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("expected object, found array"));
    }

    #[test]
    fn test_campaign_row_validation() {
        let row = CampaignRow::from_value("ctx", 0, &json!({"id": 1002170291, "status": "active"}))
            .unwrap();
        assert_eq!(row.id, 1_002_170_291);
        assert!(row.is_active());

        let row = CampaignRow::from_value("ctx", 0, &json!({"id": 5.0, "status": "paused"})).unwrap();
        assert_eq!(row.id, 5);
        assert!(!row.is_active());

        let err = CampaignRow::from_value("ctx", 3, &json!({"id": "5", "status": "active"}))
            .unwrap_err();
        assert!(err.to_string().contains("aaData[3].id"));

        let err = CampaignRow::from_value("ctx", 1, &json!({"id": 5})).unwrap_err();
        assert!(err.to_string().contains("aaData[1].status"));
        assert!(err.to_string().contains("found null"));
    }

    #[test]
    fn test_placement_row_price() {
        let row = PlacementRow::from_value("ctx", 0, json!(["Spot 32", "Top bid $1.50", 7])).unwrap();
        assert_eq!(row.competing_price("ctx").unwrap(), dec!(1.50));
    }

    #[test]
    fn test_placement_row_errors() {
        let row = PlacementRow::from_value("ctx", 0, json!(["only one"])).unwrap();
        assert!(row.competing_price("ctx").is_err());

        let row = PlacementRow::from_value("ctx", 0, json!(["a", 1.5])).unwrap();
        let err = row.competing_price("ctx").unwrap_err();
        assert!(err.to_string().contains("expected string, found number"));

        assert!(PlacementRow::from_value("ctx", 0, json!({"a": 1})).is_err());
    }

    #[test]
    fn test_parse_price_label() {
        assert_eq!(parse_price_label("ctx", "$0.0125").unwrap(), dec!(0.0125));
        assert_eq!(parse_price_label("ctx", "CPM $ 2.5").unwrap(), dec!(2.5));
        assert!(parse_price_label("ctx", "no dollar sign").is_err());
        assert!(parse_price_label("ctx", "$1$2").is_err());
        assert!(parse_price_label("ctx", "$abc").is_err());
    }
}
