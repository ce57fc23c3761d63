//! Marketplace-local time.
//!
//! The marketplace reports and expects dates in its own time zone. Rather than
//! a process-wide location, a [`MarketClock`] value is passed into every
//! operation that produces a timestamp or a date window.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

/// Time zone the marketplace operates in.
pub const DEFAULT_TIME_ZONE: &str = "America/Los_Angeles";

/// Layout used for update timestamps, e.g. `2024-03-09 3:04pm`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %-I:%M%P";

/// Layout used for dashboard date parameters, e.g. `2024-03-09`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Clock bound to the marketplace's local time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketClock {
    tz: Tz,
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::pacific()
    }
}

impl MarketClock {
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// US Pacific time, the marketplace's home zone.
    #[must_use]
    pub const fn pacific() -> Self {
        Self::new(chrono_tz::America::Los_Angeles)
    }

    /// Builds a clock from an IANA zone name such as `America/Los_Angeles`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known time zone.
    pub fn from_name(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|e| anyhow!("unknown time zone '{name}': {e}"))?;
        Ok(Self::new(tz))
    }

    #[must_use]
    pub const fn tz(&self) -> Tz {
        self.tz
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Tz> {
        self.localize(Utc::now())
    }

    #[must_use]
    pub fn localize(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.tz)
    }

    /// Formats an instant with [`TIMESTAMP_FORMAT`] in the marketplace zone.
    #[must_use]
    pub fn format_timestamp(&self, at: DateTime<Utc>) -> String {
        self.localize(at).format(TIMESTAMP_FORMAT).to_string()
    }

    #[must_use]
    pub fn timestamp_now(&self) -> String {
        self.format_timestamp(Utc::now())
    }

    /// Returns `(start, end)` local dates covering the trailing `days` ending at `at`.
    #[must_use]
    pub fn trailing_window(&self, at: DateTime<Utc>, days: i64) -> (NaiveDate, NaiveDate) {
        let end = self.localize(at).date_naive();
        let start = self.localize(at - Duration::days(days)).date_naive();
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_is_pacific() {
        assert_eq!(MarketClock::default().tz(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn test_from_name() {
        let clock = MarketClock::from_name("Europe/Berlin").unwrap();
        assert_eq!(clock.tz(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_from_name_rejects_unknown_zone() {
        let err = MarketClock::from_name("Mars/Olympus_Mons").unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_timestamp_format_afternoon() {
        // 23:04 UTC in July is 16:04 PDT
        let at = Utc.with_ymd_and_hms(2024, 7, 9, 23, 4, 0).unwrap();
        assert_eq!(MarketClock::pacific().format_timestamp(at), "2024-07-09 4:04pm");
    }

    #[test]
    fn test_timestamp_format_morning_crosses_date() {
        // 07:30 UTC in January is 23:30 PST the previous day
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 7, 30, 0).unwrap();
        assert_eq!(MarketClock::pacific().format_timestamp(at), "2024-01-09 11:30pm");

        let at = Utc.with_ymd_and_hms(2024, 1, 10, 17, 5, 0).unwrap();
        assert_eq!(MarketClock::pacific().format_timestamp(at), "2024-01-10 9:05am");
    }

    #[test]
    fn test_trailing_window_uses_local_dates() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        let (start, end) = MarketClock::pacific().trailing_window(at, 28);

        // 03:00 UTC on Mar 1 is still Feb 29 in Pacific time
        assert_eq!(end.format(DATE_FORMAT).to_string(), "2024-02-29");
        assert_eq!(start.format(DATE_FORMAT).to_string(), "2024-02-01");
    }
}
