//! Bid reconciliation.
//!
//! Pure computation over an [`AccountState`]: for every bid with a known
//! competing price, target `competing - undercut` and emit an update unless the
//! current price already sits just below that target.

use crate::clock::{MarketClock, TIMESTAMP_FORMAT};
use crate::model::{AccountState, Bid, BidUpdate, Campaign};
use chrono::DateTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;

/// Default margin subtracted from the competing price (0.001).
pub const DEFAULT_UNDERCUT: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Upper bound (exclusive) of the no-update window for `ideal - current` (0.001).
pub const CLOSE_ENOUGH: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Computes bid updates from a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct BidReconciler {
    undercut: Decimal,
    clock: MarketClock,
}

impl Default for BidReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_UNDERCUT, MarketClock::default())
    }
}

impl BidReconciler {
    #[must_use]
    pub const fn new(undercut: Decimal, clock: MarketClock) -> Self {
        Self { undercut, clock }
    }

    #[must_use]
    pub const fn undercut(&self) -> Decimal {
        self.undercut
    }

    /// Computes updates stamped with the current marketplace-local time.
    ///
    /// Order follows the snapshot's map iteration and is not meaningful.
    #[must_use]
    pub fn reconcile(&self, state: &AccountState) -> Vec<BidUpdate> {
        self.reconcile_at(state, self.clock.now())
    }

    /// Computes updates stamped with `at`.
    #[must_use]
    pub fn reconcile_at(&self, state: &AccountState, at: DateTime<Tz>) -> Vec<BidUpdate> {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();

        state
            .campaigns()
            .flat_map(|campaign| {
                campaign
                    .bids
                    .values()
                    .filter_map(|bid| self.update_for(campaign, bid, &timestamp))
            })
            .collect()
    }

    /// Returns the price `bid` should move to, or `None` to leave it alone.
    #[must_use]
    pub fn target_price(&self, bid: &Bid) -> Option<Decimal> {
        // Never bid against an unknown or absent market
        if !bid.has_market() {
            return None;
        }

        let ideal = bid.current_max_traffic_bid - self.undercut;
        let delta = ideal - bid.amount;

        if delta >= Decimal::ZERO && delta < CLOSE_ENOUGH {
            return None;
        }

        Some(ideal)
    }

    fn update_for(&self, campaign: &Campaign, bid: &Bid, timestamp: &str) -> Option<BidUpdate> {
        self.target_price(bid).map(|new_bid| BidUpdate {
            campaign_id: campaign.campaign_id.clone(),
            bid_id: bid.bid_id.clone(),
            previous_bid: bid.amount,
            new_bid,
            timestamp: timestamp.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn state_with(bids: Vec<Bid>) -> AccountState {
        std::iter::once(Campaign::new("1002170291", "Test", true, bids)).collect()
    }

    fn active_bid(id: &str, amount: Decimal, competing: Decimal) -> Bid {
        Bid::new(id, amount, "32", true, competing)
    }

    fn fixed_time() -> DateTime<Tz> {
        chrono_tz::America::Los_Angeles
            .with_ymd_and_hms(2024, 7, 9, 15, 4, 0)
            .unwrap()
    }

    fn reconcile(bids: Vec<Bid>) -> Vec<BidUpdate> {
        BidReconciler::default().reconcile_at(&state_with(bids), fixed_time())
    }

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_UNDERCUT, dec!(0.001));
        assert_eq!(CLOSE_ENOUGH, dec!(0.001));
    }

    // ==================== Skip Rules ====================

    #[test]
    fn test_zero_competing_price_never_updates() {
        let updates = reconcile(vec![
            active_bid("b1", dec!(1.0), Decimal::ZERO),
            active_bid("b2", dec!(0), Decimal::ZERO),
            Bid::new("b3", dec!(5.0), "1", false, dec!(2.0)),
        ]);
        assert!(updates.is_empty());
    }

    #[test]
    fn test_exactly_ideal_is_skipped() {
        // ideal = 1.499, delta = 0
        assert!(reconcile(vec![active_bid("b1", dec!(1.499), dec!(1.500))]).is_empty());
    }

    #[test]
    fn test_just_below_ideal_is_skipped() {
        // ideal = 1.499, delta = 0.0009
        assert!(reconcile(vec![active_bid("b1", dec!(1.4981), dec!(1.500))]).is_empty());
    }

    // ==================== Update Rules ====================

    #[test]
    fn test_delta_at_threshold_updates_up() {
        let updates = reconcile(vec![active_bid("b1", dec!(1.498), dec!(1.500))]);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].previous_bid, dec!(1.498));
        assert_eq!(updates[0].new_bid, dec!(1.499));
    }

    #[test]
    fn test_current_above_ideal_always_updates_down() {
        // ideal = 1.499, delta = -0.0001
        let updates = reconcile(vec![active_bid("b1", dec!(1.4991), dec!(1.500))]);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].new_bid, dec!(1.499));
        assert!(updates[0].delta() < Decimal::ZERO);
    }

    #[test]
    fn test_matching_competitor_updates_down() {
        // Sitting exactly on the competing price is above ideal
        let updates = reconcile(vec![active_bid("b1", dec!(0.25), dec!(0.25))]);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].new_bid, dec!(0.249));
    }

    #[test]
    fn test_custom_undercut() {
        let reconciler = BidReconciler::new(dec!(0.01), MarketClock::pacific());
        let bid = active_bid("b1", dec!(0.10), dec!(0.50));
        assert_eq!(reconciler.target_price(&bid), Some(dec!(0.49)));
    }

    #[test]
    fn test_one_update_per_qualifying_bid() {
        let updates = reconcile(vec![
            active_bid("b1", dec!(0.10), dec!(0.50)),
            active_bid("b2", dec!(0.499), dec!(0.50)),
            active_bid("b3", dec!(0.90), dec!(0.50)),
            active_bid("b4", dec!(0.10), Decimal::ZERO),
        ]);

        let mut ids: Vec<_> = updates.iter().map(|u| u.bid_id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["b1", "b3"]);
        assert!(updates.iter().all(|u| u.new_bid == dec!(0.499)));
    }

    #[test]
    fn test_updates_carry_campaign_and_timestamp() {
        let updates = reconcile(vec![active_bid("b1", dec!(0.10), dec!(0.50))]);

        assert_eq!(updates[0].campaign_id, "1002170291");
        assert_eq!(updates[0].timestamp, "2024-07-09 3:04pm");
    }

    #[test]
    fn test_multiple_campaigns() {
        let state: AccountState = vec![
            Campaign::new("1", "A", true, vec![active_bid("a1", dec!(0.1), dec!(0.5))]),
            Campaign::new("2", "B", true, vec![active_bid("b1", dec!(0.1), dec!(0.5))]),
            Campaign::new("3", "C", false, Vec::new()),
        ]
        .into_iter()
        .collect();

        let updates = BidReconciler::default().reconcile_at(&state, fixed_time());
        assert_eq!(updates.len(), 2);
    }
}
