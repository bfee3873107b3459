//! Dividend accounting.
//!
//! Shares are always computed from balances as of the period start, never from current balances.

use crate::Precondition;
use ethers_core::types::{U256, U512};
use serde::{Deserialize, Serialize};

/// Seconds in a day.
pub const DAY_SECS: u64 = 86_400;

/// Default length of a payout period (30 days).
pub const DEFAULT_PAYOUT_PERIOD_SECS: u64 = 30 * DAY_SECS;

/// A dividend distribution snapshot, opened by a period reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutPeriod {
    pub started_at: u64,
    /// Treasury balance available for distribution at the reset.
    pub payout_snapshot: U256,
    pub total_supply_snapshot: U256,
}

/// The payout verb currently accepted by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutAction {
    ClaimPayout,
    ResetPeriod,
}

/// Pro-rata share of a payout snapshot.
///
/// Truncates, and yields zero for an empty supply.
pub fn my_share(
    balance_at_start: U256,
    total_supply_at_start: U256,
    payout_snapshot: U256,
) -> U256 {
    if total_supply_at_start.is_zero() {
        return U256::zero();
    }
    let share = payout_snapshot.full_mul(balance_at_start) / U512::from(total_supply_at_start);
    U256::try_from(share).unwrap_or(U256::MAX)
}

pub fn is_reset_due(now: u64, period_start: u64, period_length: u64) -> bool {
    now.checked_sub(period_length)
        .is_some_and(|elapsed| elapsed >= period_start)
}

impl PayoutPeriod {
    pub fn share_of(&self, balance_at_start: U256) -> U256 {
        my_share(
            balance_at_start,
            self.total_supply_snapshot,
            self.payout_snapshot,
        )
    }

    /// Earliest timestamp at which the period may be reset.
    pub fn resets_at(&self, period_length: u64) -> u64 {
        self.started_at.saturating_add(period_length)
    }

    pub fn is_reset_due(&self, now: u64, period_length: u64) -> bool {
        is_reset_due(now, self.started_at, period_length)
    }

    pub fn next_action(&self, now: u64, period_length: u64) -> PayoutAction {
        if self.is_reset_due(now, period_length) {
            PayoutAction::ResetPeriod
        } else {
            PayoutAction::ClaimPayout
        }
    }

    /// Check that `action` is the one the ledger accepts at `now`.
    pub fn check_action(
        &self,
        action: PayoutAction,
        now: u64,
        period_length: u64,
    ) -> Result<(), Precondition> {
        match (action, self.next_action(now, period_length)) {
            (PayoutAction::ClaimPayout, PayoutAction::ResetPeriod) => Err(Precondition::ResetDue),
            (PayoutAction::ResetPeriod, PayoutAction::ClaimPayout) => {
                Err(Precondition::ResetNotDue {
                    due_at: self.resets_at(period_length),
                })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn period(started_at: u64) -> PayoutPeriod {
        PayoutPeriod {
            started_at,
            payout_snapshot: U256::from(100),
            total_supply_snapshot: U256::from(1_000),
        }
    }

    #[test]
    fn test_share_is_pro_rata() {
        assert_eq!(
            my_share(U256::from(250), U256::from(1_000), U256::from(100)),
            U256::from(25)
        );
        assert_eq!(period(0).share_of(U256::from(250)), U256::from(25));
        // Truncated.
        assert_eq!(
            my_share(U256::from(1), U256::from(3), U256::from(100)),
            U256::from(33)
        );
    }

    #[test]
    fn test_share_does_not_overflow() {
        assert_eq!(my_share(U256::MAX, U256::MAX, U256::MAX), U256::MAX);
        assert_eq!(
            my_share(U256::MAX, U256::MAX, U256::from(7)),
            U256::from(7)
        );
    }

    #[test]
    fn test_reset_due_boundary() {
        let length = DEFAULT_PAYOUT_PERIOD_SECS;
        let started = 1_700_000_000;
        assert!(!is_reset_due(started + length - 1, started, length));
        assert!(is_reset_due(started + length, started, length));
        // `now` earlier than one period length never underflows.
        assert!(!is_reset_due(10, 0, length));
        assert!(is_reset_due(length, 0, length));
    }

    #[test]
    fn test_actions_are_mutually_exclusive() {
        let length = DEFAULT_PAYOUT_PERIOD_SECS;
        let current = period(1_000);
        let before = 1_000 + length - 1;
        let after = 1_000 + length;

        assert_eq!(current.next_action(before, length), PayoutAction::ClaimPayout);
        assert_eq!(current.next_action(after, length), PayoutAction::ResetPeriod);
        assert_eq!(
            current.check_action(PayoutAction::ClaimPayout, before, length),
            Ok(())
        );
        assert_eq!(
            current.check_action(PayoutAction::ResetPeriod, before, length),
            Err(Precondition::ResetNotDue { due_at: after })
        );
        assert_eq!(
            current.check_action(PayoutAction::ClaimPayout, after, length),
            Err(Precondition::ResetDue)
        );
        assert_eq!(
            current.check_action(PayoutAction::ResetPeriod, after, length),
            Ok(())
        );
    }

    proptest! {
        #[test]
        fn prop_zero_supply_yields_zero(balance in any::<u128>(), payout in any::<u128>()) {
            prop_assert_eq!(
                my_share(U256::from(balance), U256::zero(), U256::from(payout)),
                U256::zero()
            );
        }

        #[test]
        fn prop_shares_never_exceed_snapshot(
            balances in proptest::collection::vec(any::<u64>(), 1..32),
            payout in any::<u128>(),
        ) {
            let supply = balances
                .iter()
                .fold(U256::zero(), |acc, balance| acc + U256::from(*balance));
            let payout = U256::from(payout);
            let total = balances.iter().fold(U256::zero(), |acc, balance| {
                acc + my_share(U256::from(*balance), supply, payout)
            });
            prop_assert!(total <= payout);
        }
    }
}
