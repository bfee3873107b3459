use super::{BPS_DENOMINATOR, MAX_GUESS_NUMBER};
use crate::Precondition;
use ethers_core::types::U256;
use serde::{Deserialize, Serialize};

/// Largest stake the prize fund can cover.
///
/// The result never lets `stake * multiplier` exceed `max_prize` nor half of the prize fund. A
/// multiplier of zero disables betting entirely.
pub fn max_stake(prize_fund: U256, multiplier: u32, max_prize: U256) -> U256 {
    if multiplier == 0 {
        return U256::zero();
    }
    let multiplier = U256::from(multiplier);
    let by_cap = max_prize / multiplier;
    let by_fund = prize_fund / 2 / multiplier;
    by_cap.min(by_fund)
}

/// Amount to transfer for a stake once the protocol fee is added.
pub fn fee_inclusive_stake(stake: U256, fee_bps: u32) -> U256 {
    stake.saturating_mul(U256::from(BPS_DENOMINATOR + fee_bps)) / U256::from(BPS_DENOMINATOR)
}

/// Prize paid out if a stake wins.
pub fn estimated_prize(stake: U256, multiplier: u32) -> U256 {
    stake.saturating_mul(U256::from(multiplier))
}

pub fn validate_guess_number(number: u8) -> Result<(), Precondition> {
    if number > MAX_GUESS_NUMBER {
        return Err(Precondition::GuessOutOfRange(number));
    }
    Ok(())
}

/// Betting limits derived from a single read of the prize fund and multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetBounds {
    pub prize_fund: U256,
    pub multiplier: u32,
    pub max_stake: U256,
    pub fee_bps: u32,
}

impl BetBounds {
    pub fn new(prize_fund: U256, multiplier: u32, max_prize: U256, fee_bps: u32) -> Self {
        Self {
            prize_fund,
            multiplier,
            max_stake: max_stake(prize_fund, multiplier, max_prize),
            fee_bps,
        }
    }

    /// Validate a wager and return the value to send with it.
    pub fn check(&self, number: u8, stake: U256) -> Result<U256, Precondition> {
        validate_guess_number(number)?;
        if stake.is_zero() {
            return Err(Precondition::ZeroStake);
        }
        if stake > self.max_stake {
            return Err(Precondition::StakeAboveMax {
                stake,
                max: self.max_stake,
            });
        }
        Ok(fee_inclusive_stake(stake, self.fee_bps))
    }

    pub fn estimated_prize(&self, stake: U256) -> U256 {
        estimated_prize(stake, self.multiplier)
    }
}
