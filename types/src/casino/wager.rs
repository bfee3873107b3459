use super::{resolve, CLAIM_WINDOW_BLOCKS};
use crate::Precondition;
use ethers_core::types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

/// A guess recorded by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wager {
    pub player: Address,
    /// Stake net of the protocol fee.
    pub stake: U256,
    pub number: u8,
    /// Per-player counter assigned by the ledger.
    pub nonce: u16,
    pub block_number: u64,
    /// Hash of the including block; seeds the outcome.
    pub block_hash: H256,
    pub tx_hash: H256,
}

/// Resolution of a [Wager].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub resolved: u8,
    pub won: bool,
}

impl Wager {
    pub fn outcome(&self) -> Outcome {
        let resolved = resolve(&self.block_hash, self.nonce);
        Outcome {
            resolved,
            won: resolved == self.number,
        }
    }

    /// Blocks left before the wager's prize can no longer be claimed.
    pub fn blocks_left(&self, current_block: u64) -> u64 {
        CLAIM_WINDOW_BLOCKS.saturating_sub(current_block.saturating_sub(self.block_number))
    }

    /// Check that a prize for this wager can be claimed at `current_block`.
    pub fn check_claim(&self, current_block: u64) -> Result<(), Precondition> {
        if !self.outcome().won {
            return Err(Precondition::NotAWinner);
        }
        if current_block <= self.block_number {
            return Err(Precondition::ClaimInSameBlock);
        }
        if self.blocks_left(current_block) == 0 {
            return Err(Precondition::ClaimWindowExpired {
                window: CLAIM_WINDOW_BLOCKS,
            });
        }
        Ok(())
    }
}

/// A paid-out prize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinClaim {
    pub player: Address,
    /// Number that won, as resolved by the ledger.
    pub number: u8,
    /// Nonce of the wager the prize was paid for.
    pub nonce: u16,
    pub prize: U256,
    pub block_number: u64,
    pub tx_hash: H256,
}

impl WinClaim {
    pub fn settles(&self, wager: &Wager) -> bool {
        self.player == wager.player && self.nonce == wager.nonce
    }
}

/// The player's latest wager if it won and no claim settled it yet.
pub fn unclaimed_prize<'a>(
    latest_wager: Option<&'a Wager>,
    latest_win: Option<&WinClaim>,
) -> Option<&'a Wager> {
    let wager = latest_wager?;
    if !wager.outcome().won {
        return None;
    }
    match latest_win {
        Some(win) if win.settles(wager) => None,
        _ => Some(wager),
    }
}
