/// Wei in one ether.
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Number of outcomes a wager can resolve to (`0..=99`).
pub const OUTCOME_RANGE: u16 = 100;

/// Highest number a player can guess.
pub const MAX_GUESS_NUMBER: u8 = 99;

/// Ceiling on a single potential payout (20 ether).
pub const MAX_PRIZE_WEI: u128 = 20 * WEI_PER_ETHER;

/// Highest prize multiplier the casino accepts.
pub const MAX_PRIZE_MULTIPLIER: u32 = 99;

/// Default protocol fee charged on top of a stake, in basis points (1%).
pub const DEFAULT_FEE_BPS: u32 = 100;

pub const BPS_DENOMINATOR: u32 = 10_000;

/// Blocks after a wager during which its seed is still queryable and a prize claimable.
pub const CLAIM_WINDOW_BLOCKS: u64 = 255;

/// Blocks produced in roughly 24 hours (13.2s block time).
pub const BLOCKS_PER_DAY: u64 = 6_544;

/// Number of winners shown in the recent winners list.
pub const RECENT_WINNERS_LIMIT: usize = 3;
