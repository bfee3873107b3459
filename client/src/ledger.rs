//! The external ledger as seen by the mirror.
//!
//! [Ledger] is the only seam to the authoritative state: request/response reads, writes with a
//! submitted-then-confirmed lifecycle, and a push interface ([Ledger::pump]) used exclusively
//! by the fan-out bus.

use crate::{fanout::Publisher, Result};
use futures::future::BoxFuture;
use honest_types::{
    accountant::PayoutPeriod,
    casino::{Wager, WinClaim},
    voting::{Proposal, ProposalKind, ProposalRequest, VoteChoice},
    Address, H256, U256,
};
use std::{fmt, future::Future};

/// Network a ledger connection is bound to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    pub chain_id: u64,
    pub rpc_url: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// Inclusive block range for history queries. Unset bounds are open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl BlockRange {
    pub fn since(from: u64) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        self.from.map_or(true, |from| block >= from) && self.to.map_or(true, |to| block <= to)
    }
}

/// Upstream event topics the ledger pushes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    WagerPlaced,
    PrizeClaimed,
    /// Each new block, followed by fresh prize fund and multiplier readings.
    NewBlock,
    ProposalStarted,
    PeriodReset,
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WagerPlaced => "wager-placed",
            Self::PrizeClaimed => "prize-claimed",
            Self::NewBlock => "new-block",
            Self::ProposalStarted => "proposal-started",
            Self::PeriodReset => "period-reset",
        };
        f.write_str(name)
    }
}

/// Typed event republished by the fan-out bus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    WagerPlaced(Wager),
    PrizeClaimed(WinClaim),
    NewBlock(BlockInfo),
    PrizeFund(U256),
    Multiplier(u32),
    ProposalStarted { id: u64, kind: ProposalKind },
    PeriodReset(PayoutPeriod),
}

impl LedgerEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::WagerPlaced(_) => Topic::WagerPlaced,
            Self::PrizeClaimed(_) => Topic::PrizeClaimed,
            Self::NewBlock(_) | Self::PrizeFund(_) | Self::Multiplier(_) => Topic::NewBlock,
            Self::ProposalStarted { .. } => Topic::ProposalStarted,
            Self::PeriodReset(_) => Topic::PeriodReset,
        }
    }

    /// Player the event concerns, for per-identity filtering.
    pub fn player(&self) -> Option<Address> {
        match self {
            Self::WagerPlaced(wager) => Some(wager.player),
            Self::PrizeClaimed(win) => Some(win.player),
            _ => None,
        }
    }
}

/// A write call. Each is one logical transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// `value` already includes the protocol fee.
    Guess { number: u8, value: U256 },
    ClaimPrize { player: Address },
    Mint { value: U256 },
    RequestPayout { player: Address },
    ResetPeriod,
    StartProposal(ProposalRequest),
    Vote { id: u64, choice: VoteChoice },
    Execute { id: u64 },
}

impl Call {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Guess { .. } => "guess",
            Self::ClaimPrize { .. } => "claim_prize",
            Self::Mint { .. } => "mint",
            Self::RequestPayout { .. } => "request_payout",
            Self::ResetPeriod => "reset_period",
            Self::StartProposal(_) => "start_proposal",
            Self::Vote { .. } => "vote",
            Self::Execute { .. } => "execute",
        }
    }
}

/// A confirmed transaction and the events it emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: H256,
    pub block_number: u64,
    pub events: Vec<LedgerEvent>,
}

/// A write that was accepted for inclusion but is not yet confirmed.
pub struct Pending {
    pub tx_hash: H256,
    confirmation: BoxFuture<'static, Result<Receipt>>,
}

impl Pending {
    pub fn new(tx_hash: H256, confirmation: BoxFuture<'static, Result<Receipt>>) -> Self {
        Self {
            tx_hash,
            confirmation,
        }
    }

    /// Wait for the transaction to be included.
    pub async fn confirmed(self) -> Result<Receipt> {
        self.confirmation.await
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("tx_hash", &self.tx_hash)
            .finish_non_exhaustive()
    }
}

/// Read, write and push surface of the external ledger.
pub trait Ledger: Send + Sync + 'static {
    /// Account writes are signed as, if any.
    fn identity(&self) -> Option<Address>;

    fn network(&self) -> &Network;

    /// Balance held by the casino.
    fn prize_fund(&self) -> impl Future<Output = Result<U256>> + Send;

    fn prize_multiplier(&self) -> impl Future<Output = Result<u32>> + Send;

    /// Block `number`, or the latest block when `None`.
    fn block(&self, number: Option<u64>) -> impl Future<Output = Result<BlockInfo>> + Send;

    /// Wagers in emission order, optionally filtered by player.
    fn wagers(
        &self,
        player: Option<Address>,
        range: BlockRange,
    ) -> impl Future<Output = Result<Vec<Wager>>> + Send;

    /// Claimed prizes in emission order, optionally filtered by player.
    fn wins(
        &self,
        player: Option<Address>,
        range: BlockRange,
    ) -> impl Future<Output = Result<Vec<WinClaim>>> + Send;

    /// Every period reset, in emission order.
    fn period_resets(&self) -> impl Future<Output = Result<Vec<PayoutPeriod>>> + Send;

    /// Every proposal started, in emission order.
    fn proposals_started(&self) -> impl Future<Output = Result<Vec<(u64, ProposalKind)>>> + Send;

    /// Look up a proposal with the getter matching its kind.
    fn proposal(
        &self,
        id: u64,
        kind: ProposalKind,
    ) -> impl Future<Output = Result<Option<Proposal>>> + Send;

    fn vote_of(
        &self,
        id: u64,
        voter: Address,
    ) -> impl Future<Output = Result<Option<VoteChoice>>> + Send;

    fn balance_of(&self, owner: Address) -> impl Future<Output = Result<U256>> + Send;

    /// Token balance of `owner` as of `timestamp`.
    fn balance_at(
        &self,
        owner: Address,
        timestamp: u64,
    ) -> impl Future<Output = Result<U256>> + Send;

    fn total_supply(&self) -> impl Future<Output = Result<U256>> + Send;

    fn max_total_supply(&self) -> impl Future<Output = Result<U256>> + Send;

    fn leader(&self) -> impl Future<Output = Result<Address>> + Send;

    /// Submit a write. Resolves once the ledger accepted the transaction for inclusion.
    fn submit(&self, call: Call) -> impl Future<Output = Result<Pending>> + Send;

    /// Publish every event of `topic` (restricted to `player` if set) until the upstream ends.
    fn pump(
        &self,
        topic: Topic,
        player: Option<Address>,
        publisher: Publisher,
    ) -> impl Future<Output = Result<()>> + Send;
}
