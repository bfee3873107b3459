//! In-memory ledger for tests.
//!
//! Clones share one backend; [MockLedger::rebind] gives a handle to the same backend under
//! another identity, the way a wallet switch keeps the chain but changes the signer.

use crate::{
    connection::lock,
    fanout::Publisher,
    ledger::{BlockInfo, BlockRange, Call, Ledger, LedgerEvent, Network, Pending, Receipt, Topic},
    Error, Result,
};
use futures::FutureExt;
use honest_types::{
    accountant::PayoutPeriod,
    casino::{resolve, Wager, WinClaim},
    voting::{Proposal, ProposalKind, VoteChoice},
    Address, Rejection, H256, U256,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::{broadcast, Notify};
use tracing::warn;

const EVENT_CAPACITY: usize = 1_024;

type ReadHook = Box<dyn FnOnce() + Send>;

/// State backing a [MockLedger]. Fields are public so tests can arrange any scenario.
#[derive(Default)]
pub struct MockState {
    pub prize_fund: U256,
    pub multiplier: u32,
    pub block: BlockInfo,
    pub wagers: Vec<Wager>,
    pub wins: Vec<WinClaim>,
    pub resets: Vec<PayoutPeriod>,
    pub proposals: BTreeMap<u64, Proposal>,
    pub votes: HashMap<(u64, Address), VoteChoice>,
    pub balances: HashMap<Address, U256>,
    /// `(timestamp, balance)` entries per owner, in timestamp order.
    pub balance_history: HashMap<Address, Vec<(u64, U256)>>,
    pub total_supply: U256,
    pub max_total_supply: U256,
    pub leader: Address,
    pub calls: Vec<Call>,
    /// Rejection returned by the next submit.
    pub reject_next: Option<Rejection>,
    /// Transport failures returned by the next reads.
    pub failing_reads: usize,
    pub fail_pumps: bool,
    /// Number of calls per read method.
    pub reads: HashMap<&'static str, usize>,
    /// Run once at the start of the next read, before it answers.
    pub read_hook: Option<ReadHook>,
}

struct Backend {
    state: Mutex<MockState>,
    events: broadcast::Sender<LedgerEvent>,
    watchers: Mutex<Vec<(Topic, Option<Address>)>>,
    watching: Notify,
}

#[derive(Clone)]
pub struct MockLedger {
    identity: Option<Address>,
    network: Network,
    backend: Arc<Backend>,
}

struct WatchGuard {
    backend: Arc<Backend>,
    key: (Topic, Option<Address>),
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        let mut watchers = lock(&self.backend.watchers, "watchers");
        if let Some(position) = watchers.iter().position(|key| *key == self.key) {
            watchers.swap_remove(position);
        }
    }
}

impl MockLedger {
    pub fn new(identity: Option<Address>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            network: Network {
                chain_id: 31_337,
                rpc_url: "http://127.0.0.1:8545".to_string(),
            },
            backend: Arc::new(Backend {
                state: Mutex::new(MockState {
                    multiplier: 10,
                    ..Default::default()
                }),
                events,
                watchers: Mutex::new(Vec::new()),
                watching: Notify::new(),
            }),
        }
    }

    /// Same backend, another identity.
    pub fn rebind(&self, identity: Option<Address>) -> Self {
        Self {
            identity,
            network: self.network.clone(),
            backend: Arc::clone(&self.backend),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.backend.state, "mock state")
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn reads(&self, method: &'static str) -> usize {
        self.state().reads.get(method).copied().unwrap_or_default()
    }

    /// Broadcast `event` to every upstream, recording it in the history it belongs to.
    pub fn emit(&self, event: LedgerEvent) {
        {
            let mut state = self.state();
            match &event {
                LedgerEvent::WagerPlaced(wager) => state.wagers.push(wager.clone()),
                LedgerEvent::PrizeClaimed(win) => state.wins.push(win.clone()),
                LedgerEvent::PeriodReset(period) => state.resets.push(*period),
                _ => {}
            }
        }
        // No receivers is fine: nothing is watching yet.
        let _ = self.backend.events.send(event);
    }

    /// Produce a block, followed by the prize fund and multiplier readings.
    pub fn advance(&self, number: u64, timestamp: u64) {
        let (fund, multiplier) = {
            let mut state = self.state();
            state.block = BlockInfo { number, timestamp };
            (state.prize_fund, state.multiplier)
        };
        self.emit(LedgerEvent::NewBlock(BlockInfo { number, timestamp }));
        self.emit(LedgerEvent::PrizeFund(fund));
        self.emit(LedgerEvent::Multiplier(multiplier));
    }

    pub fn set_prize_fund(&self, fund: U256) {
        self.state().prize_fund = fund;
    }

    pub fn set_multiplier(&self, multiplier: u32) {
        self.state().multiplier = multiplier;
    }

    /// Set the balance of `owner` from `timestamp` on.
    pub fn set_balance(&self, owner: Address, timestamp: u64, balance: U256) {
        let mut state = self.state();
        state.balances.insert(owner, balance);
        let history = state.balance_history.entry(owner).or_default();
        history.push((timestamp, balance));
        history.sort_by_key(|(timestamp, _)| *timestamp);
    }

    /// Record a proposal and announce it.
    pub fn start_proposal(&self, proposal: Proposal) {
        let (id, kind) = (proposal.id, proposal.kind());
        self.state().proposals.insert(id, proposal);
        self.emit(LedgerEvent::ProposalStarted { id, kind });
    }

    pub fn reject_next(&self, rejection: Rejection) {
        self.state().reject_next = Some(rejection);
    }

    pub fn fail_reads(&self, count: usize) {
        self.state().failing_reads = count;
    }

    /// Run `hook` when the next read starts, with no mock lock held.
    pub fn before_next_read(&self, hook: impl FnOnce() + Send + 'static) {
        self.state().read_hook = Some(Box::new(hook));
    }

    pub fn fail_pumps(&self, fail: bool) {
        self.state().fail_pumps = fail;
    }

    /// Wait until an upstream for `topic` bound to `player` is listening.
    pub async fn until_watching(&self, topic: Topic, player: Option<Address>) {
        loop {
            let notified = self.backend.watching.notified();
            if lock(&self.backend.watchers, "watchers").contains(&(topic, player)) {
                return;
            }
            notified.await;
        }
    }

    fn read(&self, method: &'static str) -> Result<MutexGuard<'_, MockState>> {
        let hook = self.state().read_hook.take();
        if let Some(hook) = hook {
            hook();
        }
        let mut state = self.state();
        *state.reads.entry(method).or_default() += 1;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(Error::Transport(format!("{method}: connection reset")));
        }
        Ok(state)
    }

    fn watch(&self, topic: Topic, player: Option<Address>) -> WatchGuard {
        lock(&self.backend.watchers, "watchers").push((topic, player));
        self.backend.watching.notify_waiters();
        WatchGuard {
            backend: Arc::clone(&self.backend),
            key: (topic, player),
        }
    }
}

impl Ledger for MockLedger {
    fn identity(&self) -> Option<Address> {
        self.identity
    }

    fn network(&self) -> &Network {
        &self.network
    }

    async fn prize_fund(&self) -> Result<U256> {
        Ok(self.read("prize_fund")?.prize_fund)
    }

    async fn prize_multiplier(&self) -> Result<u32> {
        Ok(self.read("prize_multiplier")?.multiplier)
    }

    async fn block(&self, number: Option<u64>) -> Result<BlockInfo> {
        let state = self.read("block")?;
        match number {
            None => Ok(state.block),
            Some(number) if number <= state.block.number => Ok(BlockInfo {
                number,
                timestamp: state.block.timestamp,
            }),
            Some(number) => Err(Error::InvalidData(format!("block {number} not found"))),
        }
    }

    async fn wagers(&self, player: Option<Address>, range: BlockRange) -> Result<Vec<Wager>> {
        let state = self.read("wagers")?;
        Ok(state
            .wagers
            .iter()
            .filter(|wager| player.map_or(true, |player| wager.player == player))
            .filter(|wager| range.contains(wager.block_number))
            .cloned()
            .collect())
    }

    async fn wins(&self, player: Option<Address>, range: BlockRange) -> Result<Vec<WinClaim>> {
        let state = self.read("wins")?;
        Ok(state
            .wins
            .iter()
            .filter(|win| player.map_or(true, |player| win.player == player))
            .filter(|win| range.contains(win.block_number))
            .cloned()
            .collect())
    }

    async fn period_resets(&self) -> Result<Vec<PayoutPeriod>> {
        Ok(self.read("period_resets")?.resets.clone())
    }

    async fn proposals_started(&self) -> Result<Vec<(u64, ProposalKind)>> {
        let state = self.read("proposals_started")?;
        Ok(state
            .proposals
            .values()
            .map(|proposal| (proposal.id, proposal.kind()))
            .collect())
    }

    async fn proposal(&self, id: u64, kind: ProposalKind) -> Result<Option<Proposal>> {
        let state = self.read("proposal")?;
        match state.proposals.get(&id) {
            Some(proposal) if proposal.kind() != kind => Err(Error::InvalidData(format!(
                "proposal {id} is {}, not {kind}",
                proposal.kind()
            ))),
            found => Ok(found.cloned()),
        }
    }

    async fn vote_of(&self, id: u64, voter: Address) -> Result<Option<VoteChoice>> {
        Ok(self.read("vote_of")?.votes.get(&(id, voter)).copied())
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        let state = self.read("balance_of")?;
        Ok(state.balances.get(&owner).copied().unwrap_or_default())
    }

    async fn balance_at(&self, owner: Address, timestamp: u64) -> Result<U256> {
        let state = self.read("balance_at")?;
        Ok(state
            .balance_history
            .get(&owner)
            .and_then(|history| {
                history
                    .iter()
                    .rev()
                    .find(|(at, _)| *at <= timestamp)
                    .map(|(_, balance)| *balance)
            })
            .unwrap_or_default())
    }

    async fn total_supply(&self) -> Result<U256> {
        Ok(self.read("total_supply")?.total_supply)
    }

    async fn max_total_supply(&self) -> Result<U256> {
        Ok(self.read("max_total_supply")?.max_total_supply)
    }

    async fn leader(&self) -> Result<Address> {
        Ok(self.read("leader")?.leader)
    }

    async fn submit(&self, call: Call) -> Result<Pending> {
        let (tx_hash, block_number) = {
            let mut state = self.state();
            if let Some(rejection) = state.reject_next.take() {
                return Err(Error::Rejected(rejection));
            }
            if let (Call::Vote { id, choice }, Some(voter)) = (&call, self.identity) {
                state.votes.insert((*id, voter), *choice);
            }
            state.calls.push(call);
            (
                H256::from_low_u64_be(state.calls.len() as u64),
                state.block.number + 1,
            )
        };
        let receipt = Receipt {
            tx_hash,
            block_number,
            events: Vec::new(),
        };
        Ok(Pending::new(tx_hash, async move { Ok(receipt) }.boxed()))
    }

    async fn pump(
        &self,
        topic: Topic,
        player: Option<Address>,
        publisher: Publisher,
    ) -> Result<()> {
        if self.state().fail_pumps {
            return Err(Error::Transport(format!("{topic} upstream unavailable")));
        }
        let mut events = self.backend.events.subscribe();
        let _guard = self.watch(topic, player);
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.topic() != topic {
                        continue;
                    }
                    if player.is_some() && event.player() != player {
                        continue;
                    }
                    publisher.publish(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%topic, skipped, "mock upstream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            }
        }
    }
}

/// A wager of `player` that lost.
pub fn wager(player: Address, nonce: u16, block_number: u64) -> Wager {
    let mut wager = winning_wager(player, nonce, block_number);
    wager.number = (wager.number + 1) % 100;
    wager
}

/// A wager of `player` whose number matches its outcome.
pub fn winning_wager(player: Address, nonce: u16, block_number: u64) -> Wager {
    let block_hash = H256::from_low_u64_be(block_number);
    Wager {
        player,
        stake: U256::from(1_000_000u64),
        number: resolve(&block_hash, nonce),
        nonce,
        block_number,
        block_hash,
        tx_hash: H256::from_low_u64_be((u64::from(nonce) << 32) | block_number),
    }
}

/// A prize claim settling the wager `nonce` of `player`.
pub fn win(player: Address, nonce: u16, block_number: u64) -> WinClaim {
    WinClaim {
        player,
        number: 0,
        nonce,
        prize: U256::from(10_000_000u64),
        block_number,
        tx_hash: H256::from_low_u64_be(block_number + 1),
    }
}
