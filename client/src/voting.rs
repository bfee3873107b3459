//! Governance desk: the proposal index, proposal lookups and the voting writes.

use crate::{
    config::Settings,
    connection::{lock, Connection, Memo},
    fanout::Consumer,
    ledger::{Call, Ledger, LedgerEvent, Pending},
    Error, Result,
};
use futures::future::try_join_all;
use honest_types::{
    voting::{Proposal, ProposalContext, ProposalKind, ProposalRequest, VoteChoice},
    Address, Precondition, U256,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

type Index = BTreeMap<u64, ProposalKind>;

pub struct Governance<L: Ledger> {
    connection: Arc<Connection<L>>,
    settings: Settings,
    /// Kind of every started proposal by id, bootstrapped from history.
    index: Mutex<Memo<Index>>,
}

impl<L: Ledger> Governance<L> {
    pub fn new(connection: Arc<Connection<L>>, settings: Settings) -> Self {
        Self {
            connection,
            settings,
            index: Mutex::new(Memo::default()),
        }
    }

    fn identity(&self, ledger: &L) -> Result<Address> {
        ledger.identity().ok_or(Error::NoSigner)
    }

    async fn refresh_index(&self) -> Result<Index> {
        let generation = lock(&self.index, "proposal index").generation();
        let ledger = self.connection.current();
        let started = self
            .settings
            .retry
            .read("proposals_started", || ledger.proposals_started())
            .await?;
        let mut memo = lock(&self.index, "proposal index");
        if generation != memo.generation() {
            debug!("connection changed; proposal index not cached");
            return Ok(started.into_iter().collect());
        }
        let mut merged = memo.get().cloned().unwrap_or_default();
        merged.extend(started);
        debug!(proposals = merged.len(), "proposal index refreshed");
        memo.fill(generation, merged.clone());
        Ok(merged)
    }

    async fn index(&self) -> Result<Index> {
        let cached = lock(&self.index, "proposal index").get().cloned();
        match cached {
            Some(index) => Ok(index),
            None => self.refresh_index().await,
        }
    }

    async fn kind_of(&self, id: u64) -> Result<ProposalKind> {
        if let Some(kind) = self.index().await?.get(&id) {
            return Ok(*kind);
        }
        // Started after the index was built and not yet pushed.
        self.refresh_index()
            .await?
            .get(&id)
            .copied()
            .ok_or(Error::UnknownProposal(id))
    }

    pub async fn proposal(&self, id: u64) -> Result<Proposal> {
        let kind = self.kind_of(id).await?;
        let ledger = self.connection.current();
        self.settings
            .retry
            .read("proposal", || ledger.proposal(id, kind))
            .await?
            .ok_or(Error::UnknownProposal(id))
    }

    /// Every known proposal, by id.
    pub async fn proposals(&self) -> Result<Vec<Proposal>> {
        let index = self.index().await?;
        try_join_all(index.keys().map(|id| self.proposal(*id))).await
    }

    pub async fn my_vote(&self, id: u64) -> Result<Option<VoteChoice>> {
        let ledger = self.connection.current();
        let voter = self.identity(&ledger)?;
        self.settings
            .retry
            .read("vote_of", || ledger.vote_of(id, voter))
            .await
    }

    /// Current token balance of the identity, the weight a vote cast now carries.
    pub async fn my_weight(&self) -> Result<U256> {
        let ledger = self.connection.current();
        let owner = self.identity(&ledger)?;
        self.settings
            .retry
            .read("balance_of", || ledger.balance_of(owner))
            .await
    }

    pub async fn leader(&self) -> Result<Address> {
        let ledger = self.connection.current();
        self.settings.retry.read("leader", || ledger.leader()).await
    }

    pub async fn total_supply(&self) -> Result<U256> {
        let ledger = self.connection.current();
        self.settings
            .retry
            .read("total_supply", || ledger.total_supply())
            .await
    }

    async fn now(&self) -> Result<u64> {
        let ledger = self.connection.current();
        let block = self
            .settings
            .retry
            .read("block", || ledger.block(None))
            .await?;
        Ok(block.timestamp)
    }

    pub async fn start(&self, request: ProposalRequest) -> Result<Pending> {
        let ledger = self.connection.current();
        let max_total_supply = self
            .settings
            .retry
            .read("max_total_supply", || ledger.max_total_supply())
            .await?;
        let context = ProposalContext {
            proposer_weight: self.my_weight().await?,
            max_total_supply,
        };
        request.authorize(&context)?;
        let kind = request.kind();
        let duration = request.duration();
        let pending = ledger.submit(Call::StartProposal(request)).await?;
        info!(tx = ?pending.tx_hash, %kind, duration, "proposal submitted");
        Ok(pending)
    }

    pub async fn vote(&self, id: u64, choice: VoteChoice) -> Result<Pending> {
        let (proposal, now, weight) =
            futures::try_join!(self.proposal(id), self.now(), self.my_weight())?;
        proposal.check_vote(now, weight)?;
        let pending = self
            .connection
            .current()
            .submit(Call::Vote { id, choice })
            .await?;
        info!(tx = ?pending.tx_hash, id, ?choice, %weight, "vote submitted");
        Ok(pending)
    }

    pub async fn execute(&self, id: u64) -> Result<Pending> {
        let (proposal, now) = futures::try_join!(self.proposal(id), self.now())?;
        proposal.check_execute(now)?;
        let ledger = self.connection.current();
        self.identity(&ledger)?;
        let pending = ledger.submit(Call::Execute { id }).await?;
        info!(
            tx = ?pending.tx_hash,
            id,
            decision = ?proposal.decide(),
            effect = ?proposal.expected_effect(),
            "execution submitted"
        );
        Ok(pending)
    }

    /// Convert `value` into governance-weight tokens.
    pub async fn mint(&self, value: U256) -> Result<Pending> {
        if value.is_zero() {
            return Err(Precondition::ZeroMint.into());
        }
        let ledger = self.connection.current();
        self.identity(&ledger)?;
        let pending = ledger.submit(Call::Mint { value }).await?;
        info!(tx = ?pending.tx_hash, %value, "mint submitted");
        Ok(pending)
    }

    /// Record a proposal start pushed by the ledger.
    pub fn observe_started(&self, id: u64, kind: ProposalKind) {
        if let Some(index) = lock(&self.index, "proposal index").get_mut() {
            debug!(id, %kind, "proposal started");
            index.insert(id, kind);
        }
    }

    pub fn invalidate(&self) {
        lock(&self.index, "proposal index").invalidate();
    }

    /// Follow proposal starts from `consumer` until its feed closes.
    pub fn watch(self: &Arc<Self>, mut consumer: Consumer<LedgerEvent>) -> JoinHandle<()> {
        let governance = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = consumer.next().await {
                if let LedgerEvent::ProposalStarted { id, kind } = event {
                    governance.observe_started(id, kind);
                }
            }
            debug!("proposal feed closed");
        })
    }
}
