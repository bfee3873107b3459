//! [Ledger] over an EVM JSON-RPC endpoint.
//!
//! Component addresses are resolved through the registry contract when connecting, so a fresh
//! [EvmLedger::connect] after an upgrade picks up the replacement contracts.

use crate::{
    config::ValidatedConfig,
    fanout::Publisher,
    ledger::{BlockInfo, BlockRange, Call, Ledger, LedgerEvent, Network, Pending, Receipt, Topic},
    retry::{within, RetryPolicy},
    Error, Result,
};
use ethers::{
    abi::RawLog,
    contract::{ContractCall, ContractError, EthLogDecode, LogMeta},
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider, ProviderError},
    signers::LocalWallet,
    types::{BlockNumber, TransactionReceipt, U64},
};
use futures::{FutureExt, StreamExt};
use honest_types::{
    accountant::PayoutPeriod,
    casino::{Wager, WinClaim},
    voting::{
        ContractType, Parameter, Proposal, ProposalAction, ProposalKind, ProposalRequest,
        VoteChoice,
    },
    Address, Rejection, H256, U256,
};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::sleep;
use tracing::{debug, info, trace};

mod bindings {
    use ethers::contract::abigen;

    abigen!(
        Registry,
        r#"[
            function getCasino() external view returns (address)
            function getVoting() external view returns (address)
            function getAccountant() external view returns (address)
            function getJoiToken() external view returns (address)
        ]"#
    );

    abigen!(
        HonestCasino,
        r#"[
            event Guess(address indexed guesser, uint256 bet, uint16 nonce, uint8 number)
            event PrizeClaim(address indexed guesser, uint8 number, uint256 prizeValue, uint16 nonce)
            function prizeMultiplier() external view returns (uint8)
            function guess(uint8 number) external payable
            function claimPrize(address player) external
        ]"#
    );

    abigen!(
        Accountant,
        r#"[
            event DividendsDistributionSessionReset(uint256 startedAt, uint256 ethBalance, uint256 joiTotalSupply)
            function requestPayout(address to) external
            function tryResetDividendsDistributionSession() external
        ]"#
    );

    abigen!(
        Voting,
        r#"[
            event VotingStarted(uint256 indexed votingId, uint8 votingType)
            function getCommonVoting(uint256 id) external view returns (uint256, uint32, string, bool, uint256, uint256)
            function getUpgradeVoting(uint256 id) external view returns (uint256, uint32, string, bool, uint256, uint256, uint8, address)
            function getUintChangeVoting(uint256 id) external view returns (uint256, uint32, string, bool, uint256, uint256, uint8, uint8, uint256)
            function getLeaderElectionVoting(uint256 id) external view returns (uint256, uint32, string, bool, uint256, uint256, address)
            function getVoteOf(uint256 id, address voter) external view returns (uint8)
            function startCommonVoting(uint32 duration, string description) external
            function startUpgradeVoting(uint8 contractType, uint32 duration, address nextVersion, string description) external
            function startUintChangeVoting(uint8 contractType, uint8 parameterIdx, uint32 duration, uint256 newValue, string description) external
            function startLeaderElection(uint32 duration, address candidate, string description) external
            function vote(uint256 id, uint8 status) external
            function executeVoting(uint256 id) external
        ]"#
    );

    abigen!(
        JoiToken,
        r#"[
            function totalSupply() external view returns (uint256)
            function balanceOf(address owner) external view returns (uint256)
            function balanceAt(address owner, uint256 timestamp) external view returns (uint256)
            function getMaxTotalSupply() external view returns (uint256)
            function getLeader() external view returns (address)
            function mint(address to) external payable
        ]"#
    );
}

use bindings::{
    Accountant, DividendsDistributionSessionResetFilter, GuessFilter, HonestCasino, JoiToken,
    PrizeClaimFilter, Registry, Voting, VotingStartedFilter,
};

type Signed = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Fields shared by every proposal getter.
type ProposalHead = (U256, u32, String, bool, U256, U256);

/// Addresses of the ledger components, as resolved through the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Contracts {
    pub casino: Address,
    pub voting: Address,
    pub accountant: Address,
    pub token: Address,
}

#[derive(Clone)]
pub struct EvmLedger {
    network: Network,
    provider: Arc<Provider<Http>>,
    signer: Option<Arc<Signed>>,
    contracts: Contracts,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    /// Applied to the reads behind the new-block upstream.
    retry: RetryPolicy,
}

impl EvmLedger {
    /// Connect to the configured endpoint and resolve the components through the registry.
    pub async fn connect(config: &ValidatedConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.network.rpc_url.as_str())
            .map_err(|err| Error::InvalidData(format!("invalid rpc url: {err}")))?
            .interval(config.poll_interval);
        let chain_id = provider.get_chainid().await.map_err(provider_error)?;
        if chain_id != U256::from(config.network.chain_id) {
            return Err(Error::Transport(format!(
                "endpoint serves chain {chain_id}, expected {}",
                config.network.chain_id
            )));
        }
        let provider = Arc::new(provider);

        let registry = Registry::new(config.registry, Arc::clone(&provider));
        let (casino, voting, accountant, token) = futures::try_join!(
            component(registry.get_casino(), Rejection::CasinoUnset),
            component(registry.get_voting(), Rejection::VotingUnset),
            component(registry.get_accountant(), Rejection::AccountantUnset),
            component(registry.get_joi_token(), Rejection::TokenUnset),
        )?;
        let contracts = Contracts {
            casino,
            voting,
            accountant,
            token,
        };

        let signer = config
            .wallet
            .clone()
            .map(|wallet| Arc::new(SignerMiddleware::new((*provider).clone(), wallet)));
        info!(
            chain_id = config.network.chain_id,
            ?contracts,
            identity = ?signer.as_ref().map(|signer| signer.address()),
            "connected to ledger"
        );
        Ok(Self {
            network: config.network.clone(),
            provider,
            signer,
            contracts,
            poll_interval: config.poll_interval,
            confirmation_timeout: config.confirmation_timeout,
            retry: config.settings.retry,
        })
    }

    pub fn contracts(&self) -> Contracts {
        self.contracts
    }

    fn casino(&self) -> HonestCasino<Provider<Http>> {
        HonestCasino::new(self.contracts.casino, Arc::clone(&self.provider))
    }

    fn accountant(&self) -> Accountant<Provider<Http>> {
        Accountant::new(self.contracts.accountant, Arc::clone(&self.provider))
    }

    fn voting(&self) -> Voting<Provider<Http>> {
        Voting::new(self.contracts.voting, Arc::clone(&self.provider))
    }

    fn token(&self) -> JoiToken<Provider<Http>> {
        JoiToken::new(self.contracts.token, Arc::clone(&self.provider))
    }

    fn signer(&self) -> Result<&Arc<Signed>> {
        self.signer.as_ref().ok_or(Error::NoSigner)
    }

    async fn read_proposal(&self, id: u64, kind: ProposalKind) -> Result<Proposal> {
        let voting = self.voting();
        let key = U256::from(id);
        let (head, action) = match kind {
            ProposalKind::Common => {
                let head: ProposalHead = voting
                    .get_common_voting(key)
                    .call()
                    .await
                    .map_err(contract_error)?;
                (head, ProposalAction::Common)
            }
            ProposalKind::Upgrade => {
                let (
                    created_at,
                    duration,
                    description,
                    executed,
                    accepted,
                    rejected,
                    target,
                    next,
                ) = voting
                    .get_upgrade_voting(key)
                    .call()
                    .await
                    .map_err(contract_error)?;
                let target = ContractType::try_from(target)
                    .map_err(|err| Error::InvalidData(err.to_string()))?;
                (
                    (created_at, duration, description, executed, accepted, rejected),
                    ProposalAction::Upgrade {
                        target,
                        replacement: next,
                    },
                )
            }
            ProposalKind::ParameterChange => {
                let (
                    created_at,
                    duration,
                    description,
                    executed,
                    accepted,
                    rejected,
                    target,
                    index,
                    value,
                ) = voting
                    .get_uint_change_voting(key)
                    .call()
                    .await
                    .map_err(contract_error)?;
                let target = ContractType::try_from(target)
                    .map_err(|err| Error::InvalidData(err.to_string()))?;
                let parameter = Parameter::from_wire(target, index).ok_or_else(|| {
                    Error::InvalidData(format!("no parameter {index} on {target}"))
                })?;
                (
                    (created_at, duration, description, executed, accepted, rejected),
                    ProposalAction::ParameterChange { parameter, value },
                )
            }
            ProposalKind::LeaderElection => {
                let (created_at, duration, description, executed, accepted, rejected, candidate) =
                    voting
                        .get_leader_election_voting(key)
                        .call()
                        .await
                        .map_err(contract_error)?;
                (
                    (created_at, duration, description, executed, accepted, rejected),
                    ProposalAction::LeaderElection { candidate },
                )
            }
        };
        let (created_at, duration, description, executed, accepted, rejected) = head;
        Ok(Proposal {
            id,
            created_at: to_u64(created_at, "proposal creation time")?,
            duration: u64::from(duration),
            description,
            accepted,
            rejected,
            executed,
            action,
        })
    }

    fn write_call(&self, signer: &Arc<Signed>, call: Call) -> Result<ContractCall<Signed, ()>> {
        let casino = || HonestCasino::new(self.contracts.casino, Arc::clone(signer));
        let accountant = || Accountant::new(self.contracts.accountant, Arc::clone(signer));
        let voting = || Voting::new(self.contracts.voting, Arc::clone(signer));
        let call = match call {
            Call::Guess { number, value } => casino().guess(number).value(value),
            Call::ClaimPrize { player } => casino().claim_prize(player),
            Call::Mint { value } => JoiToken::new(self.contracts.token, Arc::clone(signer))
                .mint(signer.address())
                .value(value),
            Call::RequestPayout { player } => accountant().request_payout(player),
            Call::ResetPeriod => accountant().try_reset_dividends_distribution_session(),
            Call::StartProposal(request) => start_call(&voting(), &request)?,
            Call::Vote { id, choice } => voting().vote(U256::from(id), choice as u8),
            Call::Execute { id } => voting().execute_voting(U256::from(id)),
        };
        Ok(call)
    }

    async fn publish_blocks(&self, publisher: &Publisher) -> Result<()> {
        let mut blocks = self.provider.watch_blocks().await.map_err(provider_error)?;
        while let Some(hash) = blocks.next().await {
            let events = block_readings(
                &self.retry,
                || self.block_info(hash),
                || self.prize_fund(),
                || self.prize_multiplier(),
            )
            .await?;
            for event in events {
                publisher.publish(event);
            }
        }
        Ok(())
    }

    async fn block_info(
        &self,
        id: impl Into<ethers::types::BlockId> + Send + Sync,
    ) -> Result<BlockInfo> {
        let block = self
            .provider
            .get_block(id)
            .await
            .map_err(provider_error)?
            .ok_or_else(|| Error::InvalidData("block not found".to_string()))?;
        Ok(BlockInfo {
            number: block
                .number
                .map(|number| number.as_u64())
                .ok_or_else(|| Error::InvalidData("block is still pending".to_string()))?,
            timestamp: to_u64(block.timestamp, "block timestamp")?,
        })
    }
}

impl Ledger for EvmLedger {
    fn identity(&self) -> Option<Address> {
        self.signer.as_ref().map(|signer| signer.address())
    }

    fn network(&self) -> &Network {
        &self.network
    }

    async fn prize_fund(&self) -> Result<U256> {
        self.provider
            .get_balance(self.contracts.casino, None)
            .await
            .map_err(provider_error)
    }

    async fn prize_multiplier(&self) -> Result<u32> {
        let multiplier = self
            .casino()
            .prize_multiplier()
            .call()
            .await
            .map_err(contract_error)?;
        Ok(u32::from(multiplier))
    }

    async fn block(&self, number: Option<u64>) -> Result<BlockInfo> {
        match number {
            Some(number) => self.block_info(number).await,
            None => self.block_info(BlockNumber::Latest).await,
        }
    }

    async fn wagers(&self, player: Option<Address>, range: BlockRange) -> Result<Vec<Wager>> {
        let casino = self.casino();
        let mut event = casino
            .event::<GuessFilter>()
            .from_block(range.from.unwrap_or_default());
        if let Some(to) = range.to {
            event = event.to_block(to);
        }
        if let Some(player) = player {
            event = event.topic1(H256::from(player));
        }
        let mut logs = event.query_with_meta().await.map_err(contract_error)?;
        logs.sort_by_key(|(_, meta)| (meta.block_number, meta.log_index));
        Ok(logs
            .into_iter()
            .map(|(guess, meta)| wager(guess, &meta))
            .collect())
    }

    async fn wins(&self, player: Option<Address>, range: BlockRange) -> Result<Vec<WinClaim>> {
        let casino = self.casino();
        let mut event = casino
            .event::<PrizeClaimFilter>()
            .from_block(range.from.unwrap_or_default());
        if let Some(to) = range.to {
            event = event.to_block(to);
        }
        if let Some(player) = player {
            event = event.topic1(H256::from(player));
        }
        let mut logs = event.query_with_meta().await.map_err(contract_error)?;
        logs.sort_by_key(|(_, meta)| (meta.block_number, meta.log_index));
        Ok(logs
            .into_iter()
            .map(|(claim, meta)| win(claim, &meta))
            .collect())
    }

    async fn period_resets(&self) -> Result<Vec<PayoutPeriod>> {
        let accountant = self.accountant();
        let mut logs = accountant
            .event::<DividendsDistributionSessionResetFilter>()
            .from_block(0u64)
            .query_with_meta()
            .await
            .map_err(contract_error)?;
        logs.sort_by_key(|(_, meta)| (meta.block_number, meta.log_index));
        logs.into_iter().map(|(reset, _)| period(reset)).collect()
    }

    async fn proposals_started(&self) -> Result<Vec<(u64, ProposalKind)>> {
        let voting = self.voting();
        let mut logs = voting
            .event::<VotingStartedFilter>()
            .from_block(0u64)
            .query_with_meta()
            .await
            .map_err(contract_error)?;
        logs.sort_by_key(|(_, meta)| (meta.block_number, meta.log_index));
        logs.into_iter().map(|(started, _)| proposal_started(started)).collect()
    }

    async fn proposal(&self, id: u64, kind: ProposalKind) -> Result<Option<Proposal>> {
        match self.read_proposal(id, kind).await {
            Ok(proposal) => Ok(Some(proposal)),
            Err(Error::Rejected(Rejection::VotingNotFound)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn vote_of(&self, id: u64, voter: Address) -> Result<Option<VoteChoice>> {
        let status = self
            .voting()
            .get_vote_of(U256::from(id), voter)
            .call()
            .await
            .map_err(contract_error)?;
        VoteChoice::from_status(status).map_err(|err| Error::InvalidData(err.to_string()))
    }

    async fn balance_of(&self, owner: Address) -> Result<U256> {
        self.token()
            .balance_of(owner)
            .call()
            .await
            .map_err(contract_error)
    }

    async fn balance_at(&self, owner: Address, timestamp: u64) -> Result<U256> {
        self.token()
            .balance_at(owner, U256::from(timestamp))
            .call()
            .await
            .map_err(contract_error)
    }

    async fn total_supply(&self) -> Result<U256> {
        self.token()
            .total_supply()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn max_total_supply(&self) -> Result<U256> {
        self.token()
            .get_max_total_supply()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn leader(&self) -> Result<Address> {
        self.token()
            .get_leader()
            .call()
            .await
            .map_err(contract_error)
    }

    async fn submit(&self, call: Call) -> Result<Pending> {
        let signer = self.signer()?;
        let name = call.name();
        let contract_call = self.write_call(signer, call)?;
        let tx_hash = contract_call
            .send()
            .await
            .map_err(contract_error)?
            .tx_hash();
        debug!(call = name, tx = ?tx_hash, "transaction accepted");

        let provider = Arc::clone(&self.provider);
        let contracts = self.contracts;
        let poll_interval = self.poll_interval;
        let confirmation = within(
            self.confirmation_timeout,
            confirm(provider, contracts, tx_hash, poll_interval),
        );
        Ok(Pending::new(tx_hash, confirmation.boxed()))
    }

    async fn pump(
        &self,
        topic: Topic,
        player: Option<Address>,
        publisher: Publisher,
    ) -> Result<()> {
        let player = player.map(H256::from);
        match topic {
            Topic::NewBlock => self.publish_blocks(&publisher).await?,
            Topic::WagerPlaced => {
                let casino = self.casino();
                let mut event = casino.event::<GuessFilter>();
                if let Some(player) = player {
                    event = event.topic1(player);
                }
                let mut stream = event.stream_with_meta().await.map_err(contract_error)?;
                while let Some(item) = stream.next().await {
                    let (guess, meta) = item.map_err(contract_error)?;
                    publisher.publish(LedgerEvent::WagerPlaced(wager(guess, &meta)));
                }
            }
            Topic::PrizeClaimed => {
                let casino = self.casino();
                let mut event = casino.event::<PrizeClaimFilter>();
                if let Some(player) = player {
                    event = event.topic1(player);
                }
                let mut stream = event.stream_with_meta().await.map_err(contract_error)?;
                while let Some(item) = stream.next().await {
                    let (claim, meta) = item.map_err(contract_error)?;
                    publisher.publish(LedgerEvent::PrizeClaimed(win(claim, &meta)));
                }
            }
            Topic::ProposalStarted => {
                let voting = self.voting();
                let event = voting.event::<VotingStartedFilter>();
                let mut stream = event.stream().await.map_err(contract_error)?;
                while let Some(item) = stream.next().await {
                    let (id, kind) = proposal_started(item.map_err(contract_error)?)?;
                    publisher.publish(LedgerEvent::ProposalStarted { id, kind });
                }
            }
            Topic::PeriodReset => {
                let accountant = self.accountant();
                let event = accountant.event::<DividendsDistributionSessionResetFilter>();
                let mut stream = event.stream().await.map_err(contract_error)?;
                while let Some(item) = stream.next().await {
                    let reset = period(item.map_err(contract_error)?)?;
                    publisher.publish(LedgerEvent::PeriodReset(reset));
                }
            }
        }
        Ok(())
    }
}

async fn component(
    call: ContractCall<Provider<Http>, Address>,
    unset: Rejection,
) -> Result<Address> {
    let address = call.call().await.map_err(contract_error)?;
    if address.is_zero() {
        return Err(Error::Rejected(unset));
    }
    Ok(address)
}

fn start_call(
    voting: &Voting<Signed>,
    request: &ProposalRequest,
) -> Result<ContractCall<Signed, ()>> {
    let duration = u32::try_from(request.duration())
        .map_err(|_| Error::InvalidData(format!("duration {} too long", request.duration())))?;
    let description = request.description().to_string();
    let call = match *request.action() {
        ProposalAction::Common => voting.start_common_voting(duration, description),
        ProposalAction::Upgrade {
            target,
            replacement,
        } => voting.start_upgrade_voting(target as u8, duration, replacement, description),
        ProposalAction::ParameterChange { parameter, value } => voting.start_uint_change_voting(
            parameter.contract() as u8,
            parameter.index(),
            duration,
            value,
            description,
        ),
        ProposalAction::LeaderElection { candidate } => {
            voting.start_leader_election(duration, candidate, description)
        }
    };
    Ok(call)
}

/// Poll for the receipt of `tx_hash` and decode the events it emitted.
async fn confirm(
    provider: Arc<Provider<Http>>,
    contracts: Contracts,
    tx_hash: H256,
    poll_interval: Duration,
) -> Result<Receipt> {
    loop {
        match provider.get_transaction_receipt(tx_hash).await.map_err(provider_error) {
            Ok(Some(receipt)) => {
                if receipt.status == Some(U64::zero()) {
                    return Err(Error::Reverted(format!("transaction {tx_hash:#x} reverted")));
                }
                let events = receipt_events(&contracts, &receipt);
                let block_number = receipt
                    .block_number
                    .map(|number| number.as_u64())
                    .unwrap_or_default();
                info!(tx = ?tx_hash, block_number, events = events.len(), "transaction confirmed");
                return Ok(Receipt {
                    tx_hash,
                    block_number,
                    events,
                });
            }
            Ok(None) => {}
            Err(err) if err.is_transport() => {
                debug!(tx = ?tx_hash, error = %err, "receipt poll failed")
            }
            Err(err) => return Err(err),
        }
        sleep(poll_interval).await;
    }
}

/// Ledger events in the logs of `receipt`, in log order.
fn receipt_events(contracts: &Contracts, receipt: &TransactionReceipt) -> Vec<LedgerEvent> {
    let meta = |log_index| LogMeta {
        address: Address::zero(),
        block_number: receipt.block_number.unwrap_or_default(),
        block_hash: receipt.block_hash.unwrap_or_default(),
        transaction_hash: receipt.transaction_hash,
        transaction_index: receipt.transaction_index,
        log_index,
    };
    receipt
        .logs
        .iter()
        .filter_map(|log| {
            let raw = RawLog {
                topics: log.topics.clone(),
                data: log.data.to_vec(),
            };
            let log_meta = meta(log.log_index.unwrap_or_default());
            if log.address == contracts.casino {
                if let Ok(guess) = GuessFilter::decode_log(&raw) {
                    return Some(LedgerEvent::WagerPlaced(wager(guess, &log_meta)));
                }
                let claim = PrizeClaimFilter::decode_log(&raw).ok()?;
                Some(LedgerEvent::PrizeClaimed(win(claim, &log_meta)))
            } else if log.address == contracts.accountant {
                let reset = DividendsDistributionSessionResetFilter::decode_log(&raw).ok()?;
                period(reset).ok().map(LedgerEvent::PeriodReset)
            } else if log.address == contracts.voting {
                let started = VotingStartedFilter::decode_log(&raw).ok()?;
                proposal_started(started)
                    .ok()
                    .map(|(id, kind)| LedgerEvent::ProposalStarted { id, kind })
            } else {
                None
            }
        })
        .collect()
}

fn wager(guess: GuessFilter, meta: &LogMeta) -> Wager {
    Wager {
        player: guess.guesser,
        stake: guess.bet,
        number: guess.number,
        nonce: guess.nonce,
        block_number: meta.block_number.as_u64(),
        block_hash: meta.block_hash,
        tx_hash: meta.transaction_hash,
    }
}

fn win(claim: PrizeClaimFilter, meta: &LogMeta) -> WinClaim {
    WinClaim {
        player: claim.guesser,
        number: claim.number,
        nonce: claim.nonce,
        prize: claim.prize_value,
        block_number: meta.block_number.as_u64(),
        tx_hash: meta.transaction_hash,
    }
}

fn period(reset: DividendsDistributionSessionResetFilter) -> Result<PayoutPeriod> {
    Ok(PayoutPeriod {
        started_at: to_u64(reset.started_at, "period start")?,
        payout_snapshot: reset.eth_balance,
        total_supply_snapshot: reset.joi_total_supply,
    })
}

fn proposal_started(started: VotingStartedFilter) -> Result<(u64, ProposalKind)> {
    let kind = ProposalKind::try_from(started.voting_type)
        .map_err(|err| Error::InvalidData(err.to_string()))?;
    Ok((to_u64(started.voting_id, "proposal id")?, kind))
}

fn to_u64(value: U256, what: &str) -> Result<u64> {
    if value > U256::from(u64::MAX) {
        return Err(Error::InvalidData(format!("{what} {value} does not fit in 64 bits")));
    }
    Ok(value.low_u64())
}

fn provider_error(err: ProviderError) -> Error {
    let message = err.to_string();
    match Rejection::from_revert(&message) {
        Some(rejection) => Error::Rejected(rejection),
        None => Error::Transport(message),
    }
}

/// Map a contract failure to a coded rejection where the revert reason carries one.
fn contract_error<M: Middleware>(err: ContractError<M>) -> Error {
    if let Some(reason) = err.decode_revert::<String>() {
        return Error::from_revert(reason);
    }
    let message = err.to_string();
    if let Some(rejection) = Rejection::from_revert(&message) {
        return Error::Rejected(rejection);
    }
    match err {
        ContractError::MiddlewareError { .. } | ContractError::ProviderError { .. }
            if !message.contains("revert") =>
        {
            Error::Transport(message)
        }
        _ => Error::Reverted(message),
    }
}

/// A new block followed by the prize fund and multiplier read after it.
async fn block_readings<B, F, M>(
    retry: &RetryPolicy,
    block: impl FnMut() -> B,
    fund: impl FnMut() -> F,
    multiplier: impl FnMut() -> M,
) -> Result<[LedgerEvent; 3]>
where
    B: Future<Output = Result<BlockInfo>>,
    F: Future<Output = Result<U256>>,
    M: Future<Output = Result<u32>>,
{
    let info = retry.read("block", block).await?;
    trace!(number = info.number, "new block");
    let (fund, multiplier) = futures::try_join!(
        retry.read("prize_fund", fund),
        retry.read("prize_multiplier", multiplier)
    )?;
    Ok([
        LedgerEvent::NewBlock(info),
        LedgerEvent::PrizeFund(fund),
        LedgerEvent::Multiplier(multiplier),
    ])
}
