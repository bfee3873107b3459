//! Dividend accountant: the current payout period, the identity's share and the payout verbs.

use crate::{
    config::Settings,
    connection::{lock, Connection, Memo},
    fanout::Consumer,
    ledger::{Call, Ledger, LedgerEvent, Pending},
    Error, Result,
};
use honest_types::{
    accountant::{PayoutAction, PayoutPeriod},
    Address, U256,
};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct DividendAccountant<L: Ledger> {
    connection: Arc<Connection<L>>,
    settings: Settings,
    /// Latest known period. Cleared on reinit, replaced on reset events.
    period: Mutex<Memo<PayoutPeriod>>,
}

impl<L: Ledger> DividendAccountant<L> {
    pub fn new(connection: Arc<Connection<L>>, settings: Settings) -> Self {
        Self {
            connection,
            settings,
            period: Mutex::new(Memo::default()),
        }
    }

    pub fn period_length(&self) -> u64 {
        self.settings.payout_period_secs
    }

    pub fn cached_period(&self) -> Option<PayoutPeriod> {
        lock(&self.period, "payout period").get().copied()
    }

    /// The latest period, looked up from the reset history on first use.
    pub async fn current_period(&self) -> Result<PayoutPeriod> {
        let generation = {
            let memo = lock(&self.period, "payout period");
            if let Some(period) = memo.get() {
                return Ok(*period);
            }
            memo.generation()
        };
        let ledger = self.connection.current();
        let resets = self
            .settings
            .retry
            .read("period_resets", || ledger.period_resets())
            .await?;
        let period = resets.last().copied().ok_or(Error::NoPayoutPeriod)?;
        let mut memo = lock(&self.period, "payout period");
        // A reset observed during the lookup is newer than the history.
        if let Some(known) = memo.get() {
            return Ok(*known);
        }
        if memo.fill(generation, period) {
            debug!(
                started_at = period.started_at,
                resets = resets.len(),
                "bootstrapped payout period"
            );
        } else {
            debug!(started_at = period.started_at, "connection changed; period not cached");
        }
        Ok(period)
    }

    /// Record a reset pushed by the ledger.
    pub fn observe_reset(&self, period: PayoutPeriod) {
        let mut memo = lock(&self.period, "payout period");
        if memo.get().is_some_and(|known| known.started_at > period.started_at) {
            return;
        }
        debug!(
            started_at = period.started_at,
            payout = %period.payout_snapshot,
            "payout period reset"
        );
        memo.set(period);
    }

    pub fn invalidate(&self) {
        lock(&self.period, "payout period").invalidate();
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

    /// Share of the current period owed to `owner`, from the balance held at the period start.
    pub async fn share_of(&self, owner: Address) -> Result<U256> {
        let period = self.current_period().await?;
        let ledger = self.connection.current();
        let balance = self
            .settings
            .retry
            .read("balance_at", || ledger.balance_at(owner, period.started_at))
            .await?;
        Ok(period.share_of(balance))
    }

    pub async fn my_share(&self) -> Result<U256> {
        let identity = self.connection.current().identity().ok_or(Error::NoSigner)?;
        self.share_of(identity).await
    }

    /// The payout verb the ledger accepts at the latest block.
    pub async fn next_action(&self) -> Result<PayoutAction> {
        let (period, now) = futures::try_join!(self.current_period(), self.now())?;
        Ok(period.next_action(now, self.period_length()))
    }

    async fn check(&self, action: PayoutAction) -> Result<()> {
        let (period, now) = futures::try_join!(self.current_period(), self.now())?;
        period.check_action(action, now, self.period_length())?;
        Ok(())
    }

    pub async fn request_payout(&self) -> Result<Pending> {
        self.check(PayoutAction::ClaimPayout).await?;
        let ledger = self.connection.current();
        let player = ledger.identity().ok_or(Error::NoSigner)?;
        let pending = ledger.submit(Call::RequestPayout { player }).await?;
        info!(tx = ?pending.tx_hash, ?player, "payout requested");
        Ok(pending)
    }

    pub async fn reset_period(&self) -> Result<Pending> {
        self.check(PayoutAction::ResetPeriod).await?;
        let ledger = self.connection.current();
        ledger.identity().ok_or(Error::NoSigner)?;
        let pending = ledger.submit(Call::ResetPeriod).await?;
        info!(tx = ?pending.tx_hash, "period reset submitted");
        Ok(pending)
    }

    /// Follow reset events from `consumer` until its feed closes.
    pub fn watch(self: &Arc<Self>, mut consumer: Consumer<LedgerEvent>) -> JoinHandle<()> {
        let accountant = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = consumer.next().await {
                if let LedgerEvent::PeriodReset(period) = event {
                    accountant.observe_reset(period);
                }
            }
            debug!("period reset feed closed");
        })
    }
}
