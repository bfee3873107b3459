//! The assembled mirror: one connection shared by the bus and every desk.

use crate::{
    accountant::DividendAccountant,
    casino::CasinoDesk,
    config::Settings,
    connection::{lock, Connection},
    fanout::{Consumer, EventFanoutBus, Feed},
    ledger::{Ledger, LedgerEvent},
    voting::Governance,
};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

pub struct Mirror<L: Ledger> {
    connection: Arc<Connection<L>>,
    bus: EventFanoutBus<L>,
    casino: CasinoDesk<L>,
    accountant: Arc<DividendAccountant<L>>,
    governance: Arc<Governance<L>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl<L: Ledger> Mirror<L> {
    /// Assemble the mirror and start the cache watchers.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(ledger: L, settings: Settings) -> Self {
        let connection = Arc::new(Connection::new(ledger));
        let bus = EventFanoutBus::new(Arc::clone(&connection));
        let casino = CasinoDesk::new(Arc::clone(&connection), settings);
        let accountant = Arc::new(DividendAccountant::new(Arc::clone(&connection), settings));
        let governance = Arc::new(Governance::new(Arc::clone(&connection), settings));
        let watchers = vec![
            accountant.watch(bus.subscribe(Feed::PeriodResets)),
            governance.watch(bus.subscribe(Feed::Proposals)),
        ];
        Self {
            connection,
            bus,
            casino,
            accountant,
            governance,
            watchers: Mutex::new(watchers),
        }
    }

    pub fn connection(&self) -> &Arc<Connection<L>> {
        &self.connection
    }

    pub fn bus(&self) -> &EventFanoutBus<L> {
        &self.bus
    }

    pub fn casino(&self) -> &CasinoDesk<L> {
        &self.casino
    }

    pub fn accountant(&self) -> &Arc<DividendAccountant<L>> {
        &self.accountant
    }

    pub fn governance(&self) -> &Arc<Governance<L>> {
        &self.governance
    }

    pub fn subscribe(&self, feed: Feed) -> Consumer<LedgerEvent> {
        self.bus.subscribe(feed)
    }

    /// Switch to `ledger` after a network or identity change.
    ///
    /// Caches are dropped and every feed is rebound; existing consumers keep receiving.
    pub fn reinit(&self, ledger: L) {
        info!(
            chain_id = ledger.network().chain_id,
            identity = ?ledger.identity(),
            "switching ledger connection"
        );
        self.bus.reinit(ledger);
        // Lookups still running against the old ledger see the new generation and keep
        // their results out of the caches.
        self.accountant.invalidate();
        self.governance.invalidate();
    }
}

impl<L: Ledger> Drop for Mirror<L> {
    fn drop(&mut self) {
        for watcher in lock(&self.watchers, "watchers").drain(..) {
            watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fanout::Scope,
        ledger::Topic,
        mocks::{wager, MockLedger},
    };
    use honest_types::{
        accountant::{PayoutPeriod, DAY_SECS},
        voting::{Proposal, ProposalAction},
        Address, U256,
    };
    use std::time::Duration;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn period(started_at: u64) -> PayoutPeriod {
        PayoutPeriod {
            started_at,
            payout_snapshot: U256::from(1_000),
            total_supply_snapshot: U256::from(4),
        }
    }

    fn common(id: u64) -> Proposal {
        Proposal {
            id,
            created_at: 0,
            duration: DAY_SECS,
            description: format!("proposal {id}"),
            accepted: U256::zero(),
            rejected: U256::zero(),
            executed: false,
            action: ProposalAction::Common,
        }
    }

    #[tokio::test]
    async fn test_period_read_before_reinit_is_not_cached() {
        let old = MockLedger::new(Some(alice()));
        old.state().resets = vec![period(111)];
        let new = MockLedger::new(Some(alice()));
        new.state().resets = vec![period(222)];
        let mirror = Arc::new(Mirror::new(old.clone(), Settings::default()));

        // The network changes while the history lookup is in flight on the old ledger.
        {
            let mirror = Arc::clone(&mirror);
            let new = new.clone();
            old.before_next_read(move || mirror.reinit(new));
        }
        assert_eq!(mirror.accountant().current_period().await.unwrap(), period(111));
        assert_eq!(mirror.accountant().cached_period(), None);

        assert_eq!(mirror.accountant().current_period().await.unwrap(), period(222));
        assert_eq!(mirror.accountant().cached_period(), Some(period(222)));
    }

    #[tokio::test]
    async fn test_index_read_before_reinit_is_not_merged() {
        let old = MockLedger::new(Some(alice()));
        old.start_proposal(common(1));
        let new = MockLedger::new(Some(alice()));
        new.start_proposal(common(7));
        let mirror = Arc::new(Mirror::new(old.clone(), Settings::default()));

        {
            let mirror = Arc::clone(&mirror);
            let new = new.clone();
            old.before_next_read(move || mirror.reinit(new));
        }
        // Proposal 1 only exists on the old network.
        let _ = mirror.governance().proposals().await;

        let ids: Vec<u64> = mirror
            .governance()
            .proposals()
            .await
            .unwrap()
            .iter()
            .map(|proposal| proposal.id)
            .collect();
        assert_eq!(ids, vec![7]);
        assert_eq!(new.reads("proposals_started"), 2);
    }

    #[tokio::test]
    async fn test_reinit_drops_caches_and_keeps_watchers() {
        let ledger = MockLedger::new(Some(alice()));
        ledger.state().resets = vec![period(10)];
        let mirror = Mirror::new(ledger.clone(), Settings::default());
        ledger.until_watching(Topic::PeriodReset, None).await;
        assert_eq!(mirror.accountant().current_period().await.unwrap(), period(10));

        mirror.reinit(ledger.rebind(Some(bob())));
        assert!(mirror.accountant().cached_period().is_none());
        assert_eq!(mirror.connection().current().identity(), Some(bob()));

        // The watcher task survives the switch and keeps the memo current.
        mirror.accountant().current_period().await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while mirror.accountant().cached_period() != Some(period(20)) {
                ledger.emit(LedgerEvent::PeriodReset(period(20)));
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_personal_feed_follows_identity() {
        let ledger = MockLedger::new(Some(alice()));
        let mirror = Mirror::new(ledger.clone(), Settings::default());
        let mut mine = mirror.subscribe(Feed::Wagers(Scope::Mine));
        ledger.until_watching(Topic::WagerPlaced, Some(alice())).await;

        mirror.reinit(ledger.rebind(Some(bob())));
        ledger.until_watching(Topic::WagerPlaced, Some(bob())).await;
        ledger.emit(LedgerEvent::WagerPlaced(wager(alice(), 0, 1)));
        ledger.emit(LedgerEvent::WagerPlaced(wager(bob(), 0, 2)));

        let LedgerEvent::WagerPlaced(received) = mine.next().await.unwrap() else {
            panic!("expected a wager");
        };
        assert_eq!(received.player, bob());
        assert!(mine.try_next().is_none());
    }
}
