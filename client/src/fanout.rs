//! Single-writer, multi-reader event broadcast.
//!
//! One upstream task per `(topic, scope)` publishes into a [Channel] per [Feed]. Every
//! [Consumer] owns an unbounded queue fed by every write to its channel, so consumers are
//! independent of each other (broadcast, not work-stealing). Within one topic, events reach
//! every consumer in the order the ledger emitted them.

use crate::{
    connection::{lock, Connection},
    ledger::{Ledger, LedgerEvent, Topic},
};
use futures::Stream;
use honest_types::Address;
use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

/// Whose events a feed carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    All,
    /// Only events of the connection's identity.
    Mine,
}

/// A broadcast channel consumers can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Feed {
    Wagers(Scope),
    Wins(Scope),
    Blocks,
    PrizeFund,
    Multiplier,
    Proposals,
    PeriodResets,
}

impl Feed {
    pub fn topic(self) -> Topic {
        match self {
            Self::Wagers(_) => Topic::WagerPlaced,
            Self::Wins(_) => Topic::PrizeClaimed,
            Self::Blocks | Self::PrizeFund | Self::Multiplier => Topic::NewBlock,
            Self::Proposals => Topic::ProposalStarted,
            Self::PeriodResets => Topic::PeriodReset,
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Self::Wagers(scope) | Self::Wins(scope) => scope,
            _ => Scope::All,
        }
    }

    /// Feed an event published by an upstream of `scope` belongs to.
    pub fn of(event: &LedgerEvent, scope: Scope) -> Self {
        match event {
            LedgerEvent::WagerPlaced(_) => Self::Wagers(scope),
            LedgerEvent::PrizeClaimed(_) => Self::Wins(scope),
            LedgerEvent::NewBlock(_) => Self::Blocks,
            LedgerEvent::PrizeFund(_) => Self::PrizeFund,
            LedgerEvent::Multiplier(_) => Self::Multiplier,
            LedgerEvent::ProposalStarted { .. } => Self::Proposals,
            LedgerEvent::PeriodReset(_) => Self::PeriodResets,
        }
    }
}

/// Fan-out point: every write is queued for every live reader.
pub struct Channel<T> {
    readers: Vec<mpsc::UnboundedSender<T>>,
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self {
            readers: Vec::new(),
        }
    }
}

impl<T: Clone> Channel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new reader. It only sees writes made after this call.
    pub fn read(&mut self) -> Consumer<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.readers.push(sender);
        Consumer { receiver }
    }

    /// Queue `message` for every live reader, dropping readers that went away.
    ///
    /// Returns the number of readers the message was queued for.
    pub fn write(&mut self, message: T) -> usize {
        let mut i = 0;
        while i < self.readers.len() {
            if self.readers[i].send(message.clone()).is_err() {
                self.readers.swap_remove(i);
            } else {
                i += 1;
            }
        }
        self.readers.len()
    }

    pub fn readers(&self) -> usize {
        self.readers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}

/// A reader's own ordered queue.
pub struct Consumer<T> {
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Consumer<T> {
    /// Wait for the next event. Returns `None` once the feed is torn down and drained.
    pub async fn next(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_next(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Stream for Consumer<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

type Channels = Arc<Mutex<HashMap<Feed, Channel<LedgerEvent>>>>;

/// Write side handed to an upstream.
#[derive(Clone)]
pub struct Publisher {
    channels: Channels,
    scope: Scope,
}

impl Publisher {
    pub fn publish(&self, event: LedgerEvent) {
        let feed = Feed::of(&event, self.scope);
        let mut channels = lock(&self.channels, "channels");
        if let Some(channel) = channels.get_mut(&feed) {
            channel.write(event);
        }
    }
}

struct Upstream {
    handle: JoinHandle<()>,
    player: Option<Address>,
}

type Upstreams = HashMap<(Topic, Scope), Upstream>;

/// Keeps every feed synchronized with the current ledger connection.
///
/// Lock order is upstreams before channels.
pub struct EventFanoutBus<L: Ledger> {
    connection: Arc<Connection<L>>,
    channels: Channels,
    upstreams: Mutex<Upstreams>,
}

impl<L: Ledger> EventFanoutBus<L> {
    pub fn new(connection: Arc<Connection<L>>) -> Self {
        Self {
            connection,
            channels: Arc::new(Mutex::new(HashMap::new())),
            upstreams: Mutex::new(HashMap::new()),
        }
    }

    pub fn connection(&self) -> &Arc<Connection<L>> {
        &self.connection
    }

    /// Register a consumer on `feed`, attaching its upstream if needed.
    ///
    /// Must be called within a Tokio runtime.
    pub fn subscribe(&self, feed: Feed) -> Consumer<LedgerEvent> {
        let consumer = lock(&self.channels, "channels")
            .entry(feed)
            .or_default()
            .read();
        self.attach(feed.topic(), feed.scope());
        consumer
    }

    /// Detach every upstream of `topic` and close its feeds.
    ///
    /// Pending `next()` calls on those feeds return `None`. Calling this for a topic that is
    /// not attached does nothing.
    pub fn teardown(&self, topic: Topic) {
        let mut upstreams = lock(&self.upstreams, "upstreams");
        upstreams.retain(|(attached, scope), upstream| {
            if *attached != topic {
                return true;
            }
            debug!(%topic, ?scope, "detaching upstream");
            upstream.handle.abort();
            false
        });
        lock(&self.channels, "channels").retain(|feed, _| feed.topic() != topic);
    }

    /// Move every upstream to `ledger`.
    ///
    /// Consumers keep their queues; `Mine` feeds are rebound to the new identity. The upstream
    /// map stays locked from the drain to the last attach, so a concurrent `subscribe` attaches
    /// either before the drain or against the new ledger.
    pub fn reinit(&self, ledger: L) {
        let mut upstreams = lock(&self.upstreams, "upstreams");
        for (_, upstream) in upstreams.drain() {
            upstream.handle.abort();
        }
        let previous = self.connection.swap(ledger);
        info!(
            previous_chain_id = previous.network().chain_id,
            previous_identity = ?previous.identity(),
            "reinitializing upstreams"
        );

        let mut feeds: Vec<(Topic, Scope)> = lock(&self.channels, "channels")
            .keys()
            .map(|feed| (feed.topic(), feed.scope()))
            .collect();
        feeds.sort();
        feeds.dedup();
        for (topic, scope) in feeds {
            self.attach_locked(&mut upstreams, topic, scope);
        }
    }

    pub fn is_attached(&self, topic: Topic, scope: Scope) -> bool {
        lock(&self.upstreams, "upstreams").contains_key(&(topic, scope))
    }

    /// Player the upstream of `topic` and `scope` filters on, if it is attached with one.
    pub fn bound_player(&self, topic: Topic, scope: Scope) -> Option<Address> {
        lock(&self.upstreams, "upstreams")
            .get(&(topic, scope))
            .and_then(|upstream| upstream.player)
    }

    fn attach(&self, topic: Topic, scope: Scope) {
        let mut upstreams = lock(&self.upstreams, "upstreams");
        self.attach_locked(&mut upstreams, topic, scope);
    }

    fn attach_locked(&self, upstreams: &mut Upstreams, topic: Topic, scope: Scope) {
        if upstreams.contains_key(&(topic, scope)) {
            return;
        }
        let ledger = self.connection.current();
        let player = match scope {
            Scope::All => None,
            Scope::Mine => match ledger.identity() {
                Some(identity) => Some(identity),
                None => {
                    debug!(%topic, "no identity; personal feed stays idle until reinit");
                    return;
                }
            },
        };
        let publisher = Publisher {
            channels: Arc::clone(&self.channels),
            scope,
        };
        debug!(%topic, ?scope, ?player, "attaching upstream");
        let handle = tokio::spawn(async move {
            match ledger.pump(topic, player, publisher).await {
                Ok(()) => debug!(%topic, ?scope, "upstream ended"),
                Err(err) => warn!(%topic, ?scope, error = %err, "upstream subscription failed"),
            }
        });
        upstreams.insert((topic, scope), Upstream { handle, player });
    }
}

impl<L: Ledger> Drop for EventFanoutBus<L> {
    fn drop(&mut self) {
        for (_, upstream) in lock(&self.upstreams, "upstreams").drain() {
            upstream.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{wager, MockLedger};
    use honest_types::Address;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn bus(ledger: &MockLedger) -> EventFanoutBus<MockLedger> {
        EventFanoutBus::new(Arc::new(Connection::new(ledger.clone())))
    }

    #[test]
    fn test_channel_write_reaches_every_reader() {
        let mut channel = Channel::new();
        let mut first = channel.read();
        let mut second = channel.read();
        assert_eq!(channel.write(1u32), 2);
        assert_eq!(channel.write(2u32), 2);
        assert_eq!(first.try_next(), Some(1));
        assert_eq!(first.try_next(), Some(2));
        assert_eq!(second.try_next(), Some(1));
        assert_eq!(second.try_next(), Some(2));
        assert_eq!(second.try_next(), None);
    }

    #[test]
    fn test_channel_prunes_dropped_readers() {
        let mut channel = Channel::new();
        let mut kept = channel.read();
        drop(channel.read());
        assert_eq!(channel.readers(), 2);
        assert_eq!(channel.write("x"), 1);
        assert_eq!(channel.readers(), 1);
        assert_eq!(kept.try_next(), Some("x"));

        // Late readers only see later writes.
        let mut late = channel.read();
        channel.write("y");
        assert_eq!(late.try_next(), Some("y"));
        assert_eq!(kept.try_next(), Some("y"));
    }

    #[tokio::test]
    async fn test_every_consumer_sees_events_in_order() {
        let ledger = MockLedger::new(Some(alice()));
        let bus = bus(&ledger);
        let mut first = bus.subscribe(Feed::Wagers(Scope::All));
        let mut second = bus.subscribe(Feed::Wagers(Scope::All));
        timeout(WAIT, ledger.until_watching(Topic::WagerPlaced, None))
            .await
            .unwrap();

        let events: Vec<_> = (0..3)
            .map(|nonce| wager(alice(), nonce, 10 + nonce as u64))
            .collect();
        for event in &events {
            ledger.emit(LedgerEvent::WagerPlaced(event.clone()));
        }

        for consumer in [&mut first, &mut second] {
            for expected in &events {
                let got = timeout(WAIT, consumer.next()).await.unwrap();
                assert_eq!(got, Some(LedgerEvent::WagerPlaced(expected.clone())));
            }
        }
        assert!(bus.is_attached(Topic::WagerPlaced, Scope::All));
    }

    #[tokio::test]
    async fn test_new_block_feeds_split_by_kind() {
        let ledger = MockLedger::new(None);
        let bus = bus(&ledger);
        let mut blocks = bus.subscribe(Feed::Blocks);
        let mut funds = bus.subscribe(Feed::PrizeFund);
        timeout(WAIT, ledger.until_watching(Topic::NewBlock, None))
            .await
            .unwrap();

        ledger.set_prize_fund(honest_types::U256::from(500));
        ledger.advance(12, 1_000);

        let block = timeout(WAIT, blocks.next()).await.unwrap();
        assert!(matches!(block, Some(LedgerEvent::NewBlock(info)) if info.number == 12));
        let fund = timeout(WAIT, funds.next()).await.unwrap();
        assert_eq!(
            fund,
            Some(LedgerEvent::PrizeFund(honest_types::U256::from(500)))
        );
        assert_eq!(blocks.try_next(), None);
    }

    #[tokio::test]
    async fn test_teardown_closes_feed_and_is_idempotent() {
        let ledger = MockLedger::new(None);
        let bus = bus(&ledger);
        let mut consumer = bus.subscribe(Feed::Proposals);
        bus.teardown(Topic::ProposalStarted);
        assert!(!bus.is_attached(Topic::ProposalStarted, Scope::All));
        assert_eq!(timeout(WAIT, consumer.next()).await.unwrap(), None);

        bus.teardown(Topic::ProposalStarted);
        bus.teardown(Topic::PeriodReset);
    }

    #[tokio::test]
    async fn test_teardown_during_pending_next() {
        let ledger = MockLedger::new(None);
        let bus = Arc::new(bus(&ledger));
        let mut consumer = bus.subscribe(Feed::PeriodResets);
        let waiter = tokio::spawn(async move { consumer.next().await });
        tokio::task::yield_now().await;
        bus.teardown(Topic::PeriodReset);
        assert_eq!(timeout(WAIT, waiter).await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_reinit_rebinds_personal_feeds() {
        let ledger = MockLedger::new(Some(alice()));
        let bus = bus(&ledger);
        let mut mine = bus.subscribe(Feed::Wagers(Scope::Mine));
        timeout(WAIT, ledger.until_watching(Topic::WagerPlaced, Some(alice())))
            .await
            .unwrap();

        ledger.emit(LedgerEvent::WagerPlaced(wager(bob(), 0, 1)));
        ledger.emit(LedgerEvent::WagerPlaced(wager(alice(), 0, 2)));
        let got = timeout(WAIT, mine.next()).await.unwrap();
        assert_eq!(got.and_then(|event| event.player()), Some(alice()));

        let rebound = ledger.rebind(Some(bob()));
        bus.reinit(rebound.clone());
        assert_eq!(bus.connection().current().identity(), Some(bob()));
        timeout(WAIT, ledger.until_watching(Topic::WagerPlaced, Some(bob())))
            .await
            .unwrap();

        ledger.emit(LedgerEvent::WagerPlaced(wager(alice(), 1, 3)));
        ledger.emit(LedgerEvent::WagerPlaced(wager(bob(), 1, 4)));
        let got = timeout(WAIT, mine.next()).await.unwrap();
        assert_eq!(got.and_then(|event| event.player()), Some(bob()));
        assert_eq!(mine.try_next(), None);
    }

    #[tokio::test]
    async fn test_personal_feed_without_identity_waits_for_reinit() {
        let ledger = MockLedger::new(None);
        let bus = bus(&ledger);
        let mut mine = bus.subscribe(Feed::Wins(Scope::Mine));
        assert!(!bus.is_attached(Topic::PrizeClaimed, Scope::Mine));

        bus.reinit(ledger.rebind(Some(alice())));
        assert!(bus.is_attached(Topic::PrizeClaimed, Scope::Mine));
        timeout(WAIT, ledger.until_watching(Topic::PrizeClaimed, Some(alice())))
            .await
            .unwrap();
        ledger.emit(LedgerEvent::PrizeClaimed(crate::mocks::win(alice(), 0, 5)));
        let got = timeout(WAIT, mine.next()).await.unwrap();
        assert_eq!(got.and_then(|event| event.player()), Some(alice()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_subscribe_during_reinit_binds_new_identity() {
        for _ in 0..200 {
            let ledger = MockLedger::new(Some(alice()));
            let bus = Arc::new(bus(&ledger));
            let subscriber = {
                let bus = Arc::clone(&bus);
                tokio::spawn(async move { bus.subscribe(Feed::Wagers(Scope::Mine)) })
            };
            let switcher = {
                let bus = Arc::clone(&bus);
                let rebound = ledger.rebind(Some(bob()));
                tokio::spawn(async move { bus.reinit(rebound) })
            };
            let _mine = subscriber.await.unwrap();
            switcher.await.unwrap();

            assert_eq!(bus.connection().current().identity(), Some(bob()));
            assert_eq!(
                bus.bound_player(Topic::WagerPlaced, Scope::Mine),
                Some(bob())
            );
        }
    }

    #[tokio::test]
    async fn test_failed_upstream_is_not_retried() {
        let ledger = MockLedger::new(None);
        ledger.fail_pumps(true);
        let bus = bus(&ledger);
        let mut consumer = bus.subscribe(Feed::Blocks);
        // The upstream task ends; the consumer stays open but quiet until reinit.
        tokio::task::yield_now().await;
        ledger.advance(1, 1);
        assert_eq!(consumer.try_next(), None);

        ledger.fail_pumps(false);
        bus.reinit(ledger.clone());
        timeout(WAIT, ledger.until_watching(Topic::NewBlock, None))
            .await
            .unwrap();
        ledger.advance(2, 2);
        let got = timeout(WAIT, consumer.next()).await.unwrap();
        assert!(matches!(got, Some(LedgerEvent::NewBlock(info)) if info.number == 2));
    }
}
