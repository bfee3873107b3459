//! Wagering desk: live bet bounds, history lookups and the wager and claim writes.

use crate::{
    config::Settings,
    connection::Connection,
    ledger::{BlockRange, Call, Ledger, Pending},
    Error, Result,
};
use honest_types::{
    casino::{unclaimed_prize, BetBounds, Wager, WinClaim, RECENT_WINNERS_LIMIT},
    Address, Precondition, U256,
};
use std::sync::Arc;
use tracing::{debug, info};

pub struct CasinoDesk<L: Ledger> {
    connection: Arc<Connection<L>>,
    settings: Settings,
}

impl<L: Ledger> CasinoDesk<L> {
    pub fn new(connection: Arc<Connection<L>>, settings: Settings) -> Self {
        Self {
            connection,
            settings,
        }
    }

    fn identity(&self, ledger: &L) -> Result<Address> {
        ledger.identity().ok_or(Error::NoSigner)
    }

    pub async fn prize_fund(&self) -> Result<U256> {
        let ledger = self.connection.current();
        self.settings
            .retry
            .read("prize_fund", || ledger.prize_fund())
            .await
    }

    pub async fn prize_multiplier(&self) -> Result<u32> {
        let ledger = self.connection.current();
        self.settings
            .retry
            .read("prize_multiplier", || ledger.prize_multiplier())
            .await
    }

    pub async fn block_number(&self) -> Result<u64> {
        let ledger = self.connection.current();
        let block = self
            .settings
            .retry
            .read("block", || ledger.block(None))
            .await?;
        Ok(block.number)
    }

    /// Bounds from fresh prize fund and multiplier readings.
    pub async fn bet_bounds(&self) -> Result<BetBounds> {
        let (prize_fund, multiplier) =
            futures::try_join!(self.prize_fund(), self.prize_multiplier())?;
        Ok(self.bounds_for(prize_fund, multiplier))
    }

    /// Bounds for readings already at hand, such as the values of a block update.
    pub fn bounds_for(&self, prize_fund: U256, multiplier: u32) -> BetBounds {
        BetBounds::new(
            prize_fund,
            multiplier,
            self.settings.max_prize,
            self.settings.fee_bps,
        )
    }

    /// Wagers placed by anyone over roughly the last 24 hours.
    pub async fn guesses_today(&self) -> Result<usize> {
        let current = self.block_number().await?;
        let lookback = self.settings.guesses_lookback_blocks;
        let range = BlockRange::since(current.saturating_sub(lookback));
        let ledger = self.connection.current();
        let wagers = self
            .settings
            .retry
            .read("wagers", || ledger.wagers(None, range))
            .await?;
        Ok(wagers.len())
    }

    /// Latest prize claims, oldest first.
    pub async fn recent_winners(&self) -> Result<Vec<WinClaim>> {
        let ledger = self.connection.current();
        let wins = self
            .settings
            .retry
            .read("wins", || ledger.wins(None, BlockRange::default()))
            .await?;
        let skip = wins.len().saturating_sub(RECENT_WINNERS_LIMIT);
        Ok(wins.into_iter().skip(skip).collect())
    }

    pub async fn my_recent_wager(&self) -> Result<Option<Wager>> {
        let ledger = self.connection.current();
        let player = self.identity(&ledger)?;
        let wagers = self
            .settings
            .retry
            .read("wagers", || ledger.wagers(Some(player), BlockRange::default()))
            .await?;
        Ok(wagers.into_iter().last())
    }

    pub async fn my_recent_win(&self) -> Result<Option<WinClaim>> {
        let ledger = self.connection.current();
        let player = self.identity(&ledger)?;
        let wins = self
            .settings
            .retry
            .read("wins", || ledger.wins(Some(player), BlockRange::default()))
            .await?;
        Ok(wins.into_iter().last())
    }

    /// The identity's latest wager if it won and has not been claimed.
    pub async fn unclaimed_prize(&self) -> Result<Option<Wager>> {
        let (wager, win) = futures::try_join!(self.my_recent_wager(), self.my_recent_win())?;
        Ok(unclaimed_prize(wager.as_ref(), win.as_ref()).cloned())
    }

    /// Validate against fresh bounds and submit a guess, adding the protocol fee on top of `stake`.
    pub async fn place_wager(&self, number: u8, stake: U256) -> Result<Pending> {
        let bounds = self.bet_bounds().await?;
        let value = bounds.check(number, stake)?;
        let ledger = self.connection.current();
        self.identity(&ledger)?;
        debug!(number, %stake, %value, max_stake = %bounds.max_stake, "submitting wager");
        let pending = ledger.submit(Call::Guess { number, value }).await?;
        info!(tx = ?pending.tx_hash, number, %stake, "wager submitted");
        Ok(pending)
    }

    /// Claim the prize of the identity's latest wager.
    pub async fn claim_prize(&self) -> Result<Pending> {
        let wager = self
            .unclaimed_prize()
            .await?
            .ok_or(Precondition::NothingToClaim)?;
        let current = self.block_number().await?;
        wager.check_claim(current)?;
        let ledger = self.connection.current();
        let player = self.identity(&ledger)?;
        let pending = ledger.submit(Call::ClaimPrize { player }).await?;
        info!(
            tx = ?pending.tx_hash,
            nonce = wager.nonce,
            blocks_left = wager.blocks_left(current),
            "prize claim submitted"
        );
        Ok(pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mocks::{wager, win, winning_wager, MockLedger},
        retry::RetryPolicy,
    };
    use honest_types::{casino::WEI_PER_ETHER, Rejection};

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(WEI_PER_ETHER)
    }

    fn player() -> Address {
        Address::repeat_byte(0x7e)
    }

    fn desk(ledger: &MockLedger) -> CasinoDesk<MockLedger> {
        let settings = Settings {
            retry: RetryPolicy {
                initial_backoff: std::time::Duration::ZERO,
                ..RetryPolicy::default()
            },
            ..Settings::default()
        };
        CasinoDesk::new(Arc::new(Connection::new(ledger.clone())), settings)
    }

    #[tokio::test]
    async fn test_place_wager_submits_fee_inclusive_value() {
        let ledger = MockLedger::new(Some(player()));
        ledger.set_prize_fund(ether(100));
        ledger.set_multiplier(10);
        let desk = desk(&ledger);

        let bounds = desk.bet_bounds().await.unwrap();
        assert_eq!(bounds.max_stake, ether(2));

        desk.place_wager(42, ether(1))
            .await
            .unwrap()
            .confirmed()
            .await
            .unwrap();
        assert_eq!(
            ledger.calls(),
            vec![Call::Guess {
                number: 42,
                value: ether(101) / U256::from(100),
            }]
        );
    }

    #[tokio::test]
    async fn test_place_wager_rechecks_bounds_before_submitting() {
        let ledger = MockLedger::new(Some(player()));
        ledger.set_prize_fund(ether(100));
        let desk = desk(&ledger);
        assert_eq!(desk.bet_bounds().await.unwrap().max_stake, ether(2));

        // The fund drains between the display and the submission.
        ledger.set_prize_fund(ether(10));
        let err = desk.place_wager(42, ether(1)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Precondition(Precondition::StakeAboveMax { .. })
        ));
        assert!(matches!(
            desk.place_wager(100, U256::one()).await.unwrap_err(),
            Error::Precondition(Precondition::GuessOutOfRange(100))
        ));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_rejection_propagates_without_retry() {
        let ledger = MockLedger::new(Some(player()));
        ledger.set_prize_fund(ether(100));
        ledger.reject_next(Rejection::PrizeFundExhausted);
        let desk = desk(&ledger);
        let err = desk.place_wager(1, ether(1)).await.unwrap_err();
        assert_eq!(err.rejection(), Some(Rejection::PrizeFundExhausted));
        assert!(ledger.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reads_retry_transport_failures() {
        let ledger = MockLedger::new(Some(player()));
        ledger.set_prize_fund(ether(3));
        ledger.fail_reads(2);
        let desk = desk(&ledger);
        assert_eq!(desk.prize_fund().await.unwrap(), ether(3));
        assert_eq!(ledger.reads("prize_fund"), 3);
    }

    #[tokio::test]
    async fn test_history_lookups() {
        let ledger = MockLedger::new(Some(player()));
        let other = Address::repeat_byte(0x01);
        ledger.advance(10_000, 1_000);
        ledger.state().wagers = vec![
            wager(other, 0, 3_000),
            wager(other, 1, 3_456),
            wager(player(), 0, 9_000),
            wager(other, 2, 9_500),
        ];
        ledger.state().wins = vec![
            win(other, 0, 100),
            win(other, 1, 200),
            win(player(), 5, 300),
            win(other, 2, 400),
        ];
        let desk = desk(&ledger);

        assert_eq!(desk.guesses_today().await.unwrap(), 3);
        let winners = desk.recent_winners().await.unwrap();
        assert_eq!(
            winners.iter().map(|win| win.block_number).collect::<Vec<_>>(),
            vec![200, 300, 400]
        );
        assert_eq!(desk.my_recent_wager().await.unwrap().unwrap().block_number, 9_000);
        assert_eq!(desk.my_recent_win().await.unwrap().unwrap().nonce, 5);
    }

    #[tokio::test]
    async fn test_claim_prize_checks_window() {
        let ledger = MockLedger::new(Some(player()));
        ledger.state().wagers = vec![winning_wager(player(), 3, 1_000)];
        let desk = desk(&ledger);

        ledger.advance(1_000, 0);
        assert!(matches!(
            desk.claim_prize().await.unwrap_err(),
            Error::Precondition(Precondition::ClaimInSameBlock)
        ));

        ledger.advance(1_255, 0);
        assert!(matches!(
            desk.claim_prize().await.unwrap_err(),
            Error::Precondition(Precondition::ClaimWindowExpired { .. })
        ));

        ledger.advance(1_100, 0);
        desk.claim_prize().await.unwrap();
        assert_eq!(ledger.calls(), vec![Call::ClaimPrize { player: player() }]);

        // Settled by a claim for the same nonce.
        ledger.state().wins = vec![win(player(), 3, 1_101)];
        assert!(desk.unclaimed_prize().await.unwrap().is_none());
        assert!(matches!(
            desk.claim_prize().await.unwrap_err(),
            Error::Precondition(Precondition::NothingToClaim)
        ));
    }

    #[tokio::test]
    async fn test_personal_reads_require_identity() {
        let ledger = MockLedger::new(None);
        ledger.set_prize_fund(ether(100));
        let desk = desk(&ledger);
        assert!(matches!(desk.my_recent_wager().await, Err(Error::NoSigner)));
        assert!(matches!(
            desk.place_wager(1, ether(1)).await,
            Err(Error::NoSigner)
        ));
    }
}
