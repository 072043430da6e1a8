//! Shared fixtures: an in-process chain, funded identities and ledger
//! wrappers that inject failures.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sealbid_confidential::AttestedDecryption;
use sealbid_coordinator::{
    AuctionCoordinator, AuctionSnapshot, CoordinatorConfig, EncryptionGateway, GatewayError, Keypair, Ledger,
    LedgerError, LocalChain, NewAuction,
};
use sealbid_program::{AuctionEntry, BidEntry, GenesisConfig, ProgramEvent, Receipt, SignedTransaction};
use sealbid_types::{Address, Auction, AuctionState, Bid, Handle, Signature};

/// Reserve price used by the scenarios.
pub const RESERVE: u64 = 1_000_000_000;

/// Bidding period used by the scenarios.
pub const DURATION: i64 = 3600;

/// Balance airdropped to every bidder.
pub const FUNDS: u64 = 100_000_000_000;

/// One in-process chain plus a seller.
pub struct Harness {
    pub chain: LocalChain,
    pub coordinator: AuctionCoordinator<LocalChain, LocalChain>,
    pub seller: Keypair,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    pub fn with_config(config: CoordinatorConfig) -> Self {
        let chain = match LocalChain::from_genesis(GenesisConfig::default()) {
            Ok(chain) => chain,
            Err(e) => panic!("default genesis rejected: {}", e),
        };
        Self {
            coordinator: AuctionCoordinator::new(chain.clone(), chain.clone(), config),
            chain,
            seller: Keypair::generate(),
        }
    }

    /// A coordinator over `ledger` that shares this chain's encryption service.
    pub fn coordinator_over<L: Ledger>(&self, ledger: L) -> AuctionCoordinator<L, LocalChain> {
        AuctionCoordinator::new(ledger, self.chain.clone(), self.coordinator.config().clone())
    }

    /// A fresh identity with [`FUNDS`] on the ledger.
    pub fn funded_bidder(&self) -> Keypair {
        let bidder = Keypair::generate();
        self.chain.airdrop(bidder.address(), FUNDS);
        bidder
    }

    /// Create an auction with the standard reserve and duration.
    pub async fn open_auction(&self, auction_id: u64) -> Address {
        let request = NewAuction {
            auction_id,
            title: format!("Lot {}", auction_id),
            description: "Sealed-bid test lot".into(),
            reserve_price: RESERVE,
            duration: DURATION,
            item_ref: None,
        };
        match self.coordinator.create_auction(&self.seller, request).await {
            Ok(snapshot) => snapshot.address,
            Err(e) => panic!("create auction failed: {}", e),
        }
    }

    /// One funded bidder per amount, each placing one bid.
    pub async fn place_bids(&self, auction: &Address, amounts: &[u64]) -> Vec<Keypair> {
        let mut bidders = Vec::with_capacity(amounts.len());
        for amount in amounts {
            let bidder = self.funded_bidder();
            if let Err(e) = self.coordinator.place_bid(&bidder, auction, *amount).await {
                panic!("bid of {} failed: {}", amount, e);
            }
            bidders.push(bidder);
        }
        bidders
    }

    /// Move the clock past the end of bidding and close.
    pub async fn close(&self, auction: &Address) -> AuctionSnapshot {
        self.chain.advance_time(DURATION);
        match self.coordinator.close_bidding(&self.seller, auction).await {
            Ok(snapshot) => snapshot,
            Err(e) => panic!("close bidding failed: {}", e),
        }
    }

    pub fn auction(&self, auction: &Address) -> Auction {
        match self.chain.runtime().read().state().get_auction(auction) {
            Some(record) => record.clone(),
            None => panic!("auction {:?} missing", auction),
        }
    }

    pub fn balance(&self, address: &Address) -> u64 {
        self.chain.runtime().read().state().get_balance(address)
    }

    /// Number of `BidProcessed` events logged for `auction`.
    pub fn processed_events(&self, auction: &Address) -> usize {
        self.chain
            .runtime()
            .read()
            .state()
            .events_for(auction)
            .iter()
            .filter(|event| matches!(event, ProgramEvent::BidProcessed { .. }))
            .count()
    }
}

/// Ledger that drops submissions after a number of successes.
pub struct FlakyLedger<L> {
    inner: L,
    successes: AtomicUsize,
    failures: AtomicUsize,
}

impl<L: Ledger> FlakyLedger<L> {
    /// Every submission after the first `successes` fails.
    pub fn failing_after(inner: L, successes: usize) -> Self {
        Self::dropping(inner, successes, usize::MAX)
    }

    /// After `successes` submissions, the next `failures` fail and the rest
    /// go through again.
    pub fn dropping(inner: L, successes: usize, failures: usize) -> Self {
        Self {
            inner,
            successes: AtomicUsize::new(successes),
            failures: AtomicUsize::new(failures),
        }
    }
}

/// Ledger whose first reads return an auction with a different leader,
/// as a lagging replica would.
pub struct LaggingLedger<L> {
    inner: L,
    stale_reads: AtomicUsize,
    stale_leader: Address,
}

impl<L: Ledger> LaggingLedger<L> {
    pub fn new(inner: L, stale_reads: usize, stale_leader: Address) -> Self {
        Self {
            inner,
            stale_reads: AtomicUsize::new(stale_reads),
            stale_leader,
        }
    }
}

fn take(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl<L: Ledger> Ledger for FlakyLedger<L> {
    async fn now(&self) -> Result<i64, LedgerError> {
        self.inner.now().await
    }

    async fn list_auctions(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, LedgerError> {
        self.inner.list_auctions(seller, state).await
    }

    async fn fetch_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.inner.fetch_bids(auction).await
    }

    async fn fetch_unprocessed_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.inner.fetch_unprocessed_bids(auction).await
    }

    async fn fetch_bid(&self, bid: &Address) -> Result<Option<Bid>, LedgerError> {
        self.inner.fetch_bid(bid).await
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.inner.balance(address).await
    }

    async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, LedgerError> {
        self.inner.events(auction).await
    }

    async fn fetch_auction(&self, auction: &Address) -> Result<Option<Auction>, LedgerError> {
        self.inner.fetch_auction(auction).await
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        if !take(&self.successes) && take(&self.failures) {
            return Err(LedgerError::Transport("connection reset by peer".into()));
        }
        self.inner.submit(tx).await
    }
}

#[async_trait]
impl<L: Ledger> Ledger for LaggingLedger<L> {
    async fn now(&self) -> Result<i64, LedgerError> {
        self.inner.now().await
    }

    async fn list_auctions(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, LedgerError> {
        self.inner.list_auctions(seller, state).await
    }

    async fn fetch_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.inner.fetch_bids(auction).await
    }

    async fn fetch_unprocessed_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.inner.fetch_unprocessed_bids(auction).await
    }

    async fn fetch_bid(&self, bid: &Address) -> Result<Option<Bid>, LedgerError> {
        self.inner.fetch_bid(bid).await
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.inner.balance(address).await
    }

    async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, LedgerError> {
        self.inner.events(auction).await
    }

    async fn fetch_auction(&self, auction: &Address) -> Result<Option<Auction>, LedgerError> {
        let record = self.inner.fetch_auction(auction).await?;
        if take(&self.stale_reads) {
            return Ok(record.map(|mut a| {
                a.current_leader = self.stale_leader;
                a
            }));
        }
        Ok(record)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        self.inner.submit(tx).await
    }
}

/// Encryption gateway whose decryptions never complete.
pub struct StalledGateway {
    pub inner: LocalChain,
}

#[async_trait]
impl EncryptionGateway for StalledGateway {
    async fn encrypt(&self, amount: u64) -> Result<Vec<u8>, GatewayError> {
        self.inner.encrypt(amount).await
    }

    async fn decrypt_with_proof(
        &self,
        _handle: Handle,
        _identity: Address,
        _signature: Signature,
    ) -> Result<AttestedDecryption, GatewayError> {
        std::future::pending().await
    }
}
