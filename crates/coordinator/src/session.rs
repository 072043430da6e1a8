//! High-level coordinator facade.
//!
//! [`AuctionCoordinator`] bundles a ledger, an encryption gateway and the
//! configuration. Every operation takes the acting identity explicitly and
//! re-reads the auction before deciding anything.

use tracing::info;

use sealbid_program::{AuctionEntry, BidEntry, CreateAuctionParams, Instruction, ProgramEvent};
use sealbid_types::{short_address, Address, AuctionState};

use crate::bid_processor::{BidProcessor, Step};
use crate::config::CoordinatorConfig;
use crate::error::{Attempt, BatchReport, CoordinatorError};
use crate::finalize::FinalizationCoordinator;
use crate::gateway::EncryptionGateway;
use crate::identity::SigningIdentity;
use crate::ledger::{fetch_bids, fetch_snapshot, sign_and_submit, Ledger};
use crate::settlement::{Settlement, SettlementCoordinator};
use crate::state_machine::{Action, AuctionSnapshot, AuctionStateMachine};
use crate::timeout::{bounded, Stage};

/// Request to create an auction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAuction {
    /// Caller-chosen nonce; uniqueness is the caller's responsibility
    pub auction_id: u64,
    pub title: String,
    pub description: String,
    pub reserve_price: u64,
    /// Bidding period in seconds
    pub duration: i64,
    pub item_ref: Option<Address>,
}

/// Truncate `text` to at most `max_bytes` bytes on a char boundary.
pub fn truncate_utf8(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

pub struct AuctionCoordinator<L, G> {
    ledger: L,
    gateway: G,
    config: CoordinatorConfig,
}

impl<L: Ledger, G: EncryptionGateway> AuctionCoordinator<L, G> {
    pub fn new(ledger: L, gateway: G, config: CoordinatorConfig) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Read the auction fresh from the ledger.
    pub async fn refresh(&self, auction: &Address) -> Result<AuctionSnapshot, CoordinatorError> {
        let attempt = Attempt::new(Action::Refresh, [0u8; 32]);
        fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await
    }

    pub async fn bids(&self, auction: &Address) -> Result<Vec<BidEntry>, CoordinatorError> {
        fetch_bids(&self.ledger, &self.config, Action::Refresh, &[0u8; 32], auction, false).await
    }

    pub async fn list(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, CoordinatorError> {
        let attempt = Attempt::new(Action::Refresh, [0u8; 32]);
        bounded(
            Action::Refresh,
            Stage::Fetch,
            self.config.timeout(Stage::Fetch),
            self.ledger.list_auctions(seller, state),
        )
        .await?
        .map_err(|e| attempt.ledger_error(e))
    }

    pub async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, CoordinatorError> {
        let attempt = Attempt::new(Action::Refresh, [0u8; 32]);
        bounded(
            Action::Refresh,
            Stage::Fetch,
            self.config.timeout(Stage::Fetch),
            self.ledger.events(auction),
        )
        .await?
        .map_err(|e| attempt.ledger_error(e))
    }

    pub async fn balance(&self, address: &Address) -> Result<u64, CoordinatorError> {
        let attempt = Attempt::new(Action::Refresh, *address);
        bounded(
            Action::Refresh,
            Stage::Fetch,
            self.config.timeout(Stage::Fetch),
            self.ledger.balance(address),
        )
        .await?
        .map_err(|e| attempt.ledger_error(e))
    }

    /// Refresh and list the actions `caller` may take now.
    pub async fn available_actions(
        &self,
        caller: &Address,
        auction: &Address,
    ) -> Result<(AuctionSnapshot, Vec<Action>), CoordinatorError> {
        let snapshot = self.refresh(auction).await?;
        let actions = AuctionStateMachine::available_actions(&snapshot, caller);
        Ok((snapshot, actions))
    }

    /// Create an auction. Title and description are truncated to the
    /// program's caps; duration and reserve are validated before submitting.
    pub async fn create_auction(
        &self,
        identity: &dyn SigningIdentity,
        request: NewAuction,
    ) -> Result<AuctionSnapshot, CoordinatorError> {
        let limits = &self.config.program;
        let attempt = Attempt::new(Action::CreateAuction, identity.address());

        if request.duration < limits.min_duration || request.duration > limits.max_duration {
            return Err(attempt.invalid_input(format!(
                "duration {}s outside {}..={}s",
                request.duration, limits.min_duration, limits.max_duration
            )));
        }
        if request.reserve_price == 0 {
            return Err(attempt.invalid_input("reserve price must be greater than zero"));
        }

        let params = CreateAuctionParams {
            auction_id: request.auction_id,
            title: truncate_utf8(&request.title, limits.max_title_length),
            description: truncate_utf8(&request.description, limits.max_description_length),
            reserve_price: request.reserve_price,
            duration: request.duration,
            item_ref: request.item_ref,
        };

        let receipt = sign_and_submit(
            &self.ledger,
            &self.config,
            identity,
            &attempt,
            Instruction::CreateAuction(params),
        )
        .await?;
        let address = receipt
            .address
            .unwrap_or_else(|| self.config.auction_address(&identity.address(), request.auction_id));

        info!(
            auction = %short_address(&address),
            seller = %short_address(&identity.address()),
            "Created auction"
        );
        fetch_snapshot(&self.ledger, &self.config, &attempt, &address).await
    }

    /// Encrypt `amount` and place (or replace) the caller's bid. Returns the
    /// bid address.
    pub async fn place_bid(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
        amount: u64,
    ) -> Result<Address, CoordinatorError> {
        let caller = identity.address();
        let attempt = Attempt::new(Action::PlaceBid, caller);

        let snapshot = fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await?;
        AuctionStateMachine::check(&snapshot, Action::PlaceBid, &caller)?;
        let attempt = attempt.in_state(snapshot.state());

        // Reserve is enforced before encryption; the ledger never sees the amount
        if amount < snapshot.auction.reserve_price {
            return Err(attempt.invalid_input(format!(
                "bid {} is below the reserve price {}",
                amount, snapshot.auction.reserve_price
            )));
        }

        let ciphertext = bounded(
            attempt.action,
            Stage::Encrypt,
            self.config.timeout(Stage::Encrypt),
            self.gateway.encrypt(amount),
        )
        .await?
        .map_err(|e| attempt.gateway_error(e))?;

        let receipt = sign_and_submit(
            &self.ledger,
            &self.config,
            identity,
            &attempt,
            Instruction::PlaceBid {
                auction: *auction,
                ciphertext,
            },
        )
        .await?;
        let bid = receipt
            .address
            .unwrap_or_else(|| self.config.program_deriver().bid_address(auction, &caller));

        info!(
            auction = %short_address(auction),
            bidder = %short_address(&caller),
            bid = %short_address(&bid),
            "Placed sealed bid"
        );
        Ok(bid)
    }

    /// Close bidding. Moves to Closed, or Cancelled when nobody bid.
    pub async fn close_bidding(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<AuctionSnapshot, CoordinatorError> {
        let caller = identity.address();
        let attempt = Attempt::new(Action::CloseBidding, caller);

        let snapshot = fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await?;
        AuctionStateMachine::check(&snapshot, Action::CloseBidding, &caller)?;
        let attempt = attempt.in_state(snapshot.state());

        sign_and_submit(
            &self.ledger,
            &self.config,
            identity,
            &attempt,
            Instruction::CloseBidding { auction: *auction },
        )
        .await?;

        let snapshot = fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await?;
        info!(
            auction = %short_address(auction),
            state = %snapshot.state(),
            bid_count = snapshot.auction.bid_count,
            "Bidding closed"
        );
        Ok(snapshot)
    }

    /// A processor for stepping through winner determination.
    pub fn bid_processor<'a>(&'a self, identity: &'a dyn SigningIdentity, auction: Address) -> BidProcessor<'a, L> {
        BidProcessor::new(&self.ledger, &self.config, identity, auction)
    }

    /// Compare the next unprocessed bid.
    pub async fn process_next(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<Step, CoordinatorError> {
        self.bid_processor(identity, *auction).next_step().await
    }

    /// Compare every remaining bid.
    pub async fn process_all(&self, identity: &dyn SigningIdentity, auction: &Address) -> BatchReport {
        self.bid_processor(identity, *auction).run().await
    }

    pub async fn finalize(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<AuctionSnapshot, CoordinatorError> {
        FinalizationCoordinator::new(&self.ledger, &self.config)
            .finalize(identity, auction)
            .await
    }

    pub async fn settle(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<Settlement, CoordinatorError> {
        SettlementCoordinator::new(&self.ledger, &self.gateway, &self.config)
            .settle(identity, auction)
            .await
    }

    /// Withdraw an open auction (seller only).
    pub async fn cancel_auction(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
        reason: &str,
    ) -> Result<AuctionSnapshot, CoordinatorError> {
        let caller = identity.address();
        let attempt = Attempt::new(Action::CancelAuction, caller);

        let snapshot = fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await?;
        AuctionStateMachine::check(&snapshot, Action::CancelAuction, &caller)?;
        let attempt = attempt.in_state(snapshot.state());

        sign_and_submit(
            &self.ledger,
            &self.config,
            identity,
            &attempt,
            Instruction::CancelAuction {
                auction: *auction,
                reason: truncate_utf8(reason, self.config.program.max_description_length),
            },
        )
        .await?;

        info!(auction = %short_address(auction), "Auction cancelled");
        fetch_snapshot(&self.ledger, &self.config, &attempt, auction).await
    }
}
