//! Ledger access.
//!
//! The ledger is the source of truth. Reads return whatever it holds right
//! now; writes are signed instructions it executes atomically.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use sealbid_program::{AuctionEntry, BidEntry, Instruction, ProgramError, ProgramEvent, Receipt, SignedTransaction};
use sealbid_types::{short_address, Address, Auction, AuctionState, Bid};

use crate::config::CoordinatorConfig;
use crate::error::{Attempt, CoordinatorError};
use crate::identity::SigningIdentity;
use crate::state_machine::{Action, AuctionSnapshot};
use crate::timeout::{bounded, Stage};

/// Errors returned by a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("rejected by program: {0}")]
    Rejected(ProgramError),

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Read and write access to the auction program.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current ledger time (unix seconds).
    async fn now(&self) -> Result<i64, LedgerError>;

    async fn fetch_auction(&self, auction: &Address) -> Result<Option<Auction>, LedgerError>;

    async fn list_auctions(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, LedgerError>;

    async fn fetch_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError>;

    /// Bids of `auction` with `processed == false`.
    async fn fetch_unprocessed_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError>;

    async fn fetch_bid(&self, bid: &Address) -> Result<Option<Bid>, LedgerError>;

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError>;

    async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, LedgerError>;

    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError>;
}

/// Read an auction and the ledger time.
pub async fn fetch_snapshot<L: Ledger + ?Sized>(
    ledger: &L,
    config: &CoordinatorConfig,
    attempt: &Attempt,
    address: &Address,
) -> Result<AuctionSnapshot, CoordinatorError> {
    let after = config.timeout(Stage::Fetch);

    let auction = bounded(attempt.action, Stage::Fetch, after, ledger.fetch_auction(address))
        .await?
        .map_err(|e| attempt.ledger_error(e))?
        .ok_or_else(|| CoordinatorError::NotFound {
            action: attempt.action,
            what: format!("auction {}", hex::encode(address)),
        })?;
    let now = bounded(attempt.action, Stage::Fetch, after, ledger.now())
        .await?
        .map_err(|e| attempt.ledger_error(e))?;

    Ok(AuctionSnapshot {
        address: *address,
        auction,
        now,
    })
}

/// Sign `instruction` as `identity` and submit it.
pub async fn sign_and_submit<L: Ledger + ?Sized>(
    ledger: &L,
    config: &CoordinatorConfig,
    identity: &dyn SigningIdentity,
    attempt: &Attempt,
    instruction: Instruction,
) -> Result<Receipt, CoordinatorError> {
    let message = SignedTransaction::signing_message(&instruction)
        .map_err(|e| attempt.invalid_input(format!("instruction encoding failed: {}", e)))?;
    let signature = bounded(
        attempt.action,
        Stage::Signature,
        config.timeout(Stage::Signature),
        identity.sign(&message),
    )
    .await?
    .map_err(|e| attempt.identity_error(e))?;

    let tx = SignedTransaction {
        sender: identity.address(),
        instruction,
        signature,
    };

    debug!(
        action = %attempt.action,
        sender = %short_address(&tx.sender),
        "Submitting transaction"
    );

    bounded(
        attempt.action,
        Stage::Submission,
        config.timeout(Stage::Submission),
        ledger.submit(tx),
    )
    .await?
    .map_err(|e| attempt.ledger_error(e))
}

/// Read-only helpers bounded by the fetch timeout.
pub async fn fetch_bids<L: Ledger + ?Sized>(
    ledger: &L,
    config: &CoordinatorConfig,
    action: Action,
    caller: &Address,
    auction: &Address,
    unprocessed_only: bool,
) -> Result<Vec<BidEntry>, CoordinatorError> {
    let attempt = Attempt::new(action, *caller);
    let fut = async {
        if unprocessed_only {
            ledger.fetch_unprocessed_bids(auction).await
        } else {
            ledger.fetch_bids(auction).await
        }
    };
    bounded(action, Stage::Fetch, config.timeout(Stage::Fetch), fut)
        .await?
        .map_err(|e| attempt.ledger_error(e))
}
