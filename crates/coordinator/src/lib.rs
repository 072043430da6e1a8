//! Sealed-bid auction coordinator.
//!
//! Drives an auction through its lifecycle against an authoritative ledger
//! and an encryption service:
//!
//! 1. **State machine**: decide which actions are legal for a caller now
//! 2. **Bid processing**: compare bids one at a time against the encrypted
//!    leader until every bid has been processed
//! 3. **Finalization**: grant the current leader decrypt permission on the
//!    winning handle
//! 4. **Settlement**: reveal the winning bid with an attested decryption and
//!    pay the seller
//!
//! The coordinator never holds authoritative state. It re-reads the ledger
//! before every decision and relies on the ledger's atomic instructions for
//! correctness when several callers act on the same auction.

pub mod bid_processor;
pub mod config;
pub mod error;
pub mod finalize;
pub mod gateway;
pub mod identity;
pub mod ledger;
pub mod local;
pub mod session;
pub mod settlement;
pub mod state_machine;
pub mod timeout;

pub use bid_processor::{BidProcessor, Step};
pub use config::CoordinatorConfig;
pub use error::{Attempt, BatchReport, CoordinatorError};
pub use finalize::FinalizationCoordinator;
pub use gateway::{EncryptionGateway, GatewayError};
pub use identity::{IdentityError, Keypair, SigningIdentity};
pub use ledger::{Ledger, LedgerError};
pub use local::LocalChain;
pub use session::{truncate_utf8, AuctionCoordinator, NewAuction};
pub use settlement::{Settlement, SettlementCoordinator};
pub use state_machine::{Action, AuctionSnapshot, AuctionStateMachine};
pub use timeout::{bounded, Stage};
