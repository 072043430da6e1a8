//! Reference ledger program for sealed-bid auctions.
//!
//! The program is the source of truth for auctions and bids. It executes
//! signed instructions atomically against in-memory state and calls into the
//! confidential service for every operation on encrypted amounts:
//!
//! - Auction creation with bounded title, description and duration
//! - Sealed bid placement, one live bid per bidder
//! - Sequential encrypted winner determination
//! - Winner finalization with decrypt permission
//! - Attested settlement and payment
//!
//! # Architecture
//!
//! - `instruction`: Instruction and signed transaction types
//! - `handlers`: Business logic for each instruction
//! - `queries`: Read-only state access
//! - `state`: Ledger state structures
//! - `events`: Program event log
//! - `genesis`: Limits and initial state
//! - `runtime`: Signature checks, clock and dispatch
//! - `error`: Error types

pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod instruction;
pub mod queries;
pub mod runtime;
pub mod state;

pub use error::{ErrorClass, ProgramError};
pub use events::ProgramEvent;
pub use genesis::{GenesisBalance, GenesisConfig, GenesisValidationError, ProgramConfig};
pub use handlers::{CallContext, HandlerResult};
pub use instruction::{CreateAuctionParams, Instruction, SignedTransaction};
pub use queries::{AuctionEntry, BidEntry, ProgramQuery, ProgramQueryResponse};
pub use runtime::{ProgramRuntime, Receipt};
pub use state::ProgramState;
