//! Ledger program error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealbid_confidential::ConfidentialError;
use sealbid_types::wire::WireError;
use sealbid_types::AuctionState;

/// Coarse classification of a rejection, used by clients to decide whether
/// retrying can help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    StateViolation,
    Authorization,
    AlreadyProcessed,
    StaleState,
    InvalidInput,
    Encryption,
    NotFound,
}

/// Errors that can occur in the auction program.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProgramError {
    #[error("Auction not found: {0}")]
    AuctionNotFound(String),

    #[error("Bid not found: {0}")]
    BidNotFound(String),

    #[error("Auction already exists: {0}")]
    DuplicateAuction(String),

    #[error("Title is too long: {len} bytes (maximum {max})")]
    TitleTooLong { len: usize, max: usize },

    #[error("Description is too long: {len} bytes (maximum {max})")]
    DescriptionTooLong { len: usize, max: usize },

    #[error("Auction duration {duration}s is too short (minimum {min}s)")]
    DurationTooShort { duration: i64, min: i64 },

    #[error("Auction duration {duration}s is too long (maximum {max}s)")]
    DurationTooLong { duration: i64, max: i64 },

    #[error("Reserve price must be greater than zero")]
    InvalidReservePrice,

    #[error("Cannot {action}: expected state {expected}, got {got}")]
    InvalidState {
        action: String,
        expected: AuctionState,
        got: AuctionState,
    },

    #[error("Auction has not started yet")]
    BiddingNotStarted,

    #[error("Bidding period has ended")]
    BiddingEnded,

    #[error("Bidding period has not ended yet")]
    BiddingNotEnded,

    #[error("Only the seller can perform this action")]
    NotSeller,

    #[error("Only the winner can perform this action")]
    NotWinner,

    #[error("Seller cannot bid on their own auction")]
    SellerCannotBid,

    #[error("Bid does not belong to this auction")]
    BidAuctionMismatch,

    #[error("Bid has already been processed")]
    BidAlreadyProcessed,

    #[error("All bids have already been processed")]
    AllBidsProcessed,

    #[error("{remaining} bids still pending comparison")]
    BidsPending { remaining: u32 },

    #[error("Named leader is not the current leader")]
    StaleLeader,

    #[error("Permission address does not match the current leading handle")]
    StalePermission,

    #[error("Handle does not match the winning bid handle")]
    HandleMismatch,

    #[error("Winner has not been set")]
    NoLeader,

    #[error("Transaction signature verification failed")]
    InvalidSignature,

    #[error("Decryption attestation verification failed")]
    InvalidAttestation,

    #[error("Revealed amount {amount} is below the reserve price {reserve}")]
    AmountBelowReserve { amount: u64, reserve: u64 },

    #[error("Revealed amount does not fit in 64 bits")]
    AmountOverflow,

    #[error("Insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Confidential service error: {0}")]
    Confidential(#[from] ConfidentialError),

    #[error("Wire encoding error: {0}")]
    Wire(#[from] WireError),
}

impl ProgramError {
    pub fn class(&self) -> ErrorClass {
        use ProgramError::*;
        match self {
            InvalidState { .. } | BiddingNotStarted | BiddingEnded | BiddingNotEnded | AllBidsProcessed
            | BidsPending { .. } | NoLeader => ErrorClass::StateViolation,
            NotSeller | NotWinner | SellerCannotBid | InvalidSignature => ErrorClass::Authorization,
            BidAlreadyProcessed => ErrorClass::AlreadyProcessed,
            StaleLeader | StalePermission | HandleMismatch => ErrorClass::StaleState,
            InvalidAttestation | Confidential(_) => ErrorClass::Encryption,
            AuctionNotFound(_) | BidNotFound(_) => ErrorClass::NotFound,
            DuplicateAuction(_)
            | TitleTooLong { .. }
            | DescriptionTooLong { .. }
            | DurationTooShort { .. }
            | DurationTooLong { .. }
            | InvalidReservePrice
            | BidAuctionMismatch
            | AmountBelowReserve { .. }
            | AmountOverflow
            | InsufficientFunds { .. }
            | Wire(_) => ErrorClass::InvalidInput,
        }
    }
}
