//! Core type definitions for sealed-bid auctions.
//!
//! This crate provides the shared records stored by the ledger program, the
//! opaque handle type issued by the confidential service, the 128-bit wire
//! codec used at settlement and deterministic address derivation.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::fmt;

pub mod pda;
pub mod wire;

pub use pda::AddressDeriver;

// =========================
// IDENTITIES AND HANDLES
// =========================

/// Generic address type (32 bytes). Identities are ed25519 verifying keys.
pub type Address = [u8; 32];

/// ed25519 signature bytes.
pub type Signature = [u8; 64];

/// The null identity sentinel.
pub const NULL_ADDRESS: Address = [0u8; 32];

/// Opaque reference to an encrypted value held by the confidential service.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Handle(pub u128);

impl Handle {
    /// No handle has been assigned.
    pub const NONE: Handle = Handle(0);

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Attestation produced by the confidential service over `(handle, plaintext)`.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Attestation {
    /// Identity of the attestor that signed.
    pub attestor: Address,
    /// Signature over the attestation message.
    #[serde_as(as = "[_; 64]")]
    pub signature: Signature,
}

// =========================
// PROTOCOL CONSTANTS
// =========================

/// Ledger program id.
pub const PROGRAM_ID: Address = *b"sealbid/auction-program/00000001";

/// Confidential service id (scopes permission addresses).
pub const CONFIDENTIAL_PROGRAM_ID: Address = *b"sealbid/confidential-svc/0000001";

/// Seed for deriving auction addresses.
pub const AUCTION_SEED: &[u8] = b"auction";

/// Seed for deriving bid addresses.
pub const BID_SEED: &[u8] = b"bid";

/// Minimum auction duration in seconds.
pub const MIN_AUCTION_DURATION: i64 = 60;

/// Maximum auction duration in seconds (7 days).
pub const MAX_AUCTION_DURATION: i64 = 604_800;

/// Maximum title length in bytes.
pub const MAX_TITLE_LENGTH: usize = 64;

/// Maximum description length in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 256;

// =========================
// AUCTION RECORDS
// =========================

/// Auction lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum AuctionState {
    /// Accepting bids
    Open,
    /// Bidding over, bids being compared
    Closed,
    /// Leader finalized and granted decrypt permission
    WinnerDetermined,
    /// Winner revealed and paid
    Settled,
    /// No bids at close, or withdrawn by the seller
    Cancelled,
}

impl AuctionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionState::Settled | AuctionState::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionState::Open => "open",
            AuctionState::Closed => "closed",
            AuctionState::WinnerDetermined => "winner_determined",
            AuctionState::Settled => "settled",
            AuctionState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AuctionState::Open),
            "closed" => Some(AuctionState::Closed),
            "winner_determined" => Some(AuctionState::WinnerDetermined),
            "settled" => Some(AuctionState::Settled),
            "cancelled" => Some(AuctionState::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AuctionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Auction record as stored by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Auction {
    pub seller: Address,
    pub item_ref: Option<Address>,
    pub title: String,
    pub description: String,

    /// Minimum acceptable bid, minor units
    pub reserve_price: u64,

    // Timing (unix seconds)
    pub start_time: i64,
    pub end_time: i64,

    pub state: AuctionState,

    // Counters
    pub bid_count: u32,
    pub bids_processed: u32,

    // Encrypted leader
    pub highest_bid_handle: Handle,
    pub current_leader: Address,

    // Populated at settlement
    pub winner: Address,
    pub winning_amount: u64,

    /// Caller-chosen nonce used in address derivation
    pub auction_id: u64,
}

impl Auction {
    /// Check if the auction is currently accepting bids.
    pub fn is_bidding_open(&self, now: i64) -> bool {
        self.state == AuctionState::Open && now >= self.start_time && now < self.end_time
    }

    /// Check if the bidding period has ended.
    pub fn is_bidding_ended(&self, now: i64) -> bool {
        now >= self.end_time
    }

    /// Check if all bids have been compared.
    pub fn all_bids_processed(&self) -> bool {
        self.bids_processed == self.bid_count
    }

    pub fn has_leader(&self) -> bool {
        self.current_leader != NULL_ADDRESS && !self.highest_bid_handle.is_none()
    }

    pub fn remaining_bids(&self) -> u32 {
        self.bid_count.saturating_sub(self.bids_processed)
    }
}

/// One bidder's sealed bid on one auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Bid {
    pub auction: Address,
    pub bidder: Address,
    pub encrypted_amount: Handle,
    pub created_at: i64,
    pub updated_at: i64,
    /// Set once by winner determination, never cleared
    pub processed: bool,
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Short hex form of an address for logs.
pub fn short_address(address: &Address) -> String {
    let full = hex::encode(address);
    format!("{}..{}", &full[..6], &full[full.len() - 4..])
}
