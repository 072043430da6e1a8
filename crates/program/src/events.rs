//! Events emitted by the auction program.

use serde::{Deserialize, Serialize};

use sealbid_types::Address;

/// An event appended to the program log by a successful instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgramEvent {
    AuctionCreated {
        auction: Address,
        seller: Address,
        title: String,
        reserve_price: u64,
        start_time: i64,
        end_time: i64,
    },
    BidPlaced {
        auction: Address,
        bidder: Address,
        /// 1-indexed
        bid_number: u32,
        timestamp: i64,
    },
    BidUpdated {
        auction: Address,
        bidder: Address,
        timestamp: i64,
    },
    BiddingClosed {
        auction: Address,
        total_bids: u32,
        timestamp: i64,
    },
    BidProcessed {
        auction: Address,
        bidder: Address,
        bids_processed: u32,
    },
    WinnerDetermined {
        auction: Address,
        winner: Address,
        timestamp: i64,
    },
    AuctionSettled {
        auction: Address,
        winner: Address,
        winning_amount: u64,
        timestamp: i64,
    },
    AuctionCancelled {
        auction: Address,
        seller: Address,
        reason: String,
        timestamp: i64,
    },
}

impl ProgramEvent {
    /// The auction this event belongs to.
    pub fn auction(&self) -> &Address {
        match self {
            ProgramEvent::AuctionCreated { auction, .. }
            | ProgramEvent::BidPlaced { auction, .. }
            | ProgramEvent::BidUpdated { auction, .. }
            | ProgramEvent::BiddingClosed { auction, .. }
            | ProgramEvent::BidProcessed { auction, .. }
            | ProgramEvent::WinnerDetermined { auction, .. }
            | ProgramEvent::AuctionSettled { auction, .. }
            | ProgramEvent::AuctionCancelled { auction, .. } => auction,
        }
    }
}
