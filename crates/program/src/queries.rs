//! Query handlers for the auction program.
//!
//! These functions provide read-only access to program state.

use serde::{Deserialize, Serialize};

use sealbid_types::{Address, Auction, AuctionState, Bid};

use crate::events::ProgramEvent;
use crate::state::ProgramState;

/// An auction together with its derived address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionEntry {
    pub address: Address,
    pub auction: Auction,
}

/// A bid together with its derived address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEntry {
    pub address: Address,
    pub bid: Bid,
}

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ProgramQuery {
    /// Get an auction by address.
    GetAuction { auction: Address },

    /// List auctions, newest end time first.
    ListAuctions {
        seller: Option<Address>,
        state: Option<AuctionState>,
    },

    /// Get all bids for an auction.
    GetAuctionBids { auction: Address },

    /// Get the bids of an auction not yet compared.
    GetUnprocessedBids { auction: Address },

    /// Get a specific bid by address.
    GetBid { bid: Address },

    /// Get an account balance.
    GetBalance { address: Address },

    /// Get the events of an auction in emission order.
    GetEvents { auction: Address },
}

/// Query response types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ProgramQueryResponse {
    Auction(Option<AuctionEntry>),
    AuctionList(Vec<AuctionEntry>),
    Bids(Vec<BidEntry>),
    Bid(Option<BidEntry>),
    Balance(u64),
    Events(Vec<ProgramEvent>),
}

/// Handle a query.
pub fn handle_query(state: &ProgramState, query: ProgramQuery) -> ProgramQueryResponse {
    match query {
        ProgramQuery::GetAuction { auction } => ProgramQueryResponse::Auction(
            state.get_auction(&auction).map(|record| AuctionEntry {
                address: auction,
                auction: record.clone(),
            }),
        ),

        ProgramQuery::ListAuctions { seller, state: wanted } => {
            ProgramQueryResponse::AuctionList(list_auctions(state, seller.as_ref(), wanted))
        }

        ProgramQuery::GetAuctionBids { auction } => {
            ProgramQueryResponse::Bids(auction_bids(state, &auction, false))
        }

        ProgramQuery::GetUnprocessedBids { auction } => {
            ProgramQueryResponse::Bids(auction_bids(state, &auction, true))
        }

        ProgramQuery::GetBid { bid } => ProgramQueryResponse::Bid(state.get_bid(&bid).map(|record| BidEntry {
            address: bid,
            bid: record.clone(),
        })),

        ProgramQuery::GetBalance { address } => ProgramQueryResponse::Balance(state.get_balance(&address)),

        ProgramQuery::GetEvents { auction } => ProgramQueryResponse::Events(state.events_for(&auction)),
    }
}

/// Auctions matching the optional filters, newest end time first.
pub fn list_auctions(
    state: &ProgramState,
    seller: Option<&Address>,
    wanted: Option<AuctionState>,
) -> Vec<AuctionEntry> {
    let mut entries: Vec<AuctionEntry> = state
        .auctions
        .iter()
        .filter(|(_, auction)| seller.map_or(true, |s| &auction.seller == s))
        .filter(|(_, auction)| wanted.map_or(true, |w| auction.state == w))
        .map(|(address, auction)| AuctionEntry {
            address: *address,
            auction: auction.clone(),
        })
        .collect();
    entries.sort_by(|a, b| b.auction.end_time.cmp(&a.auction.end_time));
    entries
}

/// Bids of an auction in first-placement order.
pub fn auction_bids(state: &ProgramState, auction: &Address, unprocessed_only: bool) -> Vec<BidEntry> {
    state
        .get_auction_bids(auction)
        .into_iter()
        .filter(|(_, bid)| !unprocessed_only || !bid.processed)
        .map(|(address, bid)| BidEntry {
            address,
            bid: bid.clone(),
        })
        .collect()
}
