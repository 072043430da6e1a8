//! Instruction handlers for the auction program.
//!
//! Every handler validates completely before it touches state, so a rejected
//! instruction has no effect.

use tracing::{debug, info};

use sealbid_confidential::{verify_attestation, ConfidentialService};
use sealbid_types::wire::{decode_u128, WIDE_LEN};
use sealbid_types::{
    short_address, Address, AddressDeriver, Attestation, Auction, AuctionState, Bid, Handle, NULL_ADDRESS,
};

use crate::error::ProgramError;
use crate::events::ProgramEvent;
use crate::genesis::ProgramConfig;
use crate::instruction::CreateAuctionParams;
use crate::state::ProgramState;

/// Context provided by the runtime for each instruction.
pub struct CallContext {
    /// Verified sender of the transaction
    pub sender: Address,
    /// Current ledger time (unix seconds)
    pub timestamp: i64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, ProgramError>;

fn load_auction<'a>(state: &'a ProgramState, address: &Address) -> HandlerResult<&'a Auction> {
    state
        .get_auction(address)
        .ok_or_else(|| ProgramError::AuctionNotFound(hex::encode(address)))
}

fn require_state(auction: &Auction, action: &str, expected: AuctionState) -> HandlerResult<()> {
    if auction.state != expected {
        return Err(ProgramError::InvalidState {
            action: action.to_string(),
            expected,
            got: auction.state,
        });
    }
    Ok(())
}

/// Handle CreateAuction.
pub fn handle_create_auction(
    state: &mut ProgramState,
    config: &ProgramConfig,
    ctx: &CallContext,
    params: CreateAuctionParams,
) -> HandlerResult<Address> {
    // Validate inputs
    if params.title.len() > config.max_title_length {
        return Err(ProgramError::TitleTooLong {
            len: params.title.len(),
            max: config.max_title_length,
        });
    }
    if params.description.len() > config.max_description_length {
        return Err(ProgramError::DescriptionTooLong {
            len: params.description.len(),
            max: config.max_description_length,
        });
    }
    if params.duration < config.min_duration {
        return Err(ProgramError::DurationTooShort {
            duration: params.duration,
            min: config.min_duration,
        });
    }
    if params.duration > config.max_duration {
        return Err(ProgramError::DurationTooLong {
            duration: params.duration,
            max: config.max_duration,
        });
    }
    if params.reserve_price == 0 {
        return Err(ProgramError::InvalidReservePrice);
    }

    let address = AddressDeriver::new(config.program_id).auction_address(&ctx.sender, params.auction_id);
    if state.auctions.contains_key(&address) {
        return Err(ProgramError::DuplicateAuction(hex::encode(address)));
    }

    let auction = Auction {
        seller: ctx.sender,
        item_ref: params.item_ref,
        title: params.title,
        description: params.description,
        reserve_price: params.reserve_price,
        start_time: ctx.timestamp,
        end_time: ctx.timestamp.saturating_add(params.duration),
        state: AuctionState::Open,
        bid_count: 0,
        bids_processed: 0,
        highest_bid_handle: Handle::NONE,
        current_leader: NULL_ADDRESS,
        winner: NULL_ADDRESS,
        winning_amount: 0,
        auction_id: params.auction_id,
    };

    info!(
        auction = %short_address(&address),
        seller = %short_address(&ctx.sender),
        reserve_price = auction.reserve_price,
        end_time = auction.end_time,
        "Auction created"
    );

    state.emit(ProgramEvent::AuctionCreated {
        auction: address,
        seller: auction.seller,
        title: auction.title.clone(),
        reserve_price: auction.reserve_price,
        start_time: auction.start_time,
        end_time: auction.end_time,
    });
    state.auctions.insert(address, auction);
    state.auction_bids.insert(address, Vec::new());

    Ok(address)
}

/// Handle PlaceBid. A second bid from the same bidder replaces the first.
pub fn handle_place_bid(
    state: &mut ProgramState,
    confidential: &mut ConfidentialService,
    config: &ProgramConfig,
    ctx: &CallContext,
    auction_address: Address,
    ciphertext: &[u8],
) -> HandlerResult<Address> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "place bid", AuctionState::Open)?;

    if auction.seller == ctx.sender {
        return Err(ProgramError::SellerCannotBid);
    }
    if ctx.timestamp < auction.start_time {
        return Err(ProgramError::BiddingNotStarted);
    }
    if ctx.timestamp >= auction.end_time {
        return Err(ProgramError::BiddingEnded);
    }

    let bid_address = AddressDeriver::new(config.program_id).bid_address(&auction_address, &ctx.sender);

    // Register the ciphertext last; it is the only fallible step left
    let handle = confidential.new_handle(ciphertext, &ctx.sender)?;

    if let Some(bid) = state.bids.get_mut(&bid_address) {
        bid.encrypted_amount = handle;
        bid.updated_at = ctx.timestamp;
        bid.processed = false;

        info!(
            auction = %short_address(&auction_address),
            bidder = %short_address(&ctx.sender),
            "Bid updated"
        );
        state.emit(ProgramEvent::BidUpdated {
            auction: auction_address,
            bidder: ctx.sender,
            timestamp: ctx.timestamp,
        });
        return Ok(bid_address);
    }

    let bid_number = match state.auctions.get_mut(&auction_address) {
        Some(auction) => {
            auction.bid_count = auction.bid_count.saturating_add(1);
            auction.bid_count
        }
        None => return Err(ProgramError::AuctionNotFound(hex::encode(auction_address))),
    };

    state.bids.insert(
        bid_address,
        Bid {
            auction: auction_address,
            bidder: ctx.sender,
            encrypted_amount: handle,
            created_at: ctx.timestamp,
            updated_at: ctx.timestamp,
            processed: false,
        },
    );
    state.auction_bids.entry(auction_address).or_default().push(bid_address);

    info!(
        auction = %short_address(&auction_address),
        bidder = %short_address(&ctx.sender),
        bid_number,
        "Bid placed"
    );
    state.emit(ProgramEvent::BidPlaced {
        auction: auction_address,
        bidder: ctx.sender,
        bid_number,
        timestamp: ctx.timestamp,
    });

    Ok(bid_address)
}

/// Cancellation reason recorded when bidding closes without bids.
pub const NO_BIDS_REASON: &str = "no bids";

/// Handle CloseBidding. An auction without bids is cancelled instead.
pub fn handle_close_bidding(
    state: &mut ProgramState,
    ctx: &CallContext,
    auction_address: Address,
) -> HandlerResult<AuctionState> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "close bidding", AuctionState::Open)?;

    if !auction.is_bidding_ended(ctx.timestamp) {
        return Err(ProgramError::BiddingNotEnded);
    }

    let next = if auction.bid_count == 0 {
        AuctionState::Cancelled
    } else {
        AuctionState::Closed
    };
    let total_bids = auction.bid_count;
    let seller = auction.seller;

    if let Some(auction) = state.auctions.get_mut(&auction_address) {
        auction.state = next;
    }

    info!(auction = %short_address(&auction_address), total_bids, state = %next, "Bidding closed");
    state.emit(ProgramEvent::BiddingClosed {
        auction: auction_address,
        total_bids,
        timestamp: ctx.timestamp,
    });
    if next == AuctionState::Cancelled {
        state.emit(ProgramEvent::AuctionCancelled {
            auction: auction_address,
            seller,
            reason: NO_BIDS_REASON.to_string(),
            timestamp: ctx.timestamp,
        });
    }

    Ok(next)
}

/// Handle DetermineWinner: compare one bid against the running leader.
///
/// The first processed bid becomes the leader outright. Later bids replace
/// the leader only when strictly greater.
pub fn handle_determine_winner(
    state: &mut ProgramState,
    confidential: &mut ConfidentialService,
    ctx: &CallContext,
    auction_address: Address,
    bid_address: Address,
) -> HandlerResult<()> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "determine winner", AuctionState::Closed)?;

    let bid = state
        .get_bid(&bid_address)
        .ok_or_else(|| ProgramError::BidNotFound(hex::encode(bid_address)))?;
    if bid.auction != auction_address {
        return Err(ProgramError::BidAuctionMismatch);
    }
    if bid.processed {
        return Err(ProgramError::BidAlreadyProcessed);
    }
    if auction.bids_processed >= auction.bid_count {
        return Err(ProgramError::AllBidsProcessed);
    }

    let current = auction.highest_bid_handle;
    let candidate = bid.encrypted_amount;
    let bidder = bid.bidder;

    let (highest, leader) = if current.is_none() {
        (candidate, bidder)
    } else {
        let is_greater = confidential.gt(candidate, current)?;
        let selected = confidential.select(is_greater, candidate, current)?;
        if selected != current {
            (selected, bidder)
        } else {
            (current, auction.current_leader)
        }
    };

    let bids_processed = match state.auctions.get_mut(&auction_address) {
        Some(auction) => {
            auction.highest_bid_handle = highest;
            auction.current_leader = leader;
            auction.bids_processed += 1;
            auction.bids_processed
        }
        None => return Err(ProgramError::AuctionNotFound(hex::encode(auction_address))),
    };
    if let Some(bid) = state.bids.get_mut(&bid_address) {
        bid.processed = true;
    }

    let leader_changed = leader == bidder;
    debug!(
        auction = %short_address(&auction_address),
        bidder = %short_address(&bidder),
        caller = %short_address(&ctx.sender),
        leader_changed,
        "Compared bid against leader"
    );
    info!(auction = %short_address(&auction_address), bids_processed, "Bid processed");
    state.emit(ProgramEvent::BidProcessed {
        auction: auction_address,
        bidder,
        bids_processed,
    });

    Ok(())
}

/// Handle FinalizeWinner: fix the leader and grant it decrypt permission on
/// the winning handle.
pub fn handle_finalize_winner(
    state: &mut ProgramState,
    confidential: &mut ConfidentialService,
    config: &ProgramConfig,
    ctx: &CallContext,
    auction_address: Address,
    permission: Address,
    leader: Address,
) -> HandlerResult<()> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "finalize winner", AuctionState::Closed)?;

    if !auction.all_bids_processed() {
        return Err(ProgramError::BidsPending {
            remaining: auction.remaining_bids(),
        });
    }
    if !auction.has_leader() {
        return Err(ProgramError::NoLeader);
    }
    if leader != auction.current_leader {
        return Err(ProgramError::StaleLeader);
    }

    let handle = auction.highest_bid_handle;
    let expected = AddressDeriver::new(config.confidential_program_id).permission_address(handle, &leader);
    if permission != expected {
        return Err(ProgramError::StalePermission);
    }

    confidential.allow(handle, &leader)?;

    if let Some(auction) = state.auctions.get_mut(&auction_address) {
        auction.winner = leader;
        auction.state = AuctionState::WinnerDetermined;
    }

    info!(
        auction = %short_address(&auction_address),
        winner = %short_address(&leader),
        handle = %handle,
        "Winner determined"
    );
    state.emit(ProgramEvent::WinnerDetermined {
        auction: auction_address,
        winner: leader,
        timestamp: ctx.timestamp,
    });

    Ok(())
}

/// Handle SettleAuction: verify the attested reveal and pay the seller.
pub fn handle_settle_auction(
    state: &mut ProgramState,
    attestor: &Address,
    ctx: &CallContext,
    auction_address: Address,
    handle_bytes: &[u8; WIDE_LEN],
    plaintext_bytes: &[u8; WIDE_LEN],
    attestation: &Attestation,
) -> HandlerResult<u64> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "settle auction", AuctionState::WinnerDetermined)?;

    if ctx.sender != auction.winner {
        return Err(ProgramError::NotWinner);
    }
    if Handle(decode_u128(handle_bytes)?) != auction.highest_bid_handle {
        return Err(ProgramError::HandleMismatch);
    }

    verify_attestation(attestor, handle_bytes, plaintext_bytes, attestation)
        .map_err(|_| ProgramError::InvalidAttestation)?;

    let winning_amount = u64::try_from(decode_u128(plaintext_bytes)?).map_err(|_| ProgramError::AmountOverflow)?;
    if winning_amount < auction.reserve_price {
        return Err(ProgramError::AmountBelowReserve {
            amount: winning_amount,
            reserve: auction.reserve_price,
        });
    }

    let available = state.get_balance(&ctx.sender);
    if available < winning_amount {
        return Err(ProgramError::InsufficientFunds {
            required: winning_amount,
            available,
        });
    }

    let seller = auction.seller;
    let winner = auction.winner;
    if !state.transfer(&winner, seller, winning_amount) {
        return Err(ProgramError::InsufficientFunds {
            required: winning_amount,
            available,
        });
    }

    if let Some(auction) = state.auctions.get_mut(&auction_address) {
        auction.winning_amount = winning_amount;
        auction.state = AuctionState::Settled;
    }

    info!(
        auction = %short_address(&auction_address),
        winner = %short_address(&winner),
        seller = %short_address(&seller),
        winning_amount,
        "Auction settled"
    );
    state.emit(ProgramEvent::AuctionSettled {
        auction: auction_address,
        winner,
        winning_amount,
        timestamp: ctx.timestamp,
    });

    Ok(winning_amount)
}

/// Handle CancelAuction (seller only, while open).
pub fn handle_cancel_auction(
    state: &mut ProgramState,
    ctx: &CallContext,
    auction_address: Address,
    reason: String,
) -> HandlerResult<()> {
    let auction = load_auction(state, &auction_address)?;
    require_state(auction, "cancel auction", AuctionState::Open)?;

    if ctx.sender != auction.seller {
        return Err(ProgramError::NotSeller);
    }
    let seller = auction.seller;

    if let Some(auction) = state.auctions.get_mut(&auction_address) {
        auction.state = AuctionState::Cancelled;
    }

    info!(auction = %short_address(&auction_address), reason = %reason, "Auction cancelled");
    state.emit(ProgramEvent::AuctionCancelled {
        auction: auction_address,
        seller,
        reason,
        timestamp: ctx.timestamp,
    });

    Ok(())
}
