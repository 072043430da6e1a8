//! Auction lifecycle state machine.
//!
//! ```text
//! Open ──close──▶ Closed ──finalize──▶ WinnerDetermined ──settle──▶ Settled
//!  │                 ▲  │
//!  │                 └──┘ determine winner (one bid at a time)
//!  ├──close (no bids)──▶ Cancelled
//!  └──cancel (seller)──▶ Cancelled
//! ```
//!
//! Guards are evaluated against a fresh [`AuctionSnapshot`] before anything
//! is submitted. The ledger re-validates every transition authoritatively.

use std::fmt;

use serde::{Deserialize, Serialize};

use sealbid_types::{Address, Auction, AuctionState, Bid};

use crate::error::{Attempt, CoordinatorError};

/// Actions a caller can attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateAuction,
    PlaceBid,
    CloseBidding,
    DetermineWinner,
    FinalizeWinner,
    SettleAuction,
    CancelAuction,
    Refresh,
}

impl Action {
    /// Lifecycle actions, in the order they normally occur.
    pub const LIFECYCLE: [Action; 6] = [
        Action::PlaceBid,
        Action::CloseBidding,
        Action::DetermineWinner,
        Action::FinalizeWinner,
        Action::SettleAuction,
        Action::CancelAuction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateAuction => "create auction",
            Action::PlaceBid => "place bid",
            Action::CloseBidding => "close bidding",
            Action::DetermineWinner => "determine winner",
            Action::FinalizeWinner => "finalize winner",
            Action::SettleAuction => "settle auction",
            Action::CancelAuction => "cancel auction",
            Action::Refresh => "refresh auction",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An auction as read from the ledger at a point in ledger time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    pub address: Address,
    pub auction: Auction,
    /// Ledger time of the read
    pub now: i64,
}

impl AuctionSnapshot {
    pub fn state(&self) -> AuctionState {
        self.auction.state
    }
}

/// Transition guards for the auction lifecycle.
pub struct AuctionStateMachine;

impl AuctionStateMachine {
    /// Check whether `caller` may attempt `action` on the snapshot.
    pub fn check(snapshot: &AuctionSnapshot, action: Action, caller: &Address) -> Result<(), CoordinatorError> {
        let auction = &snapshot.auction;
        let now = snapshot.now;
        let attempt = Attempt::new(action, *caller).in_state(auction.state);

        match action {
            Action::CreateAuction | Action::Refresh => Ok(()),

            Action::PlaceBid => {
                require_state(&attempt, auction, AuctionState::Open)?;
                if now < auction.start_time {
                    return Err(attempt.state_violation("bidding has not started"));
                }
                if auction.is_bidding_ended(now) {
                    return Err(attempt.state_violation("bidding period has ended"));
                }
                if caller == &auction.seller {
                    return Err(attempt.unauthorized("a bidder other than the seller"));
                }
                Ok(())
            }

            Action::CloseBidding => {
                require_state(&attempt, auction, AuctionState::Open)?;
                if !auction.is_bidding_ended(now) {
                    return Err(attempt.state_violation(format!(
                        "bidding ends in {}s",
                        auction.end_time.saturating_sub(now)
                    )));
                }
                Ok(())
            }

            Action::DetermineWinner => {
                require_state(&attempt, auction, AuctionState::Closed)?;
                if auction.all_bids_processed() {
                    return Err(attempt.state_violation("all bids have been processed"));
                }
                Ok(())
            }

            Action::FinalizeWinner => {
                require_state(&attempt, auction, AuctionState::Closed)?;
                if !auction.all_bids_processed() {
                    return Err(attempt.state_violation(format!(
                        "{} of {} bids processed",
                        auction.bids_processed, auction.bid_count
                    )));
                }
                if !auction.has_leader() {
                    return Err(attempt.state_violation("no leading bid"));
                }
                Ok(())
            }

            Action::SettleAuction => {
                require_state(&attempt, auction, AuctionState::WinnerDetermined)?;
                if caller != &auction.winner {
                    return Err(attempt.unauthorized("winner"));
                }
                Ok(())
            }

            Action::CancelAuction => {
                require_state(&attempt, auction, AuctionState::Open)?;
                if caller != &auction.seller {
                    return Err(attempt.unauthorized("seller"));
                }
                Ok(())
            }
        }
    }

    /// Check that `bid` can be compared on this auction.
    pub fn check_bid(
        snapshot: &AuctionSnapshot,
        bid_address: &Address,
        bid: &Bid,
        caller: &Address,
    ) -> Result<(), CoordinatorError> {
        Self::check(snapshot, Action::DetermineWinner, caller)?;

        let attempt = Attempt::new(Action::DetermineWinner, *caller)
            .in_state(snapshot.state())
            .on_bid(*bid_address);
        if bid.auction != snapshot.address {
            return Err(attempt.invalid_input("bid belongs to another auction"));
        }
        if bid.processed {
            return Err(attempt.program_error(sealbid_program::ProgramError::BidAlreadyProcessed));
        }
        Ok(())
    }

    /// Actions `caller` may legally attempt right now.
    pub fn available_actions(snapshot: &AuctionSnapshot, caller: &Address) -> Vec<Action> {
        Action::LIFECYCLE
            .into_iter()
            .filter(|action| Self::check(snapshot, *action, caller).is_ok())
            .collect()
    }

    /// State that closing bidding leads to.
    pub fn close_outcome(auction: &Auction) -> AuctionState {
        if auction.bid_count == 0 {
            AuctionState::Cancelled
        } else {
            AuctionState::Closed
        }
    }
}

fn require_state(attempt: &Attempt, auction: &Auction, expected: AuctionState) -> Result<(), CoordinatorError> {
    if auction.state != expected {
        return Err(attempt.state_violation(format!("requires {}", expected)));
    }
    Ok(())
}
