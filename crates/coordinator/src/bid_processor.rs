//! Sequential winner determination.
//!
//! Bids are compared one at a time against the running encrypted leader.
//! [`BidProcessor::next_step`] performs exactly one comparison per call so
//! callers can interleave retries, backoff or cancellation. [`BidProcessor::run`]
//! drives it to completion and reports progress even when it stops early.
//!
//! Progress lives on the ledger (`bids_processed` and each bid's `processed`
//! flag), so a processor built after an interruption simply continues.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use sealbid_program::{BidEntry, Instruction, ProgramEvent};
use sealbid_types::{short_address, Address, AuctionState};

use crate::config::CoordinatorConfig;
use crate::error::{Attempt, BatchReport, CoordinatorError};
use crate::identity::SigningIdentity;
use crate::ledger::{fetch_bids, fetch_snapshot, sign_and_submit, Ledger};
use crate::state_machine::{Action, AuctionSnapshot, AuctionStateMachine};

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A bid was compared by this processor.
    Processed {
        bid: Address,
        bidder: Address,
        bids_processed: u32,
        bid_count: u32,
    },
    /// Another caller processed the bid first.
    Skipped { bid: Address },
    /// Every bid has been compared.
    Exhausted { bids_processed: u32, bid_count: u32 },
}

/// Drives `bids_processed` to `bid_count` for one auction.
pub struct BidProcessor<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    config: &'a CoordinatorConfig,
    identity: &'a dyn SigningIdentity,
    auction: Address,
    /// Bids the ledger has confirmed as processed
    visited: HashSet<Address>,
}

impl<'a, L: Ledger + ?Sized> BidProcessor<'a, L> {
    pub fn new(
        ledger: &'a L,
        config: &'a CoordinatorConfig,
        identity: &'a dyn SigningIdentity,
        auction: Address,
    ) -> Self {
        Self {
            ledger,
            config,
            identity,
            auction,
            visited: HashSet::new(),
        }
    }

    fn attempt(&self) -> Attempt {
        Attempt::new(Action::DetermineWinner, self.identity.address())
    }

    /// Unprocessed bids not yet confirmed to this processor, in a fixed total
    /// order (by bid address).
    pub async fn pending(&self) -> Result<Vec<BidEntry>, CoordinatorError> {
        let mut bids = fetch_bids(
            self.ledger,
            self.config,
            Action::DetermineWinner,
            &self.identity.address(),
            &self.auction,
            true,
        )
        .await?;
        bids.retain(|entry| entry.bid.auction == self.auction && !entry.bid.processed);
        bids.retain(|entry| !self.visited.contains(&entry.address));
        bids.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(bids)
    }

    /// Compare the next unprocessed bid, if any.
    pub async fn next_step(&mut self) -> Result<Step, CoordinatorError> {
        let snapshot = fetch_snapshot(self.ledger, self.config, &self.attempt(), &self.auction).await?;
        let auction = &snapshot.auction;

        match auction.state {
            AuctionState::Closed => {}
            AuctionState::WinnerDetermined | AuctionState::Settled => {
                return Ok(exhausted(&snapshot));
            }
            AuctionState::Open | AuctionState::Cancelled => {
                AuctionStateMachine::check(&snapshot, Action::DetermineWinner, &self.identity.address())?;
            }
        }
        if auction.all_bids_processed() {
            return Ok(exhausted(&snapshot));
        }

        let next = match self.pending().await?.into_iter().next() {
            Some(entry) => entry,
            None => {
                return Err(self.attempt().in_state(auction.state).stale(format!(
                    "{} of {} bids processed but no unprocessed bid is visible",
                    auction.bids_processed, auction.bid_count
                )));
            }
        };

        self.process_bid(&snapshot, next).await
    }

    /// Compare one specific bid against the current leader.
    pub async fn process_bid(&mut self, snapshot: &AuctionSnapshot, entry: BidEntry) -> Result<Step, CoordinatorError> {
        let caller = self.identity.address();

        // A bid is only marked visited once the ledger has settled it, so a
        // failed submission is retried by the next step.
        match AuctionStateMachine::check_bid(snapshot, &entry.address, &entry.bid, &caller) {
            Ok(()) => {}
            Err(CoordinatorError::AlreadyProcessed { .. }) => {
                self.visited.insert(entry.address);
                return Ok(Step::Skipped { bid: entry.address });
            }
            Err(e) => return Err(e),
        }

        let attempt = self.attempt().in_state(snapshot.state()).on_bid(entry.address);
        let instruction = Instruction::DetermineWinner {
            auction: self.auction,
            bid: entry.address,
        };

        match sign_and_submit(self.ledger, self.config, self.identity, &attempt, instruction).await {
            Ok(receipt) => {
                self.visited.insert(entry.address);
                let bids_processed = receipt
                    .events
                    .iter()
                    .find_map(|event| match event {
                        ProgramEvent::BidProcessed { bids_processed, .. } => Some(*bids_processed),
                        _ => None,
                    })
                    .unwrap_or(snapshot.auction.bids_processed + 1);
                info!(
                    auction = %short_address(&self.auction),
                    bid = %short_address(&entry.address),
                    bids_processed,
                    bid_count = snapshot.auction.bid_count,
                    "Processed bid"
                );
                Ok(Step::Processed {
                    bid: entry.address,
                    bidder: entry.bid.bidder,
                    bids_processed,
                    bid_count: snapshot.auction.bid_count,
                })
            }
            Err(CoordinatorError::AlreadyProcessed { .. }) => {
                self.visited.insert(entry.address);
                debug!(
                    auction = %short_address(&self.auction),
                    bid = %short_address(&entry.address),
                    "Bid already processed by another caller"
                );
                Ok(Step::Skipped { bid: entry.address })
            }
            Err(e) => Err(e),
        }
    }

    /// Process bids until none remain or an error blocks progress.
    pub async fn run(&mut self) -> BatchReport {
        let mut report = BatchReport {
            processed: 0,
            skipped: 0,
            bids_processed: 0,
            bid_count: 0,
            error: None,
        };

        let mut stale = 0;

        loop {
            match self.next_step().await {
                Ok(Step::Processed {
                    bids_processed,
                    bid_count,
                    ..
                }) => {
                    stale = 0;
                    report.processed += 1;
                    report.bids_processed = bids_processed;
                    report.bid_count = bid_count;
                }
                Ok(Step::Skipped { .. }) => report.skipped += 1,
                Ok(Step::Exhausted {
                    bids_processed,
                    bid_count,
                }) => {
                    report.bids_processed = bids_processed;
                    report.bid_count = bid_count;
                    break;
                }
                Err(e @ CoordinatorError::StaleState { .. }) if stale < self.config.stale_retries => {
                    stale += 1;
                    debug!(
                        auction = %short_address(&self.auction),
                        retry = stale,
                        error = %e,
                        "Stale read during bid processing, re-reading"
                    );
                }
                Err(e) => {
                    warn!(
                        auction = %short_address(&self.auction),
                        processed = report.processed,
                        error = %e,
                        "Bid processing stopped"
                    );
                    // Best-effort counters for the report
                    if let Ok(snapshot) =
                        fetch_snapshot(self.ledger, self.config, &self.attempt(), &self.auction).await
                    {
                        report.bids_processed = snapshot.auction.bids_processed;
                        report.bid_count = snapshot.auction.bid_count;
                    }
                    report.error = Some(e);
                    break;
                }
            }
        }

        info!(
            auction = %short_address(&self.auction),
            processed = report.processed,
            skipped = report.skipped,
            bids_processed = report.bids_processed,
            bid_count = report.bid_count,
            "Bid processing finished"
        );
        report
    }
}

fn exhausted(snapshot: &AuctionSnapshot) -> Step {
    Step::Exhausted {
        bids_processed: snapshot.auction.bids_processed,
        bid_count: snapshot.auction.bid_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Keypair;
    use crate::local::LocalChain;
    use crate::session::{AuctionCoordinator, NewAuction};
    use sealbid_program::GenesisConfig;

    async fn closed_auction(bids: &[u64]) -> (AuctionCoordinator<LocalChain, LocalChain>, Address) {
        let chain = LocalChain::from_genesis(GenesisConfig::default()).unwrap();
        let coordinator = AuctionCoordinator::new(chain.clone(), chain, CoordinatorConfig::default());
        let seller = Keypair::generate();

        let auction = coordinator
            .create_auction(
                &seller,
                NewAuction {
                    auction_id: 1,
                    title: "Lot".into(),
                    description: String::new(),
                    reserve_price: 10,
                    duration: 120,
                    item_ref: None,
                },
            )
            .await
            .unwrap()
            .address;

        for amount in bids {
            coordinator.place_bid(&Keypair::generate(), &auction, *amount).await.unwrap();
        }
        coordinator.ledger().advance_time(120);
        coordinator.close_bidding(&seller, &auction).await.unwrap();
        (coordinator, auction)
    }

    #[tokio::test]
    async fn test_steps_until_exhausted() {
        let (coordinator, auction) = closed_auction(&[50, 70, 60]).await;
        let caller = Keypair::generate();
        let mut processor = coordinator.bid_processor(&caller, auction);

        for expected in 1..=3 {
            match processor.next_step().await.unwrap() {
                Step::Processed { bids_processed, bid_count, .. } => {
                    assert_eq!(bids_processed, expected);
                    assert_eq!(bid_count, 3);
                }
                other => panic!("unexpected step: {:?}", other),
            }
        }
        assert_eq!(
            processor.next_step().await.unwrap(),
            Step::Exhausted {
                bids_processed: 3,
                bid_count: 3
            }
        );
    }

    #[tokio::test]
    async fn test_pending_order_is_total() {
        let (coordinator, auction) = closed_auction(&[50, 70, 60, 20]).await;
        let caller = Keypair::generate();
        let processor = coordinator.bid_processor(&caller, auction);

        let pending = processor.pending().await.unwrap();
        assert_eq!(pending.len(), 4);
        assert!(pending.windows(2).all(|w| w[0].address < w[1].address));
    }

    #[tokio::test]
    async fn test_run_reports_progress() {
        let (coordinator, auction) = closed_auction(&[50, 70]).await;
        let caller = Keypair::generate();

        let report = coordinator.process_all(&caller, &auction).await;
        assert!(report.is_complete());
        assert_eq!(report.processed, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!((report.bids_processed, report.bid_count), (2, 2));

        // Nothing left for a second run
        let again = coordinator.process_all(&caller, &auction).await;
        assert!(again.is_complete());
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn test_processed_bid_is_skipped() {
        let (coordinator, auction) = closed_auction(&[50, 70]).await;
        let caller = Keypair::generate();
        let mut first = coordinator.bid_processor(&caller, auction);
        let mut second = coordinator.bid_processor(&caller, auction);

        // Both see the same pending bid; the first processes it
        let target = second.pending().await.unwrap().remove(0);
        let step = first.next_step().await.unwrap();
        assert!(matches!(step, Step::Processed { bid, .. } if bid == target.address));

        let snapshot = coordinator.refresh(&auction).await.unwrap();
        assert_eq!(
            second.process_bid(&snapshot, target.clone()).await.unwrap(),
            Step::Skipped { bid: target.address }
        );
        assert_eq!(coordinator.refresh(&auction).await.unwrap().auction.bids_processed, 1);
    }

    #[tokio::test]
    async fn test_open_auction_is_state_violation() {
        let chain = LocalChain::from_genesis(GenesisConfig::default()).unwrap();
        let coordinator = AuctionCoordinator::new(chain.clone(), chain, CoordinatorConfig::default());
        let seller = Keypair::generate();
        let auction = coordinator
            .create_auction(
                &seller,
                NewAuction {
                    auction_id: 9,
                    title: "Lot".into(),
                    description: String::new(),
                    reserve_price: 10,
                    duration: 120,
                    item_ref: None,
                },
            )
            .await
            .unwrap()
            .address;

        let report = coordinator.process_all(&seller, &auction).await;
        assert!(matches!(
            report.error,
            Some(CoordinatorError::StateViolation {
                state: Some(AuctionState::Open),
                ..
            })
        ));
        assert_eq!(report.processed, 0);
    }
}
