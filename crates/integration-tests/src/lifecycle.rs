//! Happy paths and the legal-action table, end to end on an in-process chain.

use sealbid_coordinator::{Action, CoordinatorError, Keypair};
use sealbid_program::ProgramEvent;
use sealbid_types::{AuctionState, NULL_ADDRESS};

use crate::harness::{Harness, DURATION, FUNDS, RESERVE};

#[tokio::test]
async fn test_full_auction_lifecycle() {
    let h = Harness::new();

    // ========================================
    // Phase 1: Seller opens an auction
    // ========================================

    let auction = h.open_auction(1).await;
    let record = h.auction(&auction);
    assert_eq!(record.state, AuctionState::Open);
    assert_eq!(record.end_time - record.start_time, DURATION);

    // ========================================
    // Phase 2: Sealed bids
    // ========================================

    let bidders = h
        .place_bids(&auction, &[1_500_000_000, 2_500_000_000, 2_000_000_000])
        .await;
    assert_eq!(h.auction(&auction).bid_count, 3);

    let (_, actions) = h
        .coordinator
        .available_actions(&bidders[0].address(), &auction)
        .await
        .unwrap();
    assert!(actions.contains(&Action::PlaceBid));
    assert!(!actions.contains(&Action::CloseBidding));

    // ========================================
    // Phase 3: Close and compare
    // ========================================

    let closed = h.close(&auction).await;
    assert_eq!(closed.state(), AuctionState::Closed);

    let report = h.coordinator.process_all(&h.seller, &auction).await;
    assert!(report.is_complete(), "batch stopped: {:?}", report.error);
    assert_eq!(report.processed, 3);
    assert_eq!(h.processed_events(&auction), 3);

    // ========================================
    // Phase 4: Anyone may finalize
    // ========================================

    let outsider = Keypair::generate();
    let finalized = h.coordinator.finalize(&outsider, &auction).await.unwrap();
    assert_eq!(finalized.state(), AuctionState::WinnerDetermined);
    assert_eq!(finalized.auction.winner, bidders[1].address());

    // ========================================
    // Phase 5: Only the winner settles
    // ========================================

    let err = h.coordinator.settle(&bidders[0], &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Authorization { role: "winner", .. }));

    let (_, actions) = h
        .coordinator
        .available_actions(&bidders[1].address(), &auction)
        .await
        .unwrap();
    assert_eq!(actions, vec![Action::SettleAuction]);

    let settlement = h.coordinator.settle(&bidders[1], &auction).await.unwrap();
    assert_eq!(settlement.revealed, 2_500_000_000);
    assert_eq!(settlement.snapshot.state(), AuctionState::Settled);
    assert_eq!(settlement.snapshot.auction.winning_amount, 2_500_000_000);

    assert_eq!(h.balance(&h.seller.address()), 2_500_000_000);
    assert_eq!(h.balance(&bidders[1].address()), FUNDS - 2_500_000_000);
    assert_eq!(h.balance(&bidders[0].address()), FUNDS);

    let events = h.coordinator.events(&auction).await.unwrap();
    assert!(matches!(events.first(), Some(ProgramEvent::AuctionCreated { .. })));
    assert!(matches!(events.last(), Some(ProgramEvent::AuctionSettled { .. })));

    // Terminal: nothing left to do for anyone
    let (_, actions) = h.coordinator.available_actions(&h.seller.address(), &auction).await.unwrap();
    assert!(actions.is_empty());
}

#[tokio::test]
async fn test_zero_bid_auction_is_cancelled_at_close() {
    let h = Harness::new();
    let auction = h.open_auction(2).await;

    let closed = h.close(&auction).await;
    assert_eq!(closed.state(), AuctionState::Cancelled);
    assert_eq!(closed.auction.bid_count, 0);

    let events = h.coordinator.events(&auction).await.unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, ProgramEvent::BiddingClosed { total_bids: 0, .. })));
    assert!(matches!(events.last(), Some(ProgramEvent::AuctionCancelled { .. })));

    let err = h.coordinator.process_next(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
}

#[tokio::test]
async fn test_rebid_replaces_amount_in_place() {
    let h = Harness::new();
    let auction = h.open_auction(3).await;

    let bidder = h.funded_bidder();
    let first = h.coordinator.place_bid(&bidder, &auction, 1_200_000_000).await.unwrap();
    let second = h.coordinator.place_bid(&bidder, &auction, 3_000_000_000).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.auction(&auction).bid_count, 1);

    let rival = h.place_bids(&auction, &[2_000_000_000]).await;
    assert_eq!(h.auction(&auction).bid_count, 2);

    let events = h.coordinator.events(&auction).await.unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgramEvent::BidUpdated { .. }))
            .count(),
        1
    );

    h.close(&auction).await;
    h.coordinator.process_all(&h.seller, &auction).await;
    let finalized = h.coordinator.finalize(&rival[0], &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidder.address());

    let settlement = h.coordinator.settle(&bidder, &auction).await.unwrap();
    assert_eq!(settlement.snapshot.auction.winning_amount, 3_000_000_000);
}

#[tokio::test]
async fn test_tie_keeps_first_processed_bid() {
    let h = Harness::new();
    let auction = h.open_auction(4).await;
    let bidders = h.place_bids(&auction, &[2_000_000_000, 2_000_000_000]).await;

    h.close(&auction).await;
    let report = h.coordinator.process_all(&h.seller, &auction).await;
    assert!(report.is_complete());

    // Bids are processed in bid-address order
    let deriver = h.coordinator.config().program_deriver();
    let first = bidders
        .iter()
        .min_by_key(|b| deriver.bid_address(&auction, &b.address()))
        .unwrap();

    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, first.address());
}

#[tokio::test]
async fn test_bid_guards() {
    let h = Harness::new();
    let auction = h.open_auction(5).await;
    let bidder = h.funded_bidder();

    let err = h
        .coordinator
        .place_bid(&bidder, &auction, RESERVE - 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidInput { .. }));

    let err = h.coordinator.place_bid(&h.seller, &auction, RESERVE).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Authorization { .. }));
    assert_eq!(h.auction(&auction).bid_count, 0);

    h.chain.advance_time(DURATION);
    let err = h.coordinator.place_bid(&bidder, &auction, RESERVE).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
}

#[tokio::test]
async fn test_out_of_order_actions_are_state_violations() {
    let h = Harness::new();
    let auction = h.open_auction(6).await;
    let bidders = h.place_bids(&auction, &[1_100_000_000, 1_300_000_000]).await;

    // Bidding still open
    let err = h.coordinator.close_bidding(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
    let err = h.coordinator.process_next(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));

    h.close(&auction).await;

    // Nothing processed yet
    let err = h.coordinator.finalize(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
    let err = h.coordinator.settle(&bidders[1], &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));

    // One of two processed
    h.coordinator.process_next(&h.seller, &auction).await.unwrap();
    let err = h.coordinator.finalize(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));

    h.coordinator.process_next(&h.seller, &auction).await.unwrap();
    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[1].address());

    // Finalize twice
    let err = h.coordinator.finalize(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
}

#[tokio::test]
async fn test_cancel_by_seller_only() {
    let h = Harness::new();
    let auction = h.open_auction(7).await;
    let bidders = h.place_bids(&auction, &[1_500_000_000]).await;

    let err = h
        .coordinator
        .cancel_auction(&bidders[0], &auction, "not mine")
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::Authorization { role: "seller", .. }));

    let cancelled = h
        .coordinator
        .cancel_auction(&h.seller, &auction, "lot withdrawn")
        .await
        .unwrap();
    assert_eq!(cancelled.state(), AuctionState::Cancelled);
    assert_eq!(cancelled.auction.current_leader, NULL_ADDRESS);

    let err = h
        .coordinator
        .place_bid(&bidders[0], &auction, 2_000_000_000)
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::StateViolation { .. }));
}

#[tokio::test]
async fn test_list_filters_by_seller_and_state() {
    let h = Harness::new();
    let first = h.open_auction(10).await;
    let second = h.open_auction(11).await;
    h.coordinator
        .cancel_auction(&h.seller, &second, "duplicate listing")
        .await
        .unwrap();

    let mine = h.coordinator.list(Some(h.seller.address()), None).await.unwrap();
    assert_eq!(mine.len(), 2);

    let open = h.coordinator.list(None, Some(AuctionState::Open)).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].address, first);

    let other = h.coordinator.list(Some([9u8; 32]), None).await.unwrap();
    assert!(other.is_empty());
}
