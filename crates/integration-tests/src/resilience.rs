//! Interruption, retries, concurrency and timeouts.

use std::time::Duration;

use async_trait::async_trait;

use sealbid_confidential::AttestedDecryption;
use sealbid_coordinator::{
    AuctionCoordinator, CoordinatorConfig, CoordinatorError, EncryptionGateway, GatewayError, Keypair, Ledger,
    LedgerError, LocalChain, Stage, Step,
};
use sealbid_program::{Instruction, ProgramError, ProgramEvent, SignedTransaction};
use sealbid_types::{Address, AuctionState, Handle, Signature};

use crate::harness::{FlakyLedger, Harness, LaggingLedger, StalledGateway, FUNDS};

fn determine_winner_tx(caller: &Keypair, auction: Address, bid: Address) -> SignedTransaction {
    let instruction = Instruction::DetermineWinner { auction, bid };
    let signature = caller.sign_now(&SignedTransaction::signing_message(&instruction).unwrap());
    SignedTransaction {
        sender: caller.address(),
        instruction,
        signature,
    }
}

#[tokio::test]
async fn test_determine_winner_is_idempotent() {
    let h = Harness::new();
    let auction = h.open_auction(1).await;
    h.place_bids(&auction, &[1_500_000_000, 1_800_000_000]).await;
    h.close(&auction).await;

    let step = h.coordinator.process_next(&h.seller, &auction).await.unwrap();
    let processed = match step {
        Step::Processed { bid, bids_processed, .. } => {
            assert_eq!(bids_processed, 1);
            bid
        }
        other => panic!("expected a processed bid, got {:?}", other),
    };

    // Direct resubmission is rejected and changes nothing
    let err = h
        .chain
        .submit(determine_winner_tx(&h.seller, auction, processed))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ProgramError::BidAlreadyProcessed));
    assert_eq!(h.auction(&auction).bids_processed, 1);

    // Another caller holding the processed bid skips it
    let other = Keypair::generate();
    let snapshot = h.coordinator.refresh(&auction).await.unwrap();
    let entry = h
        .coordinator
        .bids(&auction)
        .await
        .unwrap()
        .into_iter()
        .find(|e| e.address == processed)
        .unwrap();
    let mut processor = h.coordinator.bid_processor(&other, auction);
    let step = processor.process_bid(&snapshot, entry).await.unwrap();
    assert!(matches!(step, Step::Skipped { bid } if bid == processed));
    assert_eq!(h.processed_events(&auction), 1);
}

#[tokio::test]
async fn test_stepwise_processing_never_overshoots() {
    let h = Harness::new();
    let auction = h.open_auction(2).await;
    h.place_bids(&auction, &[1_200_000_000, 1_900_000_000, 1_400_000_000, 1_700_000_000])
        .await;
    h.close(&auction).await;

    let mut last = 0;
    loop {
        match h.coordinator.process_next(&h.seller, &auction).await.unwrap() {
            Step::Processed {
                bids_processed,
                bid_count,
                ..
            } => {
                assert!(bids_processed <= bid_count);
                assert_eq!(bids_processed, last + 1);
                last = bids_processed;
            }
            Step::Exhausted {
                bids_processed,
                bid_count,
            } => {
                assert_eq!(bids_processed, bid_count);
                break;
            }
            Step::Skipped { bid } => panic!("unexpected skip of {:?}", bid),
        }
    }
    assert_eq!(last, 4);

    // Exhaustion is stable
    let step = h.coordinator.process_next(&h.seller, &auction).await.unwrap();
    assert!(matches!(step, Step::Exhausted { bids_processed: 4, bid_count: 4 }));
}

#[tokio::test]
async fn test_resume_after_interrupted_batch() {
    let h = Harness::new();
    let auction = h.open_auction(3).await;
    let amounts = [1_100_000_000, 4_000_000_000, 2_200_000_000, 3_300_000_000, 1_900_000_000];
    let bidders = h.place_bids(&auction, &amounts).await;
    h.close(&auction).await;

    // ========================================
    // Connection drops after two submissions
    // ========================================

    let flaky = h.coordinator_over(FlakyLedger::failing_after(h.chain.clone(), 2));
    let report = flaky.process_all(&h.seller, &auction).await;
    assert_eq!(report.processed, 2);
    assert_eq!(report.bids_processed, 2);
    assert_eq!(report.bid_count, 5);
    assert!(!report.is_complete());
    assert!(matches!(report.error, Some(CoordinatorError::NetworkOrLedger { .. })));

    // ========================================
    // A fresh processor picks up where it stopped
    // ========================================

    let report = h.coordinator.process_all(&h.seller, &auction).await;
    assert!(report.is_complete(), "resume failed: {:?}", report.error);
    assert_eq!(report.processed, 3);
    assert_eq!(h.processed_events(&auction), amounts.len());

    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[1].address());
}

#[tokio::test]
async fn test_processor_retries_bid_after_failed_submission() {
    let h = Harness::new();
    let auction = h.open_auction(9).await;
    let bidders = h.place_bids(&auction, &[1_600_000_000, 2_400_000_000]).await;
    h.close(&auction).await;

    // The first submission is dropped, later ones go through
    let flaky = h.coordinator_over(FlakyLedger::dropping(h.chain.clone(), 0, 1));
    let caller = Keypair::generate();
    let mut processor = flaky.bid_processor(&caller, auction);

    let err = processor.next_step().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::NetworkOrLedger { .. }));
    assert_eq!(h.auction(&auction).bids_processed, 0);

    let mut steps = 0;
    loop {
        match processor.next_step().await.unwrap() {
            Step::Processed { .. } => steps += 1,
            Step::Exhausted {
                bids_processed,
                bid_count,
            } => {
                assert_eq!((bids_processed, bid_count), (2, 2));
                break;
            }
            Step::Skipped { bid } => panic!("unexpected skip of {:?}", bid),
        }
    }
    assert_eq!(steps, 2);

    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[1].address());
}

#[tokio::test]
async fn test_batch_resumes_on_same_processor_after_failed_submission() {
    let h = Harness::new();
    let auction = h.open_auction(10).await;
    h.place_bids(&auction, &[1_100_000_000, 1_200_000_000, 1_300_000_000])
        .await;
    h.close(&auction).await;

    let flaky = h.coordinator_over(FlakyLedger::dropping(h.chain.clone(), 1, 1));
    let caller = Keypair::generate();
    let mut processor = flaky.bid_processor(&caller, auction);

    let report = processor.run().await;
    assert_eq!(report.processed, 1);
    assert!(matches!(report.error, Some(CoordinatorError::NetworkOrLedger { .. })));

    let report = processor.run().await;
    assert!(report.is_complete(), "second run stopped: {:?}", report.error);
    assert_eq!(report.processed, 2);
    assert_eq!((report.bids_processed, report.bid_count), (3, 3));
    assert_eq!(h.processed_events(&auction), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_processors_process_each_bid_once() {
    let h = Harness::new();
    let auction = h.open_auction(4).await;
    let amounts = [1_300_000_000, 1_600_000_000, 5_000_000_000, 2_100_000_000, 1_050_000_000, 2_900_000_000];
    let bidders = h.place_bids(&auction, &amounts).await;
    h.close(&auction).await;

    let spawn_processor = move |coordinator: AuctionCoordinator<LocalChain, LocalChain>| {
        let identity = Keypair::generate();
        tokio::spawn(async move { coordinator.process_all(&identity, &auction).await })
    };
    let first = spawn_processor(h.coordinator_over(h.chain.clone()));
    let second = spawn_processor(h.coordinator_over(h.chain.clone()));

    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    assert!(a.error.is_none(), "first processor failed: {:?}", a.error);
    assert!(b.error.is_none(), "second processor failed: {:?}", b.error);
    assert_eq!(a.processed + b.processed, amounts.len() as u32);

    let record = h.auction(&auction);
    assert_eq!(record.bids_processed, record.bid_count);
    assert_eq!(h.processed_events(&auction), amounts.len());

    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[2].address());
}

#[tokio::test]
async fn test_finalize_recovers_from_stale_leader() {
    let h = Harness::new();
    let auction = h.open_auction(5).await;
    let bidders = h.place_bids(&auction, &[1_500_000_000, 2_500_000_000]).await;
    h.close(&auction).await;
    h.coordinator.process_all(&h.seller, &auction).await;

    let lagging = h.coordinator_over(LaggingLedger::new(h.chain.clone(), 1, bidders[0].address()));
    let finalized = lagging.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[1].address());

    let winners = h
        .coordinator
        .events(&auction)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| matches!(e, ProgramEvent::WinnerDetermined { .. }))
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn test_finalize_gives_up_after_retry_budget() {
    let h = Harness::new();
    let auction = h.open_auction(6).await;
    let bidders = h.place_bids(&auction, &[1_500_000_000, 2_500_000_000]).await;
    h.close(&auction).await;
    h.coordinator.process_all(&h.seller, &auction).await;

    // Default budget is one retry; two stale reads exhaust it
    let lagging = h.coordinator_over(LaggingLedger::new(h.chain.clone(), 2, bidders[0].address()));
    let err = lagging.finalize(&h.seller, &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::StaleState { .. }));
    assert!(err.is_retryable());
    assert_eq!(h.auction(&auction).state, AuctionState::Closed);

    let finalized = h.coordinator.finalize(&h.seller, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, bidders[1].address());
}

#[tokio::test]
async fn test_settle_times_out_and_can_be_retried() {
    let config = CoordinatorConfig::default().with_uniform_timeout(Duration::from_millis(100));
    let h = Harness::with_config(config.clone());
    let auction = h.open_auction(7).await;
    let bidders = h.place_bids(&auction, &[1_500_000_000]).await;
    h.close(&auction).await;
    h.coordinator.process_all(&h.seller, &auction).await;
    h.coordinator.finalize(&h.seller, &auction).await.unwrap();

    let stalled = AuctionCoordinator::new(h.chain.clone(), StalledGateway { inner: h.chain.clone() }, config);
    let err = stalled.settle(&bidders[0], &auction).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Timeout { stage: Stage::Decrypt, .. }));
    assert!(err.is_retryable());
    assert_eq!(h.auction(&auction).state, AuctionState::WinnerDetermined);
    assert_eq!(h.balance(&bidders[0].address()), FUNDS);

    let settlement = h.coordinator.settle(&bidders[0], &auction).await.unwrap();
    assert_eq!(settlement.revealed, 1_500_000_000);
}

/// Gateway that reports a different plaintext than the one attested.
struct TamperingGateway {
    inner: LocalChain,
}

#[async_trait]
impl EncryptionGateway for TamperingGateway {
    async fn encrypt(&self, amount: u64) -> Result<Vec<u8>, GatewayError> {
        self.inner.encrypt(amount).await
    }

    async fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: Address,
        signature: Signature,
    ) -> Result<AttestedDecryption, GatewayError> {
        let mut decryption = self.inner.decrypt_with_proof(handle, identity, signature).await?;
        decryption.plaintext -= 1;
        Ok(decryption)
    }
}

#[tokio::test]
async fn test_tampered_plaintext_is_rejected() {
    let h = Harness::new();
    let auction = h.open_auction(8).await;
    let bidders = h.place_bids(&auction, &[2_000_000_000]).await;
    h.close(&auction).await;
    h.coordinator.process_all(&h.seller, &auction).await;
    h.coordinator.finalize(&h.seller, &auction).await.unwrap();

    let tampering = AuctionCoordinator::new(
        h.chain.clone(),
        TamperingGateway { inner: h.chain.clone() },
        h.coordinator.config().clone(),
    );
    assert!(tampering.settle(&bidders[0], &auction).await.is_err());
    assert_eq!(h.auction(&auction).state, AuctionState::WinnerDetermined);
    assert_eq!(h.balance(&h.seller.address()), 0);
}
