//! The same lifecycle driven over JSON-RPC against the mock chain server.

use std::sync::Arc;

use jsonrpsee::server::ServerHandle;
use parking_lot::RwLock;

use sealbid_client::RpcChain;
use sealbid_confidential::{decrypt_challenge, ConfidentialError};
use sealbid_coordinator::{
    AuctionCoordinator, CoordinatorConfig, EncryptionGateway, GatewayError, Keypair, Ledger, LedgerError, NewAuction,
};
use sealbid_mock_chain::spawn;
use sealbid_program::{GenesisConfig, Instruction, ProgramError, ProgramRuntime, SignedTransaction};
use sealbid_types::AuctionState;

use crate::harness::{DURATION, FUNDS, RESERVE};

async fn start() -> (RpcChain, ServerHandle) {
    let runtime = ProgramRuntime::from_genesis(GenesisConfig::default()).unwrap();
    let (addr, handle) = spawn("127.0.0.1:0".parse().unwrap(), Arc::new(RwLock::new(runtime)))
        .await
        .unwrap();
    let chain = RpcChain::connect(&format!("http://{}", addr)).unwrap();
    (chain, handle)
}

fn lot(auction_id: u64) -> NewAuction {
    NewAuction {
        auction_id,
        title: "Remote lot".into(),
        description: String::new(),
        reserve_price: RESERVE,
        duration: DURATION,
        item_ref: None,
    }
}

#[tokio::test]
async fn test_lifecycle_over_rpc() {
    let (chain, _server) = start().await;
    let coordinator = AuctionCoordinator::new(chain.clone(), chain.clone(), CoordinatorConfig::default());

    let seller = Keypair::generate();
    let low = Keypair::generate();
    let high = Keypair::generate();
    for bidder in [&low, &high] {
        assert_eq!(chain.airdrop(&bidder.address(), FUNDS).await.unwrap(), FUNDS);
    }

    let auction = coordinator.create_auction(&seller, lot(1)).await.unwrap().address;
    coordinator.place_bid(&low, &auction, 1_250_000_000).await.unwrap();
    coordinator.place_bid(&high, &auction, 1_750_000_000).await.unwrap();

    let listed = coordinator.list(None, Some(AuctionState::Open)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].auction.bid_count, 2);

    chain.advance_time(DURATION).await.unwrap();
    let closed = coordinator.close_bidding(&seller, &auction).await.unwrap();
    assert_eq!(closed.state(), AuctionState::Closed);

    let report = coordinator.process_all(&seller, &auction).await;
    assert!(report.is_complete(), "batch stopped: {:?}", report.error);

    let finalized = coordinator.finalize(&low, &auction).await.unwrap();
    assert_eq!(finalized.auction.winner, high.address());

    let settlement = coordinator.settle(&high, &auction).await.unwrap();
    assert_eq!(settlement.revealed, 1_750_000_000);
    assert_eq!(settlement.snapshot.state(), AuctionState::Settled);

    assert_eq!(coordinator.balance(&seller.address()).await.unwrap(), 1_750_000_000);
    assert_eq!(coordinator.balance(&high.address()).await.unwrap(), FUNDS - 1_750_000_000);
}

#[tokio::test]
async fn test_program_rejection_survives_transport() {
    let (chain, _server) = start().await;
    let coordinator = AuctionCoordinator::new(chain.clone(), chain.clone(), CoordinatorConfig::default());
    let seller = Keypair::generate();
    let auction = coordinator.create_auction(&seller, lot(2)).await.unwrap().address;

    let instruction = Instruction::CloseBidding { auction };
    let tx = SignedTransaction {
        sender: seller.address(),
        signature: seller.sign_now(&SignedTransaction::signing_message(&instruction).unwrap()),
        instruction,
    };
    let err = chain.submit(tx).await.unwrap_err();
    assert_eq!(err, LedgerError::Rejected(ProgramError::BiddingNotEnded));
}

#[tokio::test]
async fn test_decrypt_requires_permission_over_rpc() {
    let (chain, _server) = start().await;
    let coordinator = AuctionCoordinator::new(chain.clone(), chain.clone(), CoordinatorConfig::default());
    let seller = Keypair::generate();
    let bidder = Keypair::generate();
    chain.airdrop(&bidder.address(), FUNDS).await.unwrap();

    let auction = coordinator.create_auction(&seller, lot(3)).await.unwrap().address;
    coordinator.place_bid(&bidder, &auction, RESERVE).await.unwrap();
    chain.advance_time(DURATION).await.unwrap();
    coordinator.close_bidding(&seller, &auction).await.unwrap();
    coordinator.process_all(&seller, &auction).await;
    let finalized = coordinator.finalize(&seller, &auction).await.unwrap();
    let handle = finalized.auction.highest_bid_handle;

    let outsider = Keypair::generate();
    let signature = outsider.sign_now(&decrypt_challenge(handle));
    let err = chain
        .decrypt_with_proof(handle, outsider.address(), signature)
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::Service(ConfidentialError::NotAllowed { .. })));

    let signature = bidder.sign_now(&decrypt_challenge(handle));
    let reveal = chain.decrypt_with_proof(handle, bidder.address(), signature).await.unwrap();
    assert_eq!(reveal.handle, handle);
    assert_eq!(reveal.plaintext, RESERVE as u128);
}
