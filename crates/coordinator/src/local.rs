//! In-process ledger and encryption gateway backed by a [`ProgramRuntime`].

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use sealbid_confidential::AttestedDecryption;
use sealbid_program::{
    AuctionEntry, BidEntry, GenesisConfig, GenesisValidationError, ProgramEvent, ProgramQuery, ProgramQueryResponse,
    ProgramRuntime, Receipt, SignedTransaction,
};
use sealbid_types::{Address, Auction, AuctionState, Bid, Handle, Signature};

use crate::gateway::{EncryptionGateway, GatewayError};
use crate::ledger::{Ledger, LedgerError};

/// Shared handle to an in-process program runtime.
#[derive(Clone)]
pub struct LocalChain {
    runtime: Arc<RwLock<ProgramRuntime>>,
}

impl LocalChain {
    pub fn new(runtime: ProgramRuntime) -> Self {
        Self {
            runtime: Arc::new(RwLock::new(runtime)),
        }
    }

    pub fn from_genesis(genesis: GenesisConfig) -> Result<Self, GenesisValidationError> {
        Ok(Self::new(ProgramRuntime::from_genesis(genesis)?))
    }

    pub fn runtime(&self) -> Arc<RwLock<ProgramRuntime>> {
        self.runtime.clone()
    }

    pub fn set_time(&self, timestamp: i64) {
        self.runtime.write().set_time(timestamp);
    }

    pub fn advance_time(&self, seconds: i64) -> i64 {
        self.runtime.write().advance_time(seconds)
    }

    pub fn airdrop(&self, address: Address, amount: u64) -> u64 {
        self.runtime.write().airdrop(address, amount)
    }

    fn query(&self, query: ProgramQuery) -> ProgramQueryResponse {
        self.runtime.read().query(query)
    }
}

fn unexpected(response: ProgramQueryResponse) -> LedgerError {
    LedgerError::Transport(format!("unexpected query response: {:?}", response))
}

#[async_trait]
impl Ledger for LocalChain {
    async fn now(&self) -> Result<i64, LedgerError> {
        Ok(self.runtime.read().now())
    }

    async fn fetch_auction(&self, auction: &Address) -> Result<Option<Auction>, LedgerError> {
        match self.query(ProgramQuery::GetAuction { auction: *auction }) {
            ProgramQueryResponse::Auction(entry) => Ok(entry.map(|e| e.auction)),
            other => Err(unexpected(other)),
        }
    }

    async fn list_auctions(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, LedgerError> {
        match self.query(ProgramQuery::ListAuctions { seller, state }) {
            ProgramQueryResponse::AuctionList(entries) => Ok(entries),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        match self.query(ProgramQuery::GetAuctionBids { auction: *auction }) {
            ProgramQueryResponse::Bids(bids) => Ok(bids),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_unprocessed_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        match self.query(ProgramQuery::GetUnprocessedBids { auction: *auction }) {
            ProgramQueryResponse::Bids(bids) => Ok(bids),
            other => Err(unexpected(other)),
        }
    }

    async fn fetch_bid(&self, bid: &Address) -> Result<Option<Bid>, LedgerError> {
        match self.query(ProgramQuery::GetBid { bid: *bid }) {
            ProgramQueryResponse::Bid(entry) => Ok(entry.map(|e| e.bid)),
            other => Err(unexpected(other)),
        }
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        match self.query(ProgramQuery::GetBalance { address: *address }) {
            ProgramQueryResponse::Balance(balance) => Ok(balance),
            other => Err(unexpected(other)),
        }
    }

    async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, LedgerError> {
        match self.query(ProgramQuery::GetEvents { auction: *auction }) {
            ProgramQueryResponse::Events(events) => Ok(events),
            other => Err(unexpected(other)),
        }
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        self.runtime.write().execute(&tx).map_err(LedgerError::Rejected)
    }
}

#[async_trait]
impl EncryptionGateway for LocalChain {
    async fn encrypt(&self, amount: u64) -> Result<Vec<u8>, GatewayError> {
        Ok(self.runtime.write().encrypt(amount)?)
    }

    async fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: Address,
        signature: Signature,
    ) -> Result<AttestedDecryption, GatewayError> {
        Ok(self.runtime.read().decrypt_with_proof(handle, &identity, &signature)?)
    }
}
