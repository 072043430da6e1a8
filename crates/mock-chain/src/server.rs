//! JSON-RPC surface of the mock chain.

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tracing::info;

use sealbid_confidential::ConfidentialError;
use sealbid_program::queries::{auction_bids, list_auctions};
use sealbid_program::{ProgramError, ProgramEvent, ProgramRuntime, Receipt, SignedTransaction};
use sealbid_types::wire::{address_from_hex, u128_from_hex};
use sealbid_types::{short_address, Address, AuctionState, Handle};

use crate::types::*;

/// RPC API definition for the mock chain.
#[rpc(server, client)]
pub trait MockChainApi {
    // ============ Admin Methods ============

    /// Set the ledger clock (unix seconds).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: i64) -> Result<i64, ErrorObjectOwned>;

    /// Move the ledger clock forward.
    #[method(name = "admin_advanceTime")]
    async fn admin_advance_time(&self, seconds: i64) -> Result<i64, ErrorObjectOwned>;

    /// Credit an account. Returns the new balance.
    #[method(name = "admin_airdrop")]
    async fn admin_airdrop(&self, address: String, amount: u64) -> Result<u64, ErrorObjectOwned>;

    // ============ Chain Methods ============

    #[method(name = "chain_info")]
    async fn chain_info(&self) -> Result<ChainInfo, ErrorObjectOwned>;

    #[method(name = "chain_now")]
    async fn chain_now(&self) -> Result<i64, ErrorObjectOwned>;

    /// Execute a hex-encoded borsh `SignedTransaction`.
    #[method(name = "program_submit")]
    async fn program_submit(&self, tx: String) -> Result<Receipt, ErrorObjectOwned>;

    // ============ Query Methods ============

    #[method(name = "query_auction")]
    async fn query_auction(&self, auction: String) -> Result<Option<AuctionRpc>, ErrorObjectOwned>;

    /// Auctions filtered by seller and state, newest end time first.
    #[method(name = "query_listAuctions")]
    async fn query_list_auctions(
        &self,
        seller: Option<String>,
        state: Option<String>,
    ) -> Result<Vec<AuctionRpc>, ErrorObjectOwned>;

    #[method(name = "query_bids")]
    async fn query_bids(&self, auction: String) -> Result<Vec<BidRpc>, ErrorObjectOwned>;

    #[method(name = "query_unprocessedBids")]
    async fn query_unprocessed_bids(&self, auction: String) -> Result<Vec<BidRpc>, ErrorObjectOwned>;

    #[method(name = "query_bid")]
    async fn query_bid(&self, bid: String) -> Result<Option<BidRpc>, ErrorObjectOwned>;

    #[method(name = "query_balance")]
    async fn query_balance(&self, address: String) -> Result<u64, ErrorObjectOwned>;

    #[method(name = "query_events")]
    async fn query_events(&self, auction: String) -> Result<Vec<ProgramEvent>, ErrorObjectOwned>;

    // ============ Confidential Service Methods ============

    /// Encrypt an amount to the service input key. Returns hex ciphertext.
    #[method(name = "confidential_encrypt")]
    async fn confidential_encrypt(&self, amount: u64) -> Result<String, ErrorObjectOwned>;

    /// Decrypt a handle for an identity that signed the decrypt challenge.
    #[method(name = "confidential_decryptWithProof")]
    async fn confidential_decrypt_with_proof(
        &self,
        handle: String,
        identity: String,
        signature: String,
    ) -> Result<AttestedDecryptionRpc, ErrorObjectOwned>;
}

/// Implementation of the mock chain RPC server.
pub struct MockChainServer {
    runtime: Arc<RwLock<ProgramRuntime>>,
}

impl MockChainServer {
    pub fn new(runtime: Arc<RwLock<ProgramRuntime>>) -> Self {
        Self { runtime }
    }

    fn program_error(err: ProgramError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(PROGRAM_REJECTED, err.to_string(), Some(RpcErrorData::Program(err)))
    }

    fn confidential_error(err: ConfidentialError) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(
            CONFIDENTIAL_FAILURE,
            err.to_string(),
            Some(RpcErrorData::Confidential(err)),
        )
    }

    fn bad_params(msg: String) -> ErrorObjectOwned {
        ErrorObjectOwned::owned(INVALID_PARAMS, msg.clone(), Some(RpcErrorData::Request(msg)))
    }

    fn address(s: &str) -> Result<Address, ErrorObjectOwned> {
        address_from_hex(s).map_err(|e| Self::bad_params(format!("Invalid address {}: {}", s, e)))
    }
}

#[async_trait]
impl MockChainApiServer for MockChainServer {
    async fn admin_set_timestamp(&self, timestamp: i64) -> Result<i64, ErrorObjectOwned> {
        self.runtime.write().set_time(timestamp);
        info!("Timestamp set to {}", timestamp);
        Ok(timestamp)
    }

    async fn admin_advance_time(&self, seconds: i64) -> Result<i64, ErrorObjectOwned> {
        if seconds < 0 {
            return Err(Self::bad_params(format!("Cannot move the clock back by {}s", -seconds)));
        }
        let now = self.runtime.write().advance_time(seconds);
        info!(seconds, now, "Clock advanced");
        Ok(now)
    }

    async fn admin_airdrop(&self, address: String, amount: u64) -> Result<u64, ErrorObjectOwned> {
        let address = Self::address(&address)?;
        let balance = self.runtime.write().airdrop(address, amount);
        info!(account = %short_address(&address), amount, balance, "Airdrop");
        Ok(balance)
    }

    async fn chain_info(&self) -> Result<ChainInfo, ErrorObjectOwned> {
        let runtime = self.runtime.read();
        Ok(ChainInfo {
            timestamp: runtime.now(),
            program_id: hex::encode(runtime.config().program_id),
            confidential_program_id: hex::encode(runtime.config().confidential_program_id),
            attestor: hex::encode(runtime.confidential().attestor()),
        })
    }

    async fn chain_now(&self) -> Result<i64, ErrorObjectOwned> {
        Ok(self.runtime.read().now())
    }

    async fn program_submit(&self, tx: String) -> Result<Receipt, ErrorObjectOwned> {
        let bytes = hex::decode(tx.trim_start_matches("0x"))
            .map_err(|e| Self::bad_params(format!("Invalid transaction hex: {}", e)))?;
        let tx = SignedTransaction::from_bytes(&bytes)
            .map_err(|e| Self::bad_params(format!("Invalid transaction encoding: {}", e)))?;

        self.runtime.write().execute(&tx).map_err(Self::program_error)
    }

    async fn query_auction(&self, auction: String) -> Result<Option<AuctionRpc>, ErrorObjectOwned> {
        let address = Self::address(&auction)?;
        let runtime = self.runtime.read();
        Ok(runtime.state().get_auction(&address).map(|record| {
            AuctionRpc::from(&sealbid_program::AuctionEntry {
                address,
                auction: record.clone(),
            })
        }))
    }

    async fn query_list_auctions(
        &self,
        seller: Option<String>,
        state: Option<String>,
    ) -> Result<Vec<AuctionRpc>, ErrorObjectOwned> {
        let seller = seller.as_deref().map(Self::address).transpose()?;
        let wanted = match state {
            Some(s) => Some(
                AuctionState::parse(&s).ok_or_else(|| Self::bad_params(format!("Unknown auction state: {}", s)))?,
            ),
            None => None,
        };

        let runtime = self.runtime.read();
        Ok(list_auctions(runtime.state(), seller.as_ref(), wanted)
            .iter()
            .map(AuctionRpc::from)
            .collect())
    }

    async fn query_bids(&self, auction: String) -> Result<Vec<BidRpc>, ErrorObjectOwned> {
        let address = Self::address(&auction)?;
        let runtime = self.runtime.read();
        Ok(auction_bids(runtime.state(), &address, false).iter().map(BidRpc::from).collect())
    }

    async fn query_unprocessed_bids(&self, auction: String) -> Result<Vec<BidRpc>, ErrorObjectOwned> {
        let address = Self::address(&auction)?;
        let runtime = self.runtime.read();
        Ok(auction_bids(runtime.state(), &address, true).iter().map(BidRpc::from).collect())
    }

    async fn query_bid(&self, bid: String) -> Result<Option<BidRpc>, ErrorObjectOwned> {
        let address = Self::address(&bid)?;
        let runtime = self.runtime.read();
        Ok(runtime.state().get_bid(&address).map(|record| {
            BidRpc::from(&sealbid_program::BidEntry {
                address,
                bid: record.clone(),
            })
        }))
    }

    async fn query_balance(&self, address: String) -> Result<u64, ErrorObjectOwned> {
        let address = Self::address(&address)?;
        Ok(self.runtime.read().state().get_balance(&address))
    }

    async fn query_events(&self, auction: String) -> Result<Vec<ProgramEvent>, ErrorObjectOwned> {
        let address = Self::address(&auction)?;
        Ok(self.runtime.read().state().events_for(&address))
    }

    async fn confidential_encrypt(&self, amount: u64) -> Result<String, ErrorObjectOwned> {
        let ciphertext = self
            .runtime
            .write()
            .encrypt(amount)
            .map_err(Self::confidential_error)?;
        Ok(hex::encode(ciphertext))
    }

    async fn confidential_decrypt_with_proof(
        &self,
        handle: String,
        identity: String,
        signature: String,
    ) -> Result<AttestedDecryptionRpc, ErrorObjectOwned> {
        let handle = u128_from_hex(&handle)
            .map(Handle)
            .map_err(|e| Self::bad_params(format!("Invalid handle: {}", e)))?;
        let identity = Self::address(&identity)?;
        let signature = signature_from_hex(&signature).map_err(|e| Self::bad_params(e.to_string()))?;

        let decryption = self
            .runtime
            .read()
            .decrypt_with_proof(handle, &identity, &signature)
            .map_err(Self::confidential_error)?;

        info!(handle = %handle, identity = %short_address(&identity), "Attested decryption issued");
        Ok(AttestedDecryptionRpc::from(&decryption))
    }
}

/// Start serving `runtime` on `addr`. Returns the bound address.
pub async fn spawn(
    addr: SocketAddr,
    runtime: Arc<RwLock<ProgramRuntime>>,
) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let bound = server.local_addr()?;
    let handle = server.start(MockChainServer::new(runtime).into_rpc());
    Ok((bound, handle))
}
