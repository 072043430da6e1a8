//! JSON-RPC ledger and encryption gateway backed by the mock chain.

use async_trait::async_trait;
use jsonrpsee::core::client::Error as ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};

use sealbid_confidential::{AttestedDecryption, ConfidentialError};
use sealbid_coordinator::{EncryptionGateway, GatewayError, Ledger, LedgerError};
use sealbid_mock_chain::{ChainInfo, DtoError, MockChainApiClient, RpcErrorData};
use sealbid_program::{AuctionEntry, BidEntry, ProgramError, ProgramEvent, Receipt, SignedTransaction};
use sealbid_types::wire::u128_to_hex;
use sealbid_types::{Address, Auction, AuctionState, Bid, Handle, Signature};

/// Remote chain reached over HTTP JSON-RPC.
#[derive(Clone, Debug)]
pub struct RpcChain {
    client: HttpClient,
}

/// What an RPC error turned out to be.
#[derive(Debug, PartialEq)]
enum Failure {
    Program(ProgramError),
    Confidential(ConfidentialError),
    Transport(String),
}

fn classify(err: ClientError) -> Failure {
    if let ClientError::Call(obj) = &err {
        let data = obj
            .data()
            .and_then(|raw| serde_json::from_str::<RpcErrorData>(raw.get()).ok());
        match data {
            Some(RpcErrorData::Program(e)) => return Failure::Program(e),
            Some(RpcErrorData::Confidential(e)) => return Failure::Confidential(e),
            Some(RpcErrorData::Request(msg)) => return Failure::Transport(format!("request rejected: {}", msg)),
            None => {}
        }
    }
    Failure::Transport(err.to_string())
}

fn ledger_error(err: ClientError) -> LedgerError {
    match classify(err) {
        Failure::Program(e) => LedgerError::Rejected(e),
        Failure::Confidential(e) => LedgerError::Rejected(ProgramError::Confidential(e)),
        Failure::Transport(msg) => LedgerError::Transport(msg),
    }
}

fn gateway_error(err: ClientError) -> GatewayError {
    match classify(err) {
        Failure::Confidential(e) => GatewayError::Service(e),
        Failure::Program(e) => GatewayError::Transport(e.to_string()),
        Failure::Transport(msg) => GatewayError::Transport(msg),
    }
}

fn malformed(err: DtoError) -> LedgerError {
    LedgerError::Transport(format!("malformed response: {}", err))
}

impl RpcChain {
    pub fn connect(url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            client: HttpClientBuilder::default().build(url)?,
        })
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub async fn info(&self) -> Result<ChainInfo, LedgerError> {
        self.client.chain_info().await.map_err(ledger_error)
    }

    pub async fn set_time(&self, timestamp: i64) -> Result<i64, LedgerError> {
        self.client.admin_set_timestamp(timestamp).await.map_err(ledger_error)
    }

    pub async fn advance_time(&self, seconds: i64) -> Result<i64, LedgerError> {
        self.client.admin_advance_time(seconds).await.map_err(ledger_error)
    }

    /// Credit `address`. Returns the new balance.
    pub async fn airdrop(&self, address: &Address, amount: u64) -> Result<u64, LedgerError> {
        self.client
            .admin_airdrop(hex::encode(address), amount)
            .await
            .map_err(ledger_error)
    }

    async fn bids(&self, auction: &Address, unprocessed_only: bool) -> Result<Vec<BidEntry>, LedgerError> {
        let auction = hex::encode(auction);
        let bids = if unprocessed_only {
            self.client.query_unprocessed_bids(auction).await
        } else {
            self.client.query_bids(auction).await
        }
        .map_err(ledger_error)?;

        bids.into_iter()
            .map(|b| BidEntry::try_from(b).map_err(malformed))
            .collect()
    }
}

#[async_trait]
impl Ledger for RpcChain {
    async fn now(&self) -> Result<i64, LedgerError> {
        self.client.chain_now().await.map_err(ledger_error)
    }

    async fn fetch_auction(&self, auction: &Address) -> Result<Option<Auction>, LedgerError> {
        let entry = self
            .client
            .query_auction(hex::encode(auction))
            .await
            .map_err(ledger_error)?;
        entry
            .map(|rpc| AuctionEntry::try_from(rpc).map(|e| e.auction).map_err(malformed))
            .transpose()
    }

    async fn list_auctions(
        &self,
        seller: Option<Address>,
        state: Option<AuctionState>,
    ) -> Result<Vec<AuctionEntry>, LedgerError> {
        let entries = self
            .client
            .query_list_auctions(seller.map(hex::encode), state.map(|s| s.as_str().to_string()))
            .await
            .map_err(ledger_error)?;
        entries
            .into_iter()
            .map(|rpc| AuctionEntry::try_from(rpc).map_err(malformed))
            .collect()
    }

    async fn fetch_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.bids(auction, false).await
    }

    async fn fetch_unprocessed_bids(&self, auction: &Address) -> Result<Vec<BidEntry>, LedgerError> {
        self.bids(auction, true).await
    }

    async fn fetch_bid(&self, bid: &Address) -> Result<Option<Bid>, LedgerError> {
        let entry = self.client.query_bid(hex::encode(bid)).await.map_err(ledger_error)?;
        entry
            .map(|rpc| BidEntry::try_from(rpc).map(|e| e.bid).map_err(malformed))
            .transpose()
    }

    async fn balance(&self, address: &Address) -> Result<u64, LedgerError> {
        self.client.query_balance(hex::encode(address)).await.map_err(ledger_error)
    }

    async fn events(&self, auction: &Address) -> Result<Vec<ProgramEvent>, LedgerError> {
        self.client.query_events(hex::encode(auction)).await.map_err(ledger_error)
    }

    async fn submit(&self, tx: SignedTransaction) -> Result<Receipt, LedgerError> {
        let bytes = tx
            .to_bytes()
            .map_err(|e| LedgerError::Transport(format!("transaction encoding failed: {}", e)))?;
        self.client
            .program_submit(hex::encode(bytes))
            .await
            .map_err(ledger_error)
    }
}

#[async_trait]
impl EncryptionGateway for RpcChain {
    async fn encrypt(&self, amount: u64) -> Result<Vec<u8>, GatewayError> {
        let ciphertext = self.client.confidential_encrypt(amount).await.map_err(gateway_error)?;
        hex::decode(&ciphertext).map_err(|e| GatewayError::Transport(format!("malformed ciphertext: {}", e)))
    }

    async fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: Address,
        signature: Signature,
    ) -> Result<AttestedDecryption, GatewayError> {
        let rpc = self
            .client
            .confidential_decrypt_with_proof(u128_to_hex(handle.0), hex::encode(identity), hex::encode(signature))
            .await
            .map_err(gateway_error)?;
        AttestedDecryption::try_from(rpc).map_err(|e| GatewayError::Transport(format!("malformed response: {}", e)))
    }
}
