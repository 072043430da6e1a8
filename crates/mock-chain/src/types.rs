//! RPC-compatible types for the mock chain.
//!
//! Addresses, handles and signatures travel as hex strings. Handles are
//! 128-bit and do not survive a round trip through a JSON number.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealbid_confidential::{AttestedDecryption, ConfidentialError};
use sealbid_program::{AuctionEntry, BidEntry, ProgramError};
use sealbid_types::wire::{address_from_hex, u128_from_hex, u128_to_hex, WireError};
use sealbid_types::{Attestation, Auction, AuctionState, Bid, Handle, Signature};

/// JSON-RPC error code for a transaction the program rejected.
pub const PROGRAM_REJECTED: i32 = -32000;

/// JSON-RPC error code for a confidential service failure.
pub const CONFIDENTIAL_FAILURE: i32 = -32001;

/// JSON-RPC error code for malformed parameters.
pub const INVALID_PARAMS: i32 = -32602;

/// Errors converting between RPC payloads and records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DtoError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("unknown auction state: {0}")]
    UnknownState(String),

    #[error("signature must be 64 bytes, got {0}")]
    BadSignature(usize),
}

/// Structured payload carried in the `data` field of an RPC error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "error", rename_all = "snake_case")]
pub enum RpcErrorData {
    Program(ProgramError),
    Confidential(ConfidentialError),
    Request(String),
}

/// Ledger clock and service identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub timestamp: i64,
    pub program_id: String,
    pub confidential_program_id: String,
    pub attestor: String,
}

/// Auction record for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionRpc {
    pub address: String,
    pub seller: String,
    pub item_ref: Option<String>,
    pub title: String,
    pub description: String,
    pub reserve_price: u64,
    pub start_time: i64,
    pub end_time: i64,
    pub state: String,
    pub bid_count: u32,
    pub bids_processed: u32,
    pub highest_bid_handle: String,
    pub current_leader: String,
    pub winner: String,
    pub winning_amount: u64,
    pub auction_id: u64,
}

impl From<&AuctionEntry> for AuctionRpc {
    fn from(entry: &AuctionEntry) -> Self {
        let a = &entry.auction;
        Self {
            address: hex::encode(entry.address),
            seller: hex::encode(a.seller),
            item_ref: a.item_ref.map(hex::encode),
            title: a.title.clone(),
            description: a.description.clone(),
            reserve_price: a.reserve_price,
            start_time: a.start_time,
            end_time: a.end_time,
            state: a.state.as_str().to_string(),
            bid_count: a.bid_count,
            bids_processed: a.bids_processed,
            highest_bid_handle: u128_to_hex(a.highest_bid_handle.0),
            current_leader: hex::encode(a.current_leader),
            winner: hex::encode(a.winner),
            winning_amount: a.winning_amount,
            auction_id: a.auction_id,
        }
    }
}

impl TryFrom<AuctionRpc> for AuctionEntry {
    type Error = DtoError;

    fn try_from(rpc: AuctionRpc) -> Result<Self, DtoError> {
        let state = AuctionState::parse(&rpc.state).ok_or_else(|| DtoError::UnknownState(rpc.state.clone()))?;
        let item_ref = rpc.item_ref.as_deref().map(address_from_hex).transpose()?;

        Ok(AuctionEntry {
            address: address_from_hex(&rpc.address)?,
            auction: Auction {
                seller: address_from_hex(&rpc.seller)?,
                item_ref,
                title: rpc.title,
                description: rpc.description,
                reserve_price: rpc.reserve_price,
                start_time: rpc.start_time,
                end_time: rpc.end_time,
                state,
                bid_count: rpc.bid_count,
                bids_processed: rpc.bids_processed,
                highest_bid_handle: Handle(u128_from_hex(&rpc.highest_bid_handle)?),
                current_leader: address_from_hex(&rpc.current_leader)?,
                winner: address_from_hex(&rpc.winner)?,
                winning_amount: rpc.winning_amount,
                auction_id: rpc.auction_id,
            },
        })
    }
}

/// Bid record for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRpc {
    pub address: String,
    pub auction: String,
    pub bidder: String,
    pub encrypted_amount: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub processed: bool,
}

impl From<&BidEntry> for BidRpc {
    fn from(entry: &BidEntry) -> Self {
        let b = &entry.bid;
        Self {
            address: hex::encode(entry.address),
            auction: hex::encode(b.auction),
            bidder: hex::encode(b.bidder),
            encrypted_amount: u128_to_hex(b.encrypted_amount.0),
            created_at: b.created_at,
            updated_at: b.updated_at,
            processed: b.processed,
        }
    }
}

impl TryFrom<BidRpc> for BidEntry {
    type Error = DtoError;

    fn try_from(rpc: BidRpc) -> Result<Self, DtoError> {
        Ok(BidEntry {
            address: address_from_hex(&rpc.address)?,
            bid: Bid {
                auction: address_from_hex(&rpc.auction)?,
                bidder: address_from_hex(&rpc.bidder)?,
                encrypted_amount: Handle(u128_from_hex(&rpc.encrypted_amount)?),
                created_at: rpc.created_at,
                updated_at: rpc.updated_at,
                processed: rpc.processed,
            },
        })
    }
}

/// Attested decryption for RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestedDecryptionRpc {
    pub handle: String,
    /// Fixed-width hex encoding of the plaintext
    pub plaintext: String,
    pub attestor: String,
    pub signature: String,
}

impl From<&AttestedDecryption> for AttestedDecryptionRpc {
    fn from(d: &AttestedDecryption) -> Self {
        Self {
            handle: u128_to_hex(d.handle.0),
            plaintext: u128_to_hex(d.plaintext),
            attestor: hex::encode(d.attestation.attestor),
            signature: hex::encode(d.attestation.signature),
        }
    }
}

impl TryFrom<AttestedDecryptionRpc> for AttestedDecryption {
    type Error = DtoError;

    fn try_from(rpc: AttestedDecryptionRpc) -> Result<Self, DtoError> {
        Ok(AttestedDecryption {
            handle: Handle(u128_from_hex(&rpc.handle)?),
            plaintext: u128_from_hex(&rpc.plaintext)?,
            attestation: Attestation {
                attestor: address_from_hex(&rpc.attestor)?,
                signature: signature_from_hex(&rpc.signature)?,
            },
        })
    }
}

/// Parse a 64-byte signature from hex.
pub fn signature_from_hex(s: &str) -> Result<Signature, DtoError> {
    let bytes = hex::decode(s.trim_start_matches("0x")).map_err(|e| WireError::BadHex(e.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| DtoError::BadSignature(len))
}
