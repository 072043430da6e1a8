//! Mock chain for local testing of sealed-bid auctions.
//!
//! Hosts the auction program and the reference confidential service behind a
//! JSON-RPC server with a controllable clock, so the CLI and coordinator can
//! run end to end without a real ledger.

pub mod server;
pub mod types;

pub use server::{spawn, MockChainApiClient, MockChainApiServer, MockChainServer};
pub use types::{
    AttestedDecryptionRpc, AuctionRpc, BidRpc, ChainInfo, DtoError, RpcErrorData, CONFIDENTIAL_FAILURE,
    INVALID_PARAMS, PROGRAM_REJECTED,
};
