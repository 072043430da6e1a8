//! Client SDK for sealed-bid auctions.
//!
//! This crate provides:
//! - A JSON-RPC [`RpcChain`] implementing the coordinator's ledger and
//!   encryption gateway seams against the mock chain
//! - Keypair file handling for signing identities
//! - Default auction nonces
//!
//! The `sealbid` binary drives the auction lifecycle from the command line.

pub mod keys;
pub mod nonce;
pub mod rpc;

pub use keys::{load_keypair, save_keypair, KeyFile};
pub use nonce::auction_nonce;
pub use rpc::RpcChain;
