//! End-to-end integration tests for the sealed-bid auction system.
//!
//! These tests exercise the full auction lifecycle against an in-process
//! chain and over JSON-RPC:
//! 1. Auction creation and sealed bidding
//! 2. Closing, including the zero-bid path
//! 3. Sequential winner determination, interrupted and concurrent
//! 4. Finalization with stale-leader recovery
//! 5. Attested settlement and payment

pub mod harness;

#[cfg(test)]
mod lifecycle;
#[cfg(test)]
mod remote;
#[cfg(test)]
mod resilience;

pub use harness::{FlakyLedger, Harness, LaggingLedger, StalledGateway, DURATION, FUNDS, RESERVE};
