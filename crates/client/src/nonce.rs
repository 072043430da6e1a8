//! Default auction nonces.

use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock nanoseconds since the unix epoch, used as the auction id when
/// none is given.
///
/// The ledger clock is not used: on the mock chain it only moves through the
/// admin API, so two auctions created by one seller would share an address.
/// A clock before the epoch yields 0.
pub fn auction_nonce() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
