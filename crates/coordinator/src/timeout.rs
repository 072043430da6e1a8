//! Bounded suspension points.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoordinatorError;
use crate::state_machine::Action;

/// A suspension point in a coordinator operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Signing identity producing a signature
    Signature,
    /// Ledger accepting a transaction
    Submission,
    /// Ledger read
    Fetch,
    /// Encryption service encrypting an amount
    Encrypt,
    /// Encryption service producing an attested decryption
    Decrypt,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Signature => "signature request",
            Stage::Submission => "ledger submission",
            Stage::Fetch => "ledger read",
            Stage::Encrypt => "encrypt request",
            Stage::Decrypt => "decrypt request",
        })
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run `fut`, failing with [`CoordinatorError::Timeout`] if it does not
/// complete within `after`.
pub async fn bounded<F, T>(action: Action, stage: Stage, after: Duration, fut: F) -> Result<T, CoordinatorError>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(output) => Ok(output),
        Err(_) => {
            warn!(action = %action, stage = %stage, after_ms = millis(after), "Suspension point timed out");
            Err(CoordinatorError::Timeout { action, stage, after })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u64::MAX);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_bounded_completes() {
        let value = bounded(Action::Refresh, Stage::Fetch, Duration::from_secs(1), async { 7 })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result = bounded(
            Action::SettleAuction,
            Stage::Decrypt,
            Duration::from_millis(10),
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await;

        match result {
            Err(CoordinatorError::Timeout { action, stage, .. }) => {
                assert_eq!(action, Action::SettleAuction);
                assert_eq!(stage, Stage::Decrypt);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
