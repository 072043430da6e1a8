//! Encryption service access.

use async_trait::async_trait;
use thiserror::Error;

use sealbid_confidential::{AttestedDecryption, ConfidentialError};
use sealbid_types::{Address, Handle, Signature};

/// Errors returned by an encryption gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("encryption service error: {0}")]
    Service(ConfidentialError),

    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<ConfidentialError> for GatewayError {
    fn from(err: ConfidentialError) -> Self {
        GatewayError::Service(err)
    }
}

/// Facade over the encryption service.
#[async_trait]
pub trait EncryptionGateway: Send + Sync {
    /// Encrypt an amount into an opaque input the ledger can ingest.
    async fn encrypt(&self, amount: u64) -> Result<Vec<u8>, GatewayError>;

    /// Decrypt `handle` for `identity`, which signed the decrypt challenge
    /// for that handle.
    async fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: Address,
        signature: Signature,
    ) -> Result<AttestedDecryption, GatewayError>;
}
