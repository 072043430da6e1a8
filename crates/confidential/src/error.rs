//! Error types for confidential-compute operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur in the confidential service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConfidentialError {
    #[error("Invalid ciphertext format")]
    InvalidCiphertextFormat,

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed")]
    KeyDerivationFailed,

    #[error("Unknown handle {0}")]
    UnknownHandle(String),

    #[error("Unknown encrypted boolean {0}")]
    UnknownBoolean(String),

    #[error("Identity {identity} is not allowed to decrypt handle {handle}")]
    NotAllowed { handle: String, identity: String },

    #[error("Invalid identity key")]
    InvalidIdentity,

    #[error("Signature verification failed")]
    InvalidSignature,

    #[error("Attestation verification failed")]
    AttestationVerificationFailed,
}
