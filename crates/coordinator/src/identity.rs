//! Signing identities.
//!
//! Every coordinator operation takes the identity it acts as explicitly.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use thiserror::Error;

use sealbid_types::{Address, Signature};

/// Errors produced by a signing identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("signing request rejected: {0}")]
    Rejected(String),

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// Something that can sign on behalf of an address.
#[async_trait]
pub trait SigningIdentity: Send + Sync {
    fn address(&self) -> Address;

    async fn sign(&self, message: &[u8]) -> Result<Signature, IdentityError>;
}

/// An in-memory ed25519 keypair.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &hex::encode(self.address()))
            .finish_non_exhaustive()
    }
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret(secret: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&secret),
        }
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn address(&self) -> Address {
        self.signing.verifying_key().to_bytes()
    }

    pub fn sign_now(&self, message: &[u8]) -> Signature {
        self.signing.sign(message).to_bytes()
    }
}

#[async_trait]
impl SigningIdentity for Keypair {
    fn address(&self) -> Address {
        Keypair::address(self)
    }

    async fn sign(&self, message: &[u8]) -> Result<Signature, IdentityError> {
        Ok(self.sign_now(message))
    }
}
