//! Confidential-compute primitives for sealed-bid auctions.
//!
//! Bid amounts never appear in the clear on the ledger. Bidders encrypt an
//! amount to the service's input key, the ledger registers the ciphertext and
//! receives an opaque [`Handle`](sealbid_types::Handle). From then on the
//! ledger only manipulates handles:
//!
//! 1. **Compare**: `gt(a, b)` yields an encrypted boolean
//! 2. **Select**: `select(cond, a, b)` picks one of two handles without
//!    revealing which
//! 3. **Allow**: grant an identity the right to decrypt a handle
//! 4. **Decrypt**: an allowed identity signs a challenge and receives the
//!    plaintext with an attestation the ledger can verify

pub mod attestation;
pub mod error;
pub mod input;
pub mod service;

pub use attestation::{attestation_message, decrypt_challenge, verify_attestation, verify_signature};
pub use error::ConfidentialError;
pub use input::{decrypt_amount, encrypt_amount, InputKey};
pub use service::{AttestedDecryption, ConfidentialService, EncryptedBool};
