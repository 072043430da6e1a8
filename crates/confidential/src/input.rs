//! Client-side encryption of bid amounts.
//!
//! Amounts are encrypted to the service's input key before they reach the
//! ledger:
//! 1. Widen the amount to a 128-bit value and encode it as 16 LE bytes
//! 2. Sample a random 96-bit nonce
//! 3. Encrypt with AES-256-GCM
//!
//! The ciphertext layout is `nonce(12) || ciphertext(16) || tag(16)`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use sealbid_types::wire::{decode_u128, encode_u128, WIDE_LEN};

use crate::error::ConfidentialError;

/// AEAD nonce length.
pub const NONCE_LEN: usize = 12;

/// AEAD tag length.
pub const TAG_LEN: usize = 16;

/// Total ciphertext length for one encrypted amount.
pub const CIPHERTEXT_LEN: usize = NONCE_LEN + WIDE_LEN + TAG_LEN;

/// Symmetric key that encrypted inputs are sealed to.
///
/// Stands in for the network encryption key of a production service.
#[derive(Clone, PartialEq, Eq)]
pub struct InputKey(pub [u8; 32]);

impl std::fmt::Debug for InputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("InputKey(..)")
    }
}

impl InputKey {
    /// Derive an input key from seed material.
    pub fn derive(seed: &[u8]) -> Result<Self, ConfidentialError> {
        let hk = Hkdf::<Sha256>::new(None, seed);
        let mut key = [0u8; 32];
        hk.expand(b"SEALBID-INPUT-KEY", &mut key)
            .map_err(|_| ConfidentialError::KeyDerivationFailed)?;
        Ok(Self(key))
    }

    fn cipher(&self) -> Result<Aes256Gcm, ConfidentialError> {
        Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| ConfidentialError::EncryptionFailed(format!("Failed to create cipher: {}", e)))
    }
}

/// Encrypt a bid amount to the input key.
pub fn encrypt_amount<R: RngCore + CryptoRng>(
    key: &InputKey,
    amount: u64,
    rng: &mut R,
) -> Result<Vec<u8>, ConfidentialError> {
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce_bytes);

    let plaintext = encode_u128(amount as u128);
    let sealed = key
        .cipher()?
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_ref())
        .map_err(|e| ConfidentialError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e)))?;

    let mut out = Vec::with_capacity(CIPHERTEXT_LEN);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Open a ciphertext produced by [`encrypt_amount`].
pub fn decrypt_amount(key: &InputKey, ciphertext: &[u8]) -> Result<u128, ConfidentialError> {
    if ciphertext.len() != CIPHERTEXT_LEN {
        return Err(ConfidentialError::InvalidCiphertextFormat);
    }

    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    let plaintext = key
        .cipher()?
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| ConfidentialError::AuthenticationFailed)?;

    decode_u128(&plaintext).map_err(|_| ConfidentialError::InvalidCiphertextFormat)
}
