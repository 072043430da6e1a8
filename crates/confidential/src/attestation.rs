//! Signature and attestation messages.
//!
//! Two messages are signed in the decryption flow:
//! - the requester signs a decrypt challenge bound to one handle
//! - the attestor signs `handle_le16 || plaintext_le16`, which the ledger
//!   program verifies before settling

use ed25519_dalek::{Signature as Ed25519Signature, Verifier, VerifyingKey};

use sealbid_types::wire::{encode_u128, WIDE_LEN};
use sealbid_types::{Address, Attestation, Handle, Signature};

use crate::error::ConfidentialError;

const DECRYPT_DOMAIN: &[u8] = b"SEALBID_DECRYPT_REQUEST_V1:";
const ATTESTATION_DOMAIN: &[u8] = b"SEALBID_ATTESTED_DECRYPT_V1:";

/// Message a requester signs to decrypt `handle`.
pub fn decrypt_challenge(handle: Handle) -> Vec<u8> {
    let mut message = Vec::with_capacity(DECRYPT_DOMAIN.len() + WIDE_LEN);
    message.extend_from_slice(DECRYPT_DOMAIN);
    message.extend_from_slice(&encode_u128(handle.0));
    message
}

/// Message the attestor signs over an encoded handle and plaintext.
pub fn attestation_message(handle_bytes: &[u8; WIDE_LEN], plaintext_bytes: &[u8; WIDE_LEN]) -> Vec<u8> {
    let mut message = Vec::with_capacity(ATTESTATION_DOMAIN.len() + 2 * WIDE_LEN);
    message.extend_from_slice(ATTESTATION_DOMAIN);
    message.extend_from_slice(handle_bytes);
    message.extend_from_slice(plaintext_bytes);
    message
}

/// Verify an ed25519 signature made by `identity`.
pub fn verify_signature(
    identity: &Address,
    message: &[u8],
    signature: &Signature,
) -> Result<(), ConfidentialError> {
    let key = VerifyingKey::from_bytes(identity).map_err(|_| ConfidentialError::InvalidIdentity)?;
    key.verify(message, &Ed25519Signature::from_bytes(signature))
        .map_err(|_| ConfidentialError::InvalidSignature)
}

/// Verify that `attestation` binds `plaintext_bytes` to `handle_bytes` and was
/// produced by `expected_attestor`.
pub fn verify_attestation(
    expected_attestor: &Address,
    handle_bytes: &[u8; WIDE_LEN],
    plaintext_bytes: &[u8; WIDE_LEN],
    attestation: &Attestation,
) -> Result<(), ConfidentialError> {
    if &attestation.attestor != expected_attestor {
        return Err(ConfidentialError::AttestationVerificationFailed);
    }

    let message = attestation_message(handle_bytes, plaintext_bytes);
    verify_signature(expected_attestor, &message, &attestation.signature)
        .map_err(|_| ConfidentialError::AttestationVerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    #[test]
    fn test_challenge_binds_handle() {
        assert_ne!(decrypt_challenge(Handle(1)), decrypt_challenge(Handle(2)));
    }

    #[test]
    fn test_verify_signature() {
        let key = SigningKey::generate(&mut OsRng);
        let identity = key.verifying_key().to_bytes();
        let signature = key.sign(b"hello").to_bytes();

        assert!(verify_signature(&identity, b"hello", &signature).is_ok());
        assert_eq!(
            verify_signature(&identity, b"other", &signature),
            Err(ConfidentialError::InvalidSignature)
        );
    }

    #[test]
    fn test_attestation_rejects_other_plaintext() {
        let attestor = SigningKey::generate(&mut OsRng);
        let attestor_id = attestor.verifying_key().to_bytes();
        let handle = encode_u128(9);
        let plaintext = encode_u128(100);

        let attestation = Attestation {
            attestor: attestor_id,
            signature: attestor.sign(&attestation_message(&handle, &plaintext)).to_bytes(),
        };

        assert!(verify_attestation(&attestor_id, &handle, &plaintext, &attestation).is_ok());
        assert_eq!(
            verify_attestation(&attestor_id, &handle, &encode_u128(101), &attestation),
            Err(ConfidentialError::AttestationVerificationFailed)
        );
        assert_eq!(
            verify_attestation(&[7u8; 32], &handle, &plaintext, &attestation),
            Err(ConfidentialError::AttestationVerificationFailed)
        );
    }
}
