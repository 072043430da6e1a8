//! Reference confidential-compute service.
//!
//! Holds the plaintexts behind every handle it has minted, evaluates
//! comparisons and selections over handles, records decrypt allowances and
//! produces attested decryptions for allowed identities.
//!
//! Nothing outside this module ever sees a plaintext except through
//! [`ConfidentialService::decrypt_with_proof`].

use std::collections::{HashMap, HashSet};

use ed25519_dalek::{Signer, SigningKey};
use hkdf::Hkdf;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use sealbid_types::wire::{encode_u128, WIDE_LEN};
use sealbid_types::{short_address, Address, Attestation, Handle, Signature};

use crate::attestation::{attestation_message, decrypt_challenge, verify_signature};
use crate::error::ConfidentialError;
use crate::input::{decrypt_amount, encrypt_amount, InputKey};

/// Opaque reference to an encrypted boolean produced by a comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncryptedBool(pub u128);

/// Result of an attested decryption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestedDecryption {
    pub handle: Handle,
    pub plaintext: u128,
    pub attestation: Attestation,
}

impl AttestedDecryption {
    /// Handle and plaintext in their 16-byte wire form.
    pub fn encoded(&self) -> ([u8; WIDE_LEN], [u8; WIDE_LEN]) {
        (encode_u128(self.handle.0), encode_u128(self.plaintext))
    }
}

/// In-process confidential-compute service.
pub struct ConfidentialService {
    input_key: InputKey,
    attestor: SigningKey,
    values: HashMap<Handle, u128>,
    booleans: HashMap<EncryptedBool, bool>,
    allowances: HashSet<(Handle, Address)>,
    rng: StdRng,
}

impl ConfidentialService {
    /// Build a service whose keys are derived from `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Result<Self, ConfidentialError> {
        let input_key = InputKey::derive(&seed)?;

        let hk = Hkdf::<Sha256>::new(Some(&b"SEALBID-ATTESTOR"[..]), &seed);
        let mut attestor_secret = [0u8; 32];
        hk.expand(b"ed25519", &mut attestor_secret)
            .map_err(|_| ConfidentialError::KeyDerivationFailed)?;

        Ok(Self {
            input_key,
            attestor: SigningKey::from_bytes(&attestor_secret),
            values: HashMap::new(),
            booleans: HashMap::new(),
            allowances: HashSet::new(),
            rng: StdRng::from_seed(seed),
        })
    }

    pub fn input_key(&self) -> &InputKey {
        &self.input_key
    }

    /// Identity whose signatures the ledger accepts on decryptions.
    pub fn attestor(&self) -> Address {
        self.attestor.verifying_key().to_bytes()
    }

    /// Number of handles minted so far.
    pub fn handle_count(&self) -> usize {
        self.values.len()
    }

    /// Encrypt an amount to this service's input key.
    pub fn encrypt(&mut self, amount: u64) -> Result<Vec<u8>, ConfidentialError> {
        encrypt_amount(&self.input_key, amount, &mut self.rng)
    }

    /// Register an encrypted input and mint a fresh handle for it.
    ///
    /// The owner is allowed to decrypt the new handle.
    pub fn new_handle(&mut self, ciphertext: &[u8], owner: &Address) -> Result<Handle, ConfidentialError> {
        let value = decrypt_amount(&self.input_key, ciphertext)?;
        let handle = self.mint(value);
        self.allowances.insert((handle, *owner));

        debug!(handle = %handle, owner = %short_address(owner), "Minted handle");
        Ok(handle)
    }

    /// Encrypted `a > b`.
    pub fn gt(&mut self, a: Handle, b: Handle) -> Result<EncryptedBool, ConfidentialError> {
        let result = self.value(a)? > self.value(b)?;

        let id = loop {
            let candidate = EncryptedBool(self.random_id());
            if !self.booleans.contains_key(&candidate) {
                break candidate;
            }
        };
        self.booleans.insert(id, result);
        Ok(id)
    }

    /// Returns `if_true` when `cond` holds, else `if_false`.
    ///
    /// The chosen operand's own handle is returned, so allowances granted on
    /// it carry over. `cond` is consumed.
    pub fn select(
        &mut self,
        cond: EncryptedBool,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, ConfidentialError> {
        self.value(if_true)?;
        self.value(if_false)?;
        let chosen = self
            .booleans
            .remove(&cond)
            .ok_or_else(|| ConfidentialError::UnknownBoolean(cond.0.to_string()))?;
        Ok(if chosen { if_true } else { if_false })
    }

    /// Grant `identity` the right to decrypt `handle`.
    pub fn allow(&mut self, handle: Handle, identity: &Address) -> Result<(), ConfidentialError> {
        self.value(handle)?;
        self.allowances.insert((handle, *identity));
        debug!(handle = %handle, identity = %short_address(identity), "Granted decrypt allowance");
        Ok(())
    }

    pub fn is_allowed(&self, handle: Handle, identity: &Address) -> bool {
        self.allowances.contains(&(handle, *identity))
    }

    /// Decrypt `handle` for `identity`, who must have signed the decrypt
    /// challenge for this handle and hold an allowance on it.
    pub fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: &Address,
        signature: &Signature,
    ) -> Result<AttestedDecryption, ConfidentialError> {
        verify_signature(identity, &decrypt_challenge(handle), signature)?;

        let plaintext = self.value(handle)?;
        if !self.is_allowed(handle, identity) {
            return Err(ConfidentialError::NotAllowed {
                handle: handle.to_string(),
                identity: hex::encode(identity),
            });
        }

        let message = attestation_message(&encode_u128(handle.0), &encode_u128(plaintext));
        let attestation = Attestation {
            attestor: self.attestor(),
            signature: self.attestor.sign(&message).to_bytes(),
        };

        debug!(handle = %handle, identity = %short_address(identity), "Attested decryption");
        Ok(AttestedDecryption { handle, plaintext, attestation })
    }

    fn value(&self, handle: Handle) -> Result<u128, ConfidentialError> {
        self.values
            .get(&handle)
            .copied()
            .ok_or_else(|| ConfidentialError::UnknownHandle(handle.to_string()))
    }

    fn mint(&mut self, value: u128) -> Handle {
        loop {
            let candidate = Handle(self.random_id());
            if !candidate.is_none() && !self.values.contains_key(&candidate) {
                self.values.insert(candidate, value);
                return candidate;
            }
        }
    }

    fn random_id(&mut self) -> u128 {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        u128::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::verify_attestation;
    use rand::rngs::OsRng;

    fn identity() -> (SigningKey, Address) {
        let key = SigningKey::generate(&mut OsRng);
        let address = key.verifying_key().to_bytes();
        (key, address)
    }

    fn service() -> ConfidentialService {
        ConfidentialService::from_seed([42u8; 32]).unwrap()
    }

    #[test]
    fn test_new_handle_allows_owner() {
        let mut svc = service();
        let (_, alice) = identity();
        let (_, bob) = identity();

        let ct = svc.encrypt(100).unwrap();
        let handle = svc.new_handle(&ct, &alice).unwrap();

        assert!(!handle.is_none());
        assert!(svc.is_allowed(handle, &alice));
        assert!(!svc.is_allowed(handle, &bob));
    }

    #[test]
    fn test_handles_are_unique_for_equal_values() {
        let mut svc = service();
        let (_, alice) = identity();
        let a = svc.encrypt(5).unwrap();
        let b = svc.encrypt(5).unwrap();

        assert_ne!(svc.new_handle(&a, &alice).unwrap(), svc.new_handle(&b, &alice).unwrap());
        assert_eq!(svc.handle_count(), 2);
    }

    #[test]
    fn test_gt_and_select() {
        let mut svc = service();
        let (_, owner) = identity();
        let low_ct = svc.encrypt(10).unwrap();
        let high_ct = svc.encrypt(20).unwrap();
        let low = svc.new_handle(&low_ct, &owner).unwrap();
        let high = svc.new_handle(&high_ct, &owner).unwrap();

        let cond = svc.gt(high, low).unwrap();
        assert_eq!(svc.select(cond, high, low).unwrap(), high);

        let cond = svc.gt(low, high).unwrap();
        assert_eq!(svc.select(cond, low, high).unwrap(), high);

        // Equal values are not greater
        let cond = svc.gt(low, low).unwrap();
        assert_eq!(svc.select(cond, high, low).unwrap(), low);
    }

    #[test]
    fn test_select_consumes_condition() {
        let mut svc = service();
        let (_, owner) = identity();
        let a_ct = svc.encrypt(10).unwrap();
        let b_ct = svc.encrypt(20).unwrap();
        let a = svc.new_handle(&a_ct, &owner).unwrap();
        let b = svc.new_handle(&b_ct, &owner).unwrap();

        for _ in 0..5 {
            let cond = svc.gt(a, b).unwrap();
            assert_eq!(svc.booleans.len(), 1);
            assert_eq!(svc.select(cond, a, b).unwrap(), b);
            assert!(svc.booleans.is_empty());

            assert!(matches!(
                svc.select(cond, a, b),
                Err(ConfidentialError::UnknownBoolean(_))
            ));
        }
    }

    #[test]
    fn test_select_keeps_condition_on_unknown_operand() {
        let mut svc = service();
        let (_, owner) = identity();
        let ct = svc.encrypt(10).unwrap();
        let a = svc.new_handle(&ct, &owner).unwrap();

        let cond = svc.gt(a, a).unwrap();
        assert!(svc.select(cond, a, Handle(7)).is_err());
        assert_eq!(svc.select(cond, a, a).unwrap(), a);
    }

    #[test]
    fn test_unknown_operands_rejected() {
        let mut svc = service();
        assert!(matches!(
            svc.gt(Handle(1), Handle(2)),
            Err(ConfidentialError::UnknownHandle(_))
        ));
        assert!(matches!(
            svc.select(EncryptedBool(3), Handle(1), Handle(2)),
            Err(ConfidentialError::UnknownHandle(_))
        ));
    }

    #[test]
    fn test_decrypt_with_proof() {
        let mut svc = service();
        let (seller_key, seller) = identity();
        let (winner_key, winner) = identity();

        let ct = svc.encrypt(1_500_000_000).unwrap();
        let handle = svc.new_handle(&ct, &seller).unwrap();

        // Not allowed yet
        let sig = winner_key.sign(&decrypt_challenge(handle)).to_bytes();
        assert!(matches!(
            svc.decrypt_with_proof(handle, &winner, &sig),
            Err(ConfidentialError::NotAllowed { .. })
        ));

        svc.allow(handle, &winner).unwrap();
        let result = svc.decrypt_with_proof(handle, &winner, &sig).unwrap();
        assert_eq!(result.plaintext, 1_500_000_000);

        let (handle_bytes, plaintext_bytes) = result.encoded();
        assert!(verify_attestation(&svc.attestor(), &handle_bytes, &plaintext_bytes, &result.attestation).is_ok());

        // Signature from a different key over the same challenge
        let forged = seller_key.sign(&decrypt_challenge(handle)).to_bytes();
        assert_eq!(
            svc.decrypt_with_proof(handle, &winner, &forged),
            Err(ConfidentialError::InvalidSignature)
        );
    }

    #[test]
    fn test_attestor_is_deterministic_per_seed() {
        assert_eq!(service().attestor(), service().attestor());
        assert_ne!(
            service().attestor(),
            ConfidentialService::from_seed([7u8; 32]).unwrap().attestor()
        );
    }
}
