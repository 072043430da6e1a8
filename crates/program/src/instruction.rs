//! Instruction and transaction types for the auction program.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use sealbid_confidential::verify_signature;
use sealbid_types::wire::WIDE_LEN;
use sealbid_types::{Address, Attestation, Signature};

use crate::error::ProgramError;

const TRANSACTION_DOMAIN: &[u8] = b"SEALBID_TRANSACTION_V1:";

/// Parameters for creating an auction.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CreateAuctionParams {
    /// Caller-chosen nonce, part of the auction address
    pub auction_id: u64,
    pub title: String,
    pub description: String,
    pub reserve_price: u64,
    /// Bidding period in seconds, starting now
    pub duration: i64,
    pub item_ref: Option<Address>,
}

/// Instructions accepted by the auction program.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum Instruction {
    // === Auction Lifecycle ===
    /// Create a new auction owned by the sender.
    CreateAuction(CreateAuctionParams),

    /// Place or replace the sender's sealed bid.
    PlaceBid { auction: Address, ciphertext: Vec<u8> },

    /// Close bidding once the end time has passed (permissionless).
    CloseBidding { auction: Address },

    /// Compare one unprocessed bid against the running leader (permissionless).
    DetermineWinner { auction: Address, bid: Address },

    /// Fix the leader as winner and grant it decrypt permission (permissionless).
    FinalizeWinner {
        auction: Address,
        permission: Address,
        leader: Address,
    },

    /// Reveal the winning amount with an attestation and pay the seller.
    SettleAuction {
        auction: Address,
        handle_bytes: [u8; WIDE_LEN],
        plaintext_bytes: [u8; WIDE_LEN],
        attestation: Attestation,
    },

    /// Withdraw an open auction (seller only).
    CancelAuction { auction: Address, reason: String },
}

impl Instruction {
    /// Short action name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::CreateAuction(_) => "create auction",
            Instruction::PlaceBid { .. } => "place bid",
            Instruction::CloseBidding { .. } => "close bidding",
            Instruction::DetermineWinner { .. } => "determine winner",
            Instruction::FinalizeWinner { .. } => "finalize winner",
            Instruction::SettleAuction { .. } => "settle auction",
            Instruction::CancelAuction { .. } => "cancel auction",
        }
    }
}

/// An instruction signed by its sender.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub sender: Address,
    pub instruction: Instruction,
    #[serde_as(as = "[_; 64]")]
    pub signature: Signature,
}

impl SignedTransaction {
    /// Bytes the sender signs for `instruction`.
    pub fn signing_message(instruction: &Instruction) -> Result<Vec<u8>, std::io::Error> {
        let mut message = TRANSACTION_DOMAIN.to_vec();
        borsh::to_writer(&mut message, instruction)?;
        Ok(message)
    }

    pub fn verify(&self) -> Result<(), ProgramError> {
        let message = Self::signing_message(&self.instruction).map_err(|_| ProgramError::InvalidSignature)?;
        verify_signature(&self.sender, &message, &self.signature).map_err(|_| ProgramError::InvalidSignature)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, std::io::Error> {
        borsh::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, std::io::Error> {
        borsh::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn signed(key: &SigningKey, instruction: Instruction) -> SignedTransaction {
        let signature = key.sign(&SignedTransaction::signing_message(&instruction).unwrap()).to_bytes();
        SignedTransaction {
            sender: key.verifying_key().to_bytes(),
            instruction,
            signature,
        }
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let key = SigningKey::generate(&mut OsRng);
        let tx = signed(&key, Instruction::CloseBidding { auction: [3u8; 32] });
        assert!(tx.verify().is_ok());

        let decoded = SignedTransaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn test_tampered_instruction_rejected() {
        let key = SigningKey::generate(&mut OsRng);
        let mut tx = signed(&key, Instruction::CloseBidding { auction: [3u8; 32] });
        tx.instruction = Instruction::CloseBidding { auction: [4u8; 32] };
        assert_eq!(tx.verify(), Err(ProgramError::InvalidSignature));
    }

    #[test]
    fn test_signing_message_is_domain_prefixed_borsh() {
        let instruction = Instruction::CancelAuction {
            auction: [7u8; 32],
            reason: "withdrawn".into(),
        };
        let message = SignedTransaction::signing_message(&instruction).unwrap();
        assert!(message.starts_with(TRANSACTION_DOMAIN));

        let body = &message[TRANSACTION_DOMAIN.len()..];
        assert_eq!(body, borsh::to_vec(&instruction).unwrap().as_slice());
        let decoded: Instruction = borsh::from_slice(body).unwrap();
        assert_eq!(decoded, instruction);
    }
}
