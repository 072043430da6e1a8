//! Deterministic address derivation.
//!
//! Addresses are `SHA-256(domain || program_id || len(seed_0) || seed_0 || ...)`.
//! Each seed is length-prefixed so distinct seed tuples never share a preimage.

use sha2::{Digest, Sha256};

use crate::wire::encode_u128;
use crate::{Address, Handle, AUCTION_SEED, BID_SEED};

const DERIVATION_DOMAIN: &[u8] = b"SEALBID_DERIVED_ADDRESS_V1:";

/// Derives addresses owned by one program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Address,
}

impl AddressDeriver {
    pub const fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    /// Derive an address from an ordered list of seeds.
    pub fn derive(&self, seeds: &[&[u8]]) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(DERIVATION_DOMAIN);
        hasher.update(self.program_id);
        for seed in seeds {
            hasher.update((seed.len() as u32).to_le_bytes());
            hasher.update(seed);
        }
        hasher.finalize().into()
    }

    /// `("auction", seller, auction_id_le)`
    pub fn auction_address(&self, seller: &Address, auction_id: u64) -> Address {
        self.derive(&[AUCTION_SEED, seller, &auction_id.to_le_bytes()])
    }

    /// `("bid", auction, bidder)`
    pub fn bid_address(&self, auction: &Address, bidder: &Address) -> Address {
        self.derive(&[BID_SEED, auction, bidder])
    }

    /// `(handle_le16, allowed_identity)`, derived under the confidential service's id.
    pub fn permission_address(&self, handle: Handle, allowed: &Address) -> Address {
        self.derive(&[&encode_u128(handle.0), allowed])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CONFIDENTIAL_PROGRAM_ID, PROGRAM_ID};

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = AddressDeriver::new(PROGRAM_ID);
        let seller = [1u8; 32];
        assert_eq!(
            deriver.auction_address(&seller, 42),
            deriver.auction_address(&seller, 42)
        );
    }

    #[test]
    fn test_distinct_seeds_distinct_addresses() {
        let deriver = AddressDeriver::new(PROGRAM_ID);
        let seller = [1u8; 32];
        let a1 = deriver.auction_address(&seller, 1);
        let a2 = deriver.auction_address(&seller, 2);
        let a3 = deriver.auction_address(&[2u8; 32], 1);
        assert_ne!(a1, a2);
        assert_ne!(a1, a3);

        let b1 = deriver.bid_address(&a1, &[9u8; 32]);
        let b2 = deriver.bid_address(&a2, &[9u8; 32]);
        assert_ne!(b1, b2);
    }

    #[test]
    fn test_length_prefix_separates_seed_boundaries() {
        let deriver = AddressDeriver::new(PROGRAM_ID);
        assert_ne!(deriver.derive(&[b"ab", b"c"]), deriver.derive(&[b"a", b"bc"]));
    }

    #[test]
    fn test_program_id_scopes_addresses() {
        let program = AddressDeriver::new(PROGRAM_ID);
        let confidential = AddressDeriver::new(CONFIDENTIAL_PROGRAM_ID);
        let handle = Handle(77);
        assert_ne!(
            program.permission_address(handle, &[3u8; 32]),
            confidential.permission_address(handle, &[3u8; 32])
        );
    }
}
