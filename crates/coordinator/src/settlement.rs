//! Settlement: the winner reveals the winning bid and pays.
//!
//! Steps, in order:
//! 1. Re-read the auction and take its `highest_bid_handle`
//! 2. Sign the decrypt challenge and request an attested decryption
//! 3. Encode handle and plaintext as 16-byte little-endian words
//! 4. Submit the settle instruction carrying both and the attestation
//! 5. Re-read the settled auction

use tracing::info;

use sealbid_confidential::decrypt_challenge;
use sealbid_program::Instruction;
use sealbid_types::{short_address, Address};

use crate::config::CoordinatorConfig;
use crate::error::{Attempt, CoordinatorError};
use crate::gateway::EncryptionGateway;
use crate::identity::SigningIdentity;
use crate::ledger::{fetch_snapshot, sign_and_submit, Ledger};
use crate::state_machine::{Action, AuctionSnapshot, AuctionStateMachine};
use crate::timeout::{bounded, Stage};

/// Result of a completed settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Revealed plaintext, exactly as attested
    pub revealed: u128,
    /// Auction after settlement
    pub snapshot: AuctionSnapshot,
}

pub struct SettlementCoordinator<'a, L: Ledger + ?Sized, G: EncryptionGateway + ?Sized> {
    ledger: &'a L,
    gateway: &'a G,
    config: &'a CoordinatorConfig,
}

impl<'a, L: Ledger + ?Sized, G: EncryptionGateway + ?Sized> SettlementCoordinator<'a, L, G> {
    pub fn new(ledger: &'a L, gateway: &'a G, config: &'a CoordinatorConfig) -> Self {
        Self { ledger, gateway, config }
    }

    pub async fn settle(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<Settlement, CoordinatorError> {
        let caller = identity.address();
        let attempt = Attempt::new(Action::SettleAuction, caller);

        let snapshot = fetch_snapshot(self.ledger, self.config, &attempt, auction).await?;
        AuctionStateMachine::check(&snapshot, Action::SettleAuction, &caller)?;
        let attempt = attempt.in_state(snapshot.state());
        let handle = snapshot.auction.highest_bid_handle;

        let signature = bounded(
            attempt.action,
            Stage::Signature,
            self.config.timeout(Stage::Signature),
            identity.sign(&decrypt_challenge(handle)),
        )
        .await?
        .map_err(|e| attempt.identity_error(e))?;

        let reveal = bounded(
            attempt.action,
            Stage::Decrypt,
            self.config.timeout(Stage::Decrypt),
            self.gateway.decrypt_with_proof(handle, caller, signature),
        )
        .await?
        .map_err(|e| attempt.gateway_error(e))?;
        if reveal.handle != handle {
            return Err(attempt.stale(format!(
                "service decrypted handle {} instead of {}",
                reveal.handle, handle
            )));
        }

        let (handle_bytes, plaintext_bytes) = reveal.encoded();
        let instruction = Instruction::SettleAuction {
            auction: *auction,
            handle_bytes,
            plaintext_bytes,
            attestation: reveal.attestation,
        };
        sign_and_submit(self.ledger, self.config, identity, &attempt, instruction).await?;

        let snapshot = fetch_snapshot(self.ledger, self.config, &attempt, auction).await?;
        info!(
            auction = %short_address(auction),
            winner = %short_address(&caller),
            winning_amount = snapshot.auction.winning_amount,
            "Auction settled"
        );

        Ok(Settlement {
            revealed: reveal.plaintext,
            snapshot,
        })
    }
}
