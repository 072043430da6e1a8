//! Winner finalization.
//!
//! Reads the authoritative leader, derives the decrypt permission for
//! `(highest_bid_handle, current_leader)` and submits the finalize
//! instruction naming both. The program rejects a stale leader or permission;
//! that rejection is retried after a fresh read, up to `stale_retries` times.

use tracing::{info, warn};

use sealbid_program::Instruction;
use sealbid_types::short_address;
use sealbid_types::Address;

use crate::config::CoordinatorConfig;
use crate::error::{Attempt, CoordinatorError};
use crate::identity::SigningIdentity;
use crate::ledger::{fetch_snapshot, sign_and_submit, Ledger};
use crate::state_machine::{Action, AuctionSnapshot, AuctionStateMachine};

pub struct FinalizationCoordinator<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    config: &'a CoordinatorConfig,
}

impl<'a, L: Ledger + ?Sized> FinalizationCoordinator<'a, L> {
    pub fn new(ledger: &'a L, config: &'a CoordinatorConfig) -> Self {
        Self { ledger, config }
    }

    /// Finalize the current leader as winner. Returns the refreshed auction.
    pub async fn finalize(
        &self,
        identity: &dyn SigningIdentity,
        auction: &Address,
    ) -> Result<AuctionSnapshot, CoordinatorError> {
        let caller = identity.address();
        let mut retries = 0;

        loop {
            let attempt = Attempt::new(Action::FinalizeWinner, caller);
            let snapshot = fetch_snapshot(self.ledger, self.config, &attempt, auction).await?;
            AuctionStateMachine::check(&snapshot, Action::FinalizeWinner, &caller)?;

            let leader = snapshot.auction.current_leader;
            let handle = snapshot.auction.highest_bid_handle;
            let permission = self.config.permission_deriver().permission_address(handle, &leader);

            let attempt = attempt.in_state(snapshot.state());
            let instruction = Instruction::FinalizeWinner {
                auction: *auction,
                permission,
                leader,
            };

            match sign_and_submit(self.ledger, self.config, identity, &attempt, instruction).await {
                Ok(_) => {
                    info!(
                        auction = %short_address(auction),
                        winner = %short_address(&leader),
                        permission = %short_address(&permission),
                        "Winner finalized"
                    );
                    return fetch_snapshot(self.ledger, self.config, &attempt, auction).await;
                }
                Err(e @ CoordinatorError::StaleState { .. }) if retries < self.config.stale_retries => {
                    retries += 1;
                    warn!(
                        auction = %short_address(auction),
                        retry = retries,
                        error = %e,
                        "Leader moved before finalization, re-reading"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
