//! Transaction execution for the auction program.
//!
//! The runtime owns the program state, the confidential service and the
//! ledger clock. Each transaction runs to completion or not at all.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sealbid_confidential::{AttestedDecryption, ConfidentialError, ConfidentialService};
use sealbid_types::{short_address, Address, Handle, Signature};

use crate::error::ProgramError;
use crate::events::ProgramEvent;
use crate::genesis::{GenesisConfig, GenesisValidationError, ProgramConfig};
use crate::handlers::{
    handle_cancel_auction, handle_close_bidding, handle_create_auction, handle_determine_winner,
    handle_finalize_winner, handle_place_bid, handle_settle_auction, CallContext,
};
use crate::instruction::{Instruction, SignedTransaction};
use crate::queries::{handle_query, ProgramQuery, ProgramQueryResponse};
use crate::state::ProgramState;

/// Outcome of an accepted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Account created by the instruction (auction or bid address)
    pub address: Option<Address>,
    pub events: Vec<ProgramEvent>,
}

/// Single-node program runtime.
pub struct ProgramRuntime {
    config: ProgramConfig,
    state: ProgramState,
    confidential: ConfidentialService,
    clock: i64,
}

impl ProgramRuntime {
    /// Build a runtime from a validated genesis configuration.
    pub fn from_genesis(genesis: GenesisConfig) -> Result<Self, GenesisValidationError> {
        genesis.validate()?;

        let confidential = ConfidentialService::from_seed(genesis.confidential_seed)
            .map_err(|e| GenesisValidationError::ConfidentialSetup(e.to_string()))?;

        let mut state = ProgramState::new();
        for (address, amount) in genesis.funded_accounts()? {
            state.credit(address, amount);
        }

        Ok(Self {
            config: genesis.program,
            state,
            confidential,
            clock: genesis.start_time,
        })
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    pub fn state(&self) -> &ProgramState {
        &self.state
    }

    pub fn confidential(&self) -> &ConfidentialService {
        &self.confidential
    }

    /// Current ledger time.
    pub fn now(&self) -> i64 {
        self.clock
    }

    pub fn set_time(&mut self, timestamp: i64) {
        self.clock = timestamp;
    }

    pub fn advance_time(&mut self, seconds: i64) -> i64 {
        self.clock = self.clock.saturating_add(seconds);
        self.clock
    }

    /// Credit an account, returning the new balance.
    pub fn airdrop(&mut self, address: Address, amount: u64) -> u64 {
        self.state.credit(address, amount);
        self.state.get_balance(&address)
    }

    pub fn query(&self, query: ProgramQuery) -> ProgramQueryResponse {
        handle_query(&self.state, query)
    }

    /// Encrypt an amount to the confidential service input key.
    pub fn encrypt(&mut self, amount: u64) -> Result<Vec<u8>, ConfidentialError> {
        self.confidential.encrypt(amount)
    }

    pub fn decrypt_with_proof(
        &self,
        handle: Handle,
        identity: &Address,
        signature: &Signature,
    ) -> Result<AttestedDecryption, ConfidentialError> {
        self.confidential.decrypt_with_proof(handle, identity, signature)
    }

    /// Verify and execute a signed transaction.
    pub fn execute(&mut self, tx: &SignedTransaction) -> Result<Receipt, ProgramError> {
        tx.verify()?;

        let ctx = CallContext {
            sender: tx.sender,
            timestamp: self.clock,
        };
        let first_event = self.state.events.len();

        let result = self.dispatch(&ctx, &tx.instruction);
        match &result {
            Ok(_) => debug!(
                instruction = tx.instruction.name(),
                sender = %short_address(&tx.sender),
                "Transaction executed"
            ),
            Err(e) => warn!(
                instruction = tx.instruction.name(),
                sender = %short_address(&tx.sender),
                error = %e,
                "Transaction rejected"
            ),
        }

        Ok(Receipt {
            address: result?,
            events: self.state.events[first_event..].to_vec(),
        })
    }

    fn dispatch(&mut self, ctx: &CallContext, instruction: &Instruction) -> Result<Option<Address>, ProgramError> {
        let state = &mut self.state;
        let confidential = &mut self.confidential;
        let config = &self.config;

        match instruction {
            Instruction::CreateAuction(params) => {
                handle_create_auction(state, config, ctx, params.clone()).map(Some)
            }
            Instruction::PlaceBid { auction, ciphertext } => {
                handle_place_bid(state, confidential, config, ctx, *auction, ciphertext).map(Some)
            }
            Instruction::CloseBidding { auction } => handle_close_bidding(state, ctx, *auction).map(|_| None),
            Instruction::DetermineWinner { auction, bid } => {
                handle_determine_winner(state, confidential, ctx, *auction, *bid).map(|_| None)
            }
            Instruction::FinalizeWinner {
                auction,
                permission,
                leader,
            } => handle_finalize_winner(state, confidential, config, ctx, *auction, *permission, *leader)
                .map(|_| None),
            Instruction::SettleAuction {
                auction,
                handle_bytes,
                plaintext_bytes,
                attestation,
            } => {
                let attestor = confidential.attestor();
                handle_settle_auction(state, &attestor, ctx, *auction, handle_bytes, plaintext_bytes, attestation)
                    .map(|_| None)
            }
            Instruction::CancelAuction { auction, reason } => {
                handle_cancel_auction(state, ctx, *auction, reason.clone()).map(|_| None)
            }
        }
    }
}
