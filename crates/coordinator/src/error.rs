//! Coordinator error taxonomy.
//!
//! Every error names the action that was attempted. Ledger rejections are
//! classified so callers can tell whether retrying is expected to help.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use sealbid_confidential::ConfidentialError;
use sealbid_program::{ErrorClass, ProgramError};
use sealbid_types::{short_address, Address, AuctionState};

use crate::gateway::GatewayError;
use crate::identity::IdentityError;
use crate::ledger::LedgerError;
use crate::state_machine::Action;
use crate::timeout::Stage;

/// Errors surfaced by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Cannot {action} while auction is {}: {reason} (retrying will not help)", StateLabel(.state))]
    StateViolation {
        action: Action,
        state: Option<AuctionState>,
        reason: String,
    },

    #[error("Cannot {action}: caller {caller} is not the {role} (retrying will not help)")]
    Authorization {
        action: Action,
        caller: String,
        role: &'static str,
    },

    #[error("Cannot {action}: bid {bid} was already processed")]
    AlreadyProcessed { action: Action, bid: String },

    #[error("Cannot {action}: ledger state changed ({reason}); refresh and retry")]
    StaleState { action: Action, reason: String },

    #[error("Cannot {action}: encryption service failed: {reason} (not retried automatically)")]
    EncryptionFailure { action: Action, reason: String },

    #[error("Cannot {action}: {stage} timed out after {after:?} (may be retried)")]
    Timeout {
        action: Action,
        stage: Stage,
        after: Duration,
    },

    #[error("Cannot {action}: network or ledger error: {reason} (not retried automatically)")]
    NetworkOrLedger { action: Action, reason: String },

    #[error("Cannot {action}: invalid input: {reason}")]
    InvalidInput { action: Action, reason: String },

    #[error("Cannot {action}: {what} not found")]
    NotFound { action: Action, what: String },
}

struct StateLabel<'a>(&'a Option<AuctionState>);

impl fmt::Display for StateLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(state) => write!(f, "{}", state),
            None => f.write_str("in an unknown state"),
        }
    }
}

impl CoordinatorError {
    /// Whether retrying the action (after a refresh) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordinatorError::StaleState { .. } | CoordinatorError::Timeout { .. })
    }

    pub fn action(&self) -> Action {
        match self {
            CoordinatorError::StateViolation { action, .. }
            | CoordinatorError::Authorization { action, .. }
            | CoordinatorError::AlreadyProcessed { action, .. }
            | CoordinatorError::StaleState { action, .. }
            | CoordinatorError::EncryptionFailure { action, .. }
            | CoordinatorError::Timeout { action, .. }
            | CoordinatorError::NetworkOrLedger { action, .. }
            | CoordinatorError::InvalidInput { action, .. }
            | CoordinatorError::NotFound { action, .. } => *action,
        }
    }
}

/// What the coordinator was doing when an error occurred.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    pub action: Action,
    pub caller: Address,
    /// Last known auction state, if any
    pub state: Option<AuctionState>,
    /// Bid the action targets, if any
    pub bid: Option<Address>,
}

impl Attempt {
    pub fn new(action: Action, caller: Address) -> Self {
        Self {
            action,
            caller,
            state: None,
            bid: None,
        }
    }

    pub fn in_state(mut self, state: AuctionState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn on_bid(mut self, bid: Address) -> Self {
        self.bid = Some(bid);
        self
    }

    /// Classify a program rejection.
    pub fn program_error(&self, err: ProgramError) -> CoordinatorError {
        let action = self.action;
        match err.class() {
            ErrorClass::StateViolation => CoordinatorError::StateViolation {
                action,
                state: match &err {
                    ProgramError::InvalidState { got, .. } => Some(*got),
                    _ => self.state,
                },
                reason: err.to_string(),
            },
            ErrorClass::Authorization => CoordinatorError::Authorization {
                action,
                caller: short_address(&self.caller),
                role: match err {
                    ProgramError::NotSeller => "seller",
                    ProgramError::NotWinner => "winner",
                    ProgramError::SellerCannotBid => "a bidder other than the seller",
                    _ => "transaction signer",
                },
            },
            ErrorClass::AlreadyProcessed => CoordinatorError::AlreadyProcessed {
                action,
                bid: self.bid.map(|b| short_address(&b)).unwrap_or_else(|| "?".into()),
            },
            ErrorClass::StaleState => CoordinatorError::StaleState {
                action,
                reason: err.to_string(),
            },
            ErrorClass::Encryption => CoordinatorError::EncryptionFailure {
                action,
                reason: err.to_string(),
            },
            ErrorClass::NotFound => CoordinatorError::NotFound {
                action,
                what: err.to_string(),
            },
            ErrorClass::InvalidInput => CoordinatorError::InvalidInput {
                action,
                reason: err.to_string(),
            },
        }
    }

    pub fn ledger_error(&self, err: LedgerError) -> CoordinatorError {
        match err {
            LedgerError::Rejected(program) => self.program_error(program),
            LedgerError::Transport(reason) => CoordinatorError::NetworkOrLedger {
                action: self.action,
                reason,
            },
        }
    }

    pub fn gateway_error(&self, err: GatewayError) -> CoordinatorError {
        match err {
            GatewayError::Service(ConfidentialError::NotAllowed { .. }) => CoordinatorError::Authorization {
                action: self.action,
                caller: short_address(&self.caller),
                role: "identity allowed to decrypt this handle",
            },
            GatewayError::Service(service) => CoordinatorError::EncryptionFailure {
                action: self.action,
                reason: service.to_string(),
            },
            GatewayError::Transport(reason) => CoordinatorError::NetworkOrLedger {
                action: self.action,
                reason,
            },
        }
    }

    pub fn identity_error(&self, err: IdentityError) -> CoordinatorError {
        CoordinatorError::Authorization {
            action: self.action,
            caller: format!("{} ({})", short_address(&self.caller), err),
            role: "transaction signer",
        }
    }

    pub fn state_violation(&self, reason: impl Into<String>) -> CoordinatorError {
        CoordinatorError::StateViolation {
            action: self.action,
            state: self.state,
            reason: reason.into(),
        }
    }

    pub fn unauthorized(&self, role: &'static str) -> CoordinatorError {
        CoordinatorError::Authorization {
            action: self.action,
            caller: short_address(&self.caller),
            role,
        }
    }

    pub fn invalid_input(&self, reason: impl Into<String>) -> CoordinatorError {
        CoordinatorError::InvalidInput {
            action: self.action,
            reason: reason.into(),
        }
    }

    pub fn stale(&self, reason: impl Into<String>) -> CoordinatorError {
        CoordinatorError::StaleState {
            action: self.action,
            reason: reason.into(),
        }
    }
}

/// Outcome of a batch of bid comparisons.
///
/// Always reports progress, even when the batch stopped on an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Bids compared by this batch
    pub processed: u32,
    /// Bids found already processed by another caller
    pub skipped: u32,
    /// Ledger counters at the end of the batch
    pub bids_processed: u32,
    pub bid_count: u32,
    /// Error that stopped the batch early
    pub error: Option<CoordinatorError>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none() && self.bids_processed == self.bid_count
    }
}
