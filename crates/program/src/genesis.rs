//! Genesis configuration for the auction program.
//!
//! This module defines the program limits and the initial ledger state
//! (clock, funded accounts, confidential-service seed).

use serde::{Deserialize, Serialize};

use sealbid_types::wire::address_from_hex;
use sealbid_types::{
    Address, CONFIDENTIAL_PROGRAM_ID, MAX_AUCTION_DURATION, MAX_DESCRIPTION_LENGTH, MAX_TITLE_LENGTH,
    MIN_AUCTION_DURATION, PROGRAM_ID,
};

/// Program limits and identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    pub program_id: Address,
    pub confidential_program_id: Address,
    /// Minimum bidding period (seconds)
    pub min_duration: i64,
    /// Maximum bidding period (seconds)
    pub max_duration: i64,
    pub max_title_length: usize,
    pub max_description_length: usize,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: PROGRAM_ID,
            confidential_program_id: CONFIDENTIAL_PROGRAM_ID,
            min_duration: MIN_AUCTION_DURATION,
            max_duration: MAX_AUCTION_DURATION,
            max_title_length: MAX_TITLE_LENGTH,
            max_description_length: MAX_DESCRIPTION_LENGTH,
        }
    }
}

/// One pre-funded account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisBalance {
    /// Hex-encoded address
    pub address: String,
    pub amount: u64,
}

/// Genesis configuration for the auction program.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub program: ProgramConfig,

    /// Initial ledger clock (unix seconds)
    pub start_time: i64,

    /// Seed for the confidential service keys
    pub confidential_seed: [u8; 32],

    pub balances: Vec<GenesisBalance>,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            program: ProgramConfig::default(),
            start_time: 1_700_000_000,
            confidential_seed: [7u8; 32],
            balances: Vec::new(),
        }
    }
}

impl GenesisConfig {
    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.program.min_duration <= 0 {
            return Err(GenesisValidationError::InvalidLimits(
                "Minimum duration must be positive".into(),
            ));
        }
        if self.program.min_duration > self.program.max_duration {
            return Err(GenesisValidationError::InvalidLimits(
                "Minimum duration exceeds maximum duration".into(),
            ));
        }
        if self.program.program_id == self.program.confidential_program_id {
            return Err(GenesisValidationError::InvalidLimits(
                "Program and confidential service ids must differ".into(),
            ));
        }

        self.funded_accounts().map(|_| ())
    }

    /// Decode the pre-funded accounts.
    pub fn funded_accounts(&self) -> Result<Vec<(Address, u64)>, GenesisValidationError> {
        self.balances
            .iter()
            .map(|entry| {
                address_from_hex(&entry.address)
                    .map(|address| (address, entry.amount))
                    .map_err(|_| GenesisValidationError::InvalidAddress(entry.address.clone()))
            })
            .collect()
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid program limits: {0}")]
    InvalidLimits(String),

    #[error("Invalid genesis address: {0}")]
    InvalidAddress(String),

    #[error("Confidential service setup failed: {0}")]
    ConfidentialSetup(String),
}
