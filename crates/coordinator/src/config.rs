//! Coordinator configuration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use sealbid_program::ProgramConfig;
use sealbid_types::{Address, AddressDeriver};

use crate::timeout::{millis, Stage};

/// Configuration for the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Limits and ids of the program being driven
    pub program: ProgramConfig,

    /// Timeout for the signing identity (milliseconds)
    pub signature_timeout_ms: u64,
    /// Timeout for a ledger submission (milliseconds)
    pub submission_timeout_ms: u64,
    /// Timeout for a ledger read (milliseconds)
    pub fetch_timeout_ms: u64,
    /// Timeout for an encrypt request (milliseconds)
    pub encrypt_timeout_ms: u64,
    /// Timeout for a decrypt-with-proof request (milliseconds)
    pub decrypt_timeout_ms: u64,

    /// Re-read and retry this many times on stale state
    pub stale_retries: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            program: ProgramConfig::default(),
            signature_timeout_ms: 60_000,
            submission_timeout_ms: 30_000,
            fetch_timeout_ms: 10_000,
            encrypt_timeout_ms: 10_000,
            decrypt_timeout_ms: 30_000,
            stale_retries: 1,
        }
    }
}

impl CoordinatorConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn timeout(&self, stage: Stage) -> Duration {
        Duration::from_millis(match stage {
            Stage::Signature => self.signature_timeout_ms,
            Stage::Submission => self.submission_timeout_ms,
            Stage::Fetch => self.fetch_timeout_ms,
            Stage::Encrypt => self.encrypt_timeout_ms,
            Stage::Decrypt => self.decrypt_timeout_ms,
        })
    }

    /// Deriver for auction and bid addresses.
    pub fn program_deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.program.program_id)
    }

    /// Deriver for decrypt-permission addresses.
    pub fn permission_deriver(&self) -> AddressDeriver {
        AddressDeriver::new(self.program.confidential_program_id)
    }

    pub fn auction_address(&self, seller: &Address, auction_id: u64) -> Address {
        self.program_deriver().auction_address(seller, auction_id)
    }

    /// Apply the same timeout to every suspension point.
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        let ms = millis(timeout);
        self.signature_timeout_ms = ms;
        self.submission_timeout_ms = ms;
        self.fetch_timeout_ms = ms;
        self.encrypt_timeout_ms = ms;
        self.decrypt_timeout_ms = ms;
        self
    }
}
