//! Keypair files.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use sealbid_coordinator::Keypair;

/// On-disk form of a signing identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    /// Hex-encoded verifying key
    pub address: String,
    /// Hex-encoded 32-byte secret
    pub secret: String,
}

impl From<&Keypair> for KeyFile {
    fn from(keypair: &Keypair) -> Self {
        Self {
            address: hex::encode(keypair.address()),
            secret: hex::encode(keypair.secret_bytes()),
        }
    }
}

/// Write `keypair` to `path`. Refuses to replace an existing file unless
/// `overwrite` is set.
pub fn save_keypair(path: &Path, keypair: &Keypair, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists", path.display());
    }
    let json = serde_json::to_string_pretty(&KeyFile::from(keypair))?;
    fs::write(path, json).with_context(|| format!("writing keypair to {}", path.display()))
}

/// Read a keypair written by [`save_keypair`].
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading keypair {}", path.display()))?;
    let file: KeyFile = serde_json::from_str(&raw).with_context(|| format!("parsing keypair {}", path.display()))?;

    let secret: [u8; 32] = hex::decode(&file.secret)
        .context("keypair secret is not hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("keypair secret must be 32 bytes"))?;
    let keypair = Keypair::from_secret(secret);

    if hex::encode(keypair.address()) != file.address.trim_start_matches("0x") {
        bail!("keypair {} address does not match its secret", path.display());
    }
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("sealbid-{}-{}.json", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn test_save_and_load() {
        let path = scratch("roundtrip");
        let keypair = Keypair::generate();

        save_keypair(&path, &keypair, false).unwrap();
        let loaded = load_keypair(&path).unwrap();
        assert_eq!(loaded.address(), keypair.address());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_refuses_overwrite() {
        let path = scratch("overwrite");
        save_keypair(&path, &Keypair::generate(), false).unwrap();

        assert!(save_keypair(&path, &Keypair::generate(), false).is_err());
        assert!(save_keypair(&path, &Keypair::generate(), true).is_ok());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_tampered_address_rejected() {
        let path = scratch("tampered");
        let mut file = KeyFile::from(&Keypair::generate());
        file.address = hex::encode([1u8; 32]);
        fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        assert!(load_keypair(&path).is_err());
        fs::remove_file(&path).unwrap();
    }
}
