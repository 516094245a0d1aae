//! Persistent record of deployed contract addresses.
//!
//! The records file maps a network name to the contracts deployed on it:
//!
//! ```json
//! {
//!   "sepolia": {
//!     "StakingRewards": "0x...",
//!     "TokenReward": "0x..."
//!   }
//! }
//! ```

use std::{
    collections::BTreeMap,
    ffi::OsString,
    fs::{File, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{DeploymentResult, StoreError};

/// Addresses of deployed contracts, keyed by network then contract name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentRecords(BTreeMap<String, BTreeMap<String, String>>);

impl DeploymentRecords {
    /// Contracts recorded for a network.
    pub fn network(&self, network: &str) -> Option<&BTreeMap<String, String>> {
        self.0.get(network)
    }

    /// Iterate over all networks and their contracts.
    pub fn networks(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, String>)> {
        self.0.iter().map(|(name, contracts)| (name.as_str(), contracts))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record one address, replacing any previous entry for the same contract.
    pub fn record(&mut self, network: &str, contract: &str, address: impl ToString) {
        self.0
            .entry(network.to_string())
            .or_default()
            .insert(contract.to_string(), address.to_string());
    }

    /// Record every result under `network`, leaving all other entries untouched.
    pub fn merge(&mut self, network: &str, results: &[DeploymentResult]) {
        for result in results {
            self.record(network, &result.contract_name, result.address);
        }
    }
}

/// The deployment records file.
///
/// Commits hold an advisory lock on a sibling `<file>.lock` (e.g. `deployed-contracts.json.lock`).
/// The lock file is empty and stays in place between runs.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the records. A missing file is an empty store.
    pub fn load(&self) -> Result<DeploymentRecords, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No deployment records yet");
                return Ok(DeploymentRecords::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Merge `results` into the records of `network` and write the file back.
    ///
    /// The file is re-read under an exclusive lock, so entries written by another run since
    /// this one started are preserved.
    pub fn commit(&self, network: &str, results: &[DeploymentResult]) -> Result<(), StoreError> {
        let lock = self.lock()?;

        let mut records = self.load()?;
        records.merge(network, results);
        self.write(&records)?;

        // Dropping the handle releases the lock as well; unlocking explicitly surfaces errors.
        lock.unlock().map_err(|source| StoreError::Lock {
            path: self.lock_path(),
            source,
        })?;

        tracing::info!(
            path = %self.path.display(),
            network,
            contracts = results.len(),
            "Deployment records saved"
        );

        Ok(())
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }

    fn lock_path(&self) -> PathBuf {
        self.sibling(".lock")
    }

    fn lock(&self) -> Result<File, StoreError> {
        let path = self.lock_path();
        let lock_err = |source| StoreError::Lock {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(lock_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;

        Ok(file)
    }

    fn write(&self, records: &DeploymentRecords) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut content = serde_json::to_string_pretty(records)
            .map_err(|err| write_err(std::io::Error::other(err)))?;
        content.push('\n');

        let tmp_path = self.sibling(".tmp");
        std::fs::write(&tmp_path, content).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(|source| {
            if let Err(err) = std::fs::remove_file(&tmp_path) {
                tracing::warn!(
                    path = %tmp_path.display(),
                    error = %err,
                    "Failed to remove temporary records file"
                );
            }
            write_err(source)
        })
    }
}
