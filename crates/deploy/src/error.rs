//! Error taxonomy for a deployment run.

use std::path::PathBuf;

/// Errors that abort a deployment run.
///
/// Verification problems are not part of this enum: they are reported through
/// [`VerificationError`](crate::VerificationError) and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A deployment transaction could not be submitted, was rejected or reverted.
    #[error("failed to deploy {contract}: {reason}")]
    DeploymentFailure { contract: String, reason: String },

    /// A contract references another contract that is not deployed earlier in the plan.
    #[error("{contract} depends on {dependency}, which is not deployed earlier in the plan")]
    UnresolvedDependency { contract: String, dependency: String },

    /// The same contract name appears twice in one plan.
    #[error("contract {0} appears more than once in the deployment plan")]
    DuplicateContract(String),

    /// The deployment records could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DeployError {
    /// Wrap an adapter error as a [`DeployError::DeploymentFailure`] for `contract`.
    pub(crate) fn deployment(contract: &str, err: anyhow::Error) -> Self {
        Self::DeploymentFailure {
            contract: contract.to_string(),
            reason: format!("{err:#}"),
        }
    }
}

/// Errors raised while reading or writing the deployment records file.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read deployment records from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("deployment records at {path} are not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write deployment records to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to lock deployment records at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
