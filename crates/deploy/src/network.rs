//! Resolved network profile for a single deployment run.

use alloy_core::primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use url::Url;

/// How deployment transactions get signed.
#[derive(Debug, Clone)]
pub enum SigningCredentials {
    /// Sign locally with a private key and submit raw transactions.
    LocalKey(PrivateKeySigner),
    /// Let the node sign with its first unlocked account (`eth_sendTransaction`).
    ///
    /// This is what development nodes such as Hardhat or Anvil expose.
    Unlocked,
}

impl SigningCredentials {
    /// The deployer address, when it is known without asking the node.
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::LocalKey(signer) => Some(signer.address()),
            Self::Unlocked => None,
        }
    }
}

/// Everything a run needs to know about the target network.
///
/// A profile is resolved once before the run starts and never mutated.
#[derive(Debug, Clone)]
pub struct NetworkProfile {
    /// The network name, also used as the key in the deployment records.
    pub name: String,
    /// The EIP-155 chain ID.
    pub chain_id: u64,
    /// JSON-RPC endpoint of the network.
    pub rpc_url: Url,
    /// Credentials used to sign deployment transactions.
    pub credentials: SigningCredentials,
    /// Development networks skip confirmation waiting and verification.
    pub is_development: bool,
    /// Number of blocks to wait for before submitting a verification request.
    pub required_confirmations: u64,
}

impl NetworkProfile {
    /// A development profile signing with the node's unlocked account.
    pub fn development(name: impl Into<String>, chain_id: u64, rpc_url: Url) -> Self {
        Self {
            name: name.into(),
            chain_id,
            rpc_url,
            credentials: SigningCredentials::Unlocked,
            is_development: true,
            required_confirmations: 1,
        }
    }
}
