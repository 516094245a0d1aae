//! Deployment configuration and network resolution.

use std::{collections::BTreeMap, path::Path, path::PathBuf, str::FromStr, time::Duration};

use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ContractSpec, NetworkProfile, SigningCredentials, staking_plan};

/// The default name for the stakehouse configuration file.
pub const CONFIG_FILENAME: &str = "Stakehouse.toml";

/// The default name of the deployment records file.
pub const DEFAULT_RECORDS_FILENAME: &str = "deployed-contracts.json";

/// Blocks to wait for on live networks before asking the explorer to verify.
pub const VERIFICATION_BLOCK_CONFIRMATIONS: u64 = 6;

/// RPC endpoint used by development networks that do not configure one.
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://127.0.0.1:8545";

/// Default Etherscan v2 API endpoint. The chain is selected with the `chainid` query parameter.
pub const DEFAULT_ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Configuration of a single network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// The EIP-155 chain ID.
    pub chain_id: u64,
    /// JSON-RPC endpoint. Development networks default to [`DEFAULT_LOCAL_RPC_URL`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    /// Hex-encoded private key of the deployer.
    ///
    /// When absent on a development network, the node's first unlocked account is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Overrides the number of confirmations waited for before verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmations: Option<u64>,
}

impl NetworkConfig {
    fn local(chain_id: u64) -> Self {
        Self {
            chain_id,
            url: None,
            private_key: None,
            confirmations: None,
        }
    }
}

/// Configuration of the block explorer used for source verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanConfig {
    /// Etherscan-compatible API endpoint.
    pub api_url: Url,
    /// API keys, keyed by network name.
    pub api_keys: BTreeMap<String, String>,
    /// Seconds between two verification status checks.
    pub poll_interval_secs: u64,
    /// Maximum number of verification status checks before giving up.
    pub max_status_checks: u32,
}

impl Default for EtherscanConfig {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_ETHERSCAN_API_URL).expect("default explorer URL is valid"),
            api_keys: BTreeMap::new(),
            poll_interval_secs: 5,
            max_status_checks: 24,
        }
    }
}

impl EtherscanConfig {
    /// Interval between two verification status checks.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Top-level deployment configuration.
///
/// Loaded from `Stakehouse.toml` and the environment by the CLI, and serializable
/// back to TOML to bootstrap a new project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Network used when none is given on the command line.
    pub default_network: String,
    /// Path to the deployment records file.
    pub records_path: PathBuf,
    /// Directory holding the compiled Hardhat artifacts.
    pub artifacts_dir: PathBuf,
    /// Command run to compile the contracts before deploying. Empty to skip.
    pub compile_command: Vec<String>,
    /// Networks on which confirmations and verification are skipped.
    pub development_chains: Vec<String>,
    /// Confirmations waited for on live networks before verification.
    pub verification_block_confirmations: u64,
    /// Seconds to wait for a deployment transaction to be mined.
    pub receipt_timeout_secs: u64,
    /// Seconds to wait for the required confirmations.
    pub confirmation_timeout_secs: u64,
    /// Known networks, keyed by name.
    pub networks: BTreeMap<String, NetworkConfig>,
    /// Explorer used for verification.
    pub etherscan: EtherscanConfig,
    /// Deployment plan overriding the built-in staking plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contracts: Option<Vec<ContractSpec>>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        let networks = BTreeMap::from([
            ("hardhat".to_string(), NetworkConfig::local(1337)),
            ("localhost".to_string(), NetworkConfig::local(31337)),
            ("sepolia".to_string(), NetworkConfig::local(11155111)),
        ]);

        Self {
            default_network: "hardhat".to_string(),
            records_path: PathBuf::from(DEFAULT_RECORDS_FILENAME),
            artifacts_dir: PathBuf::from("artifacts"),
            compile_command: vec!["npx".into(), "hardhat".into(), "compile".into()],
            development_chains: vec!["hardhat".to_string(), "localhost".to_string()],
            verification_block_confirmations: VERIFICATION_BLOCK_CONFIRMATIONS,
            receipt_timeout_secs: 300,
            confirmation_timeout_secs: 900,
            networks,
            etherscan: EtherscanConfig::default(),
            contracts: None,
        }
    }
}

impl DeployConfig {
    /// Resolve a network name into the profile used for a run.
    pub fn resolve_network(&self, name: &str) -> Result<NetworkProfile> {
        let network = self.networks.get(name).with_context(|| {
            format!(
                "Unknown network '{}'. Configured networks: {}",
                name,
                self.networks.keys().cloned().collect::<Vec<_>>().join(", ")
            )
        })?;

        let is_development = self.development_chains.iter().any(|chain| chain == name);

        let rpc_url = match (&network.url, is_development) {
            (Some(url), _) => url.clone(),
            (None, true) => Url::parse(DEFAULT_LOCAL_RPC_URL)?,
            (None, false) => anyhow::bail!("No RPC URL configured for network '{}'", name),
        };

        let private_key = network
            .private_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());

        let credentials = match private_key {
            Some(key) => SigningCredentials::LocalKey(
                PrivateKeySigner::from_str(key)
                    .with_context(|| format!("Invalid private key for network '{}'", name))?,
            ),
            None if is_development => SigningCredentials::Unlocked,
            None => anyhow::bail!("No private key configured for network '{}'", name),
        };

        let required_confirmations = network.confirmations.unwrap_or(if is_development {
            1
        } else {
            self.verification_block_confirmations
        });

        Ok(NetworkProfile {
            name: name.to_string(),
            chain_id: network.chain_id,
            rpc_url,
            credentials,
            is_development,
            required_confirmations,
        })
    }

    /// The contracts to deploy, in deployment order.
    pub fn plan(&self) -> Vec<ContractSpec> {
        self.contracts.clone().unwrap_or_else(staking_plan)
    }

    /// Maximum time to wait for a deployment transaction to be mined.
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    /// Maximum time to wait for the required confirmations.
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Load the configuration from a TOML file, without environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }
}
