//! Configuration loading: defaults, then `Stakehouse.toml`, then the environment.

use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use stakehouse_deploy::{CONFIG_FILENAME, DeployConfig};

/// Environment variables read by Hardhat projects, mapped to their configuration key.
const LEGACY_ENV: [(&str, &str); 3] = [
    ("SEPOLIA_RPC_URL", "networks.sepolia.url"),
    ("PRIVATE_KEY", "networks.sepolia.private_key"),
    ("ETHERSCAN_API_KEY", "etherscan.api_keys.sepolia"),
];

fn legacy_key(name: &str) -> Option<&'static str> {
    LEGACY_ENV
        .iter()
        .find(|(var, _)| var.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Build the configuration figment.
///
/// Later providers win: `STAKEHOUSE_*` variables (nested with `__`, e.g.
/// `STAKEHOUSE_NETWORKS__SEPOLIA__URL`) override the legacy variables, which override the
/// TOML file, which overrides the built-in defaults.
pub fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(DeployConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::raw().filter_map(|key| legacy_key(key.as_str()).map(Into::into)))
        .merge(
            Env::prefixed("STAKEHOUSE_")
                .ignore(&["verbosity", "config", "network"])
                .split("__"),
        )
}

/// Load the configuration.
///
/// An explicitly given file must exist; the default `Stakehouse.toml` is optional.
pub fn load(path: Option<&Path>) -> Result<DeployConfig> {
    let path = match path {
        Some(path) if !path.exists() => {
            anyhow::bail!("Configuration file {} does not exist", path.display())
        }
        Some(path) => path,
        None => Path::new(CONFIG_FILENAME),
    };

    let config: DeployConfig = figment(path)
        .extract()
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        default_network = %config.default_network,
        networks = config.networks.len(),
        "Configuration loaded"
    );

    Ok(config)
}
