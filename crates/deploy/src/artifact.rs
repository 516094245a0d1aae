//! Hardhat compilation artifacts.
//!
//! A source identifier such as `contracts/StakingRewards.sol:StakingRewards` maps to
//! `<artifacts>/contracts/StakingRewards.sol/StakingRewards.json`. The sibling
//! `StakingRewards.dbg.json` points at the build info holding the compiler version and
//! the standard JSON input, which is what explorers need for verification.

use std::path::{Path, PathBuf};

use alloy_core::{
    dyn_abi::{DynSolType, DynSolValue, Specifier},
    json_abi::JsonAbi,
    primitives::Bytes,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// A parsed `path/To/Source.sol:ContractName` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceId {
    pub source_name: String,
    pub contract_name: String,
}

impl SourceId {
    /// Parse a fully qualified name. A bare contract name is looked up in `contracts/<Name>.sol`.
    pub fn parse(identifier: &str) -> Result<Self> {
        let (source_name, contract_name) = match identifier.rsplit_once(':') {
            Some((source, contract)) => (source.to_string(), contract.to_string()),
            None => (format!("contracts/{identifier}.sol"), identifier.to_string()),
        };

        if source_name.is_empty() || contract_name.is_empty() {
            anyhow::bail!("Invalid source identifier: '{}'", identifier);
        }

        Ok(Self {
            source_name,
            contract_name,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: JsonAbi,
    bytecode: String,
}

#[derive(Debug, Deserialize)]
struct DebugFile {
    #[serde(rename = "buildInfo")]
    build_info: PathBuf,
}

/// A compiled contract ready to be deployed.
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub contract_name: String,
    pub source_name: String,
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Number of arguments the constructor expects.
    pub fn constructor_arity(&self) -> usize {
        self.abi
            .constructor
            .as_ref()
            .map(|constructor| constructor.inputs.len())
            .unwrap_or(0)
    }

    /// Fail unless `args` match the constructor's parameters in number and type.
    ///
    /// Integers are accepted for any `uintN`/`intN` they fit in, since their encoding does not
    /// depend on the declared width.
    pub fn check_constructor_args(&self, args: &[DynSolValue]) -> Result<()> {
        let expected = self.constructor_arity();
        if expected != args.len() {
            anyhow::bail!(
                "{} constructor expects {} argument(s), got {}",
                self.contract_name,
                expected,
                args.len()
            );
        }

        let Some(constructor) = &self.abi.constructor else {
            return Ok(());
        };

        for (index, (param, value)) in constructor.inputs.iter().zip(args).enumerate() {
            let ty = param.resolve().with_context(|| {
                format!(
                    "Unsupported type of {} constructor parameter {}",
                    self.contract_name, index
                )
            })?;

            if !value_fits(&ty, value) {
                anyhow::bail!(
                    "{} constructor parameter {} ('{}') is {}, got {:?}",
                    self.contract_name,
                    index,
                    param.name,
                    ty.sol_type_name(),
                    value
                );
            }
        }

        Ok(())
    }
}

fn value_fits(ty: &DynSolType, value: &DynSolValue) -> bool {
    match (ty, value) {
        (DynSolType::Uint(bits), DynSolValue::Uint(value, _)) => value.bit_len() <= *bits,
        (DynSolType::Int(bits), DynSolValue::Int(value, _)) => value.bits() as usize <= *bits,
        _ => ty.matches(value),
    }
}

/// Compiler build information of a contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub solc_version: String,
    pub solc_long_version: String,
    /// Solidity standard JSON input.
    pub input: Value,
}

impl BuildInfo {
    /// The compiler version in the format explorers expect, e.g. `v0.8.18+commit.87f61d96`.
    pub fn compiler_version(&self) -> String {
        format!("v{}", self.solc_long_version)
    }
}

/// Read access to a Hardhat artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn artifact_path(&self, id: &SourceId) -> PathBuf {
        self.root
            .join(&id.source_name)
            .join(format!("{}.json", id.contract_name))
    }

    fn debug_path(&self, id: &SourceId) -> PathBuf {
        self.root
            .join(&id.source_name)
            .join(format!("{}.dbg.json", id.contract_name))
    }

    /// Load the artifact of a contract.
    pub fn load(&self, source_identifier: &str) -> Result<ContractArtifact> {
        let id = SourceId::parse(source_identifier)?;
        let path = self.artifact_path(&id);
        let artifact: HardhatArtifact = read_json(&path)?;

        let bytecode = decode_bytecode(&artifact.bytecode)
            .with_context(|| format!("Invalid bytecode in {}", path.display()))?;

        tracing::debug!(
            contract = %artifact.contract_name,
            path = %path.display(),
            bytecode_len = bytecode.len(),
            "Loaded contract artifact"
        );

        Ok(ContractArtifact {
            contract_name: artifact.contract_name,
            source_name: artifact.source_name,
            abi: artifact.abi,
            bytecode,
        })
    }

    /// Load the build info a contract was compiled with.
    pub fn load_build_info(&self, source_identifier: &str) -> Result<BuildInfo> {
        let id = SourceId::parse(source_identifier)?;
        let debug_path = self.debug_path(&id);
        let debug: DebugFile = read_json(&debug_path)?;

        // The build info path is relative to the directory of the debug file.
        let build_info_path = debug_path
            .parent()
            .map(|dir| dir.join(&debug.build_info))
            .unwrap_or(debug.build_info);

        read_json(&build_info_path)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - are the contracts compiled?", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn decode_bytecode(bytecode: &str) -> Result<Bytes> {
    let hex_code = bytecode.trim_start_matches("0x");
    if hex_code.is_empty() {
        anyhow::bail!("Empty bytecode: the contract is abstract or an interface");
    }
    if hex_code.contains("__") {
        anyhow::bail!("Bytecode contains unlinked library placeholders");
    }
    Ok(hex::decode(hex_code)?.into())
}
