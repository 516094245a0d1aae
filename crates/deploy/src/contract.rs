//! Deployable contract definitions and deployment results.

use std::collections::{BTreeSet, HashMap};

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, I256, U256},
};
use serde::{Deserialize, Serialize};

use crate::DeployError;

/// Name of the staking token contract.
pub const TOKEN_STAKING: &str = "TokenStaking";
/// Name of the reward token contract.
pub const TOKEN_REWARD: &str = "TokenReward";
/// Name of the staking rewards contract.
pub const STAKING_REWARDS: &str = "StakingRewards";

/// A constructor argument of a [`ContractSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConstructorArg {
    Address(Address),
    Uint(U256),
    Int(I256),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    Bytes32(B256),
    /// Placeholder replaced by the address of a contract deployed earlier in the run.
    Contract(String),
}

impl ConstructorArg {
    /// The contract this argument refers to, if it is a placeholder.
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Self::Contract(name) => Some(name),
            _ => None,
        }
    }

    fn resolve(&self, deployed: &HashMap<String, Address>) -> Option<DynSolValue> {
        let value = match self {
            Self::Address(address) => DynSolValue::Address(*address),
            Self::Uint(value) => DynSolValue::Uint(*value, 256),
            Self::Int(value) => DynSolValue::Int(*value, 256),
            Self::Bool(value) => DynSolValue::Bool(*value),
            Self::String(value) => DynSolValue::String(value.clone()),
            Self::Bytes(value) => DynSolValue::Bytes(value.to_vec()),
            Self::Bytes32(value) => DynSolValue::FixedBytes(*value, 32),
            Self::Contract(name) => DynSolValue::Address(*deployed.get(name)?),
        };
        Some(value)
    }
}

/// One deployable unit of a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSpec {
    /// Name under which the deployment is recorded.
    pub name: String,
    /// Hardhat fully qualified name, e.g. `contracts/Token.sol:Token`.
    pub source_identifier: String,
    /// Constructor arguments, in ABI order.
    #[serde(default)]
    pub constructor_args: Vec<ConstructorArg>,
    /// Contracts that must be deployed before this one.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl ContractSpec {
    pub fn new(name: impl Into<String>, source_identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_identifier: source_identifier.into(),
            constructor_args: Vec::new(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Append a constructor argument.
    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.constructor_args.push(arg);
        self
    }

    /// Declare a dependency on another contract of the plan.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    /// Declared dependencies together with the contracts referenced by placeholders.
    pub fn dependencies(&self) -> BTreeSet<&str> {
        self.depends_on
            .iter()
            .map(String::as_str)
            .chain(self.constructor_args.iter().filter_map(ConstructorArg::dependency))
            .collect()
    }

    /// Resolve the constructor arguments against the contracts deployed so far.
    pub fn resolve_args(
        &self,
        deployed: &HashMap<String, Address>,
    ) -> Result<Vec<DynSolValue>, DeployError> {
        self.constructor_args
            .iter()
            .map(|arg| {
                arg.resolve(deployed)
                    .ok_or_else(|| DeployError::UnresolvedDependency {
                        contract: self.name.clone(),
                        dependency: arg.dependency().unwrap_or_default().to_string(),
                    })
            })
            .collect()
    }
}

/// ABI-encode constructor arguments as they are appended to the creation bytecode.
pub fn encode_constructor_args(args: &[DynSolValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }
    DynSolValue::Tuple(args.to_vec()).abi_encode_params()
}

/// The transaction that created a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Transaction hash.
    pub hash: B256,
    /// Block in which the transaction was mined.
    pub block_number: u64,
}

/// Outcome of a successful contract deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub contract_name: String,
    pub address: Address,
    pub transaction: TransactionHandle,
}

/// The staking deployment plan: both tokens, then the rewards contract wired to them.
pub fn staking_plan() -> Vec<ContractSpec> {
    vec![
        ContractSpec::new(TOKEN_STAKING, "contracts/TokenStaking.sol:TokenStaking"),
        ContractSpec::new(TOKEN_REWARD, "contracts/TokenReward.sol:TokenReward"),
        ContractSpec::new(
            STAKING_REWARDS,
            "contracts/StakingRewards.sol:StakingRewards",
        )
        .depends_on(TOKEN_STAKING)
        .depends_on(TOKEN_REWARD)
        .arg(ConstructorArg::Contract(TOKEN_STAKING.to_string()))
        .arg(ConstructorArg::Contract(TOKEN_REWARD.to_string())),
    ]
}
