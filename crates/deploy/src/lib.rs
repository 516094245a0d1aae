//! stakehouse-deploy - Deployment library for the staking contracts.
//!
//! This crate deploys an ordered plan of contracts to an EVM network, verifies them on a
//! block explorer when the network is live, and records the deployed addresses per network.

mod artifact;
pub use artifact::{ArtifactStore, BuildInfo, ContractArtifact, SourceId};

pub mod compile;

mod config;
pub use config::{
    CONFIG_FILENAME, DEFAULT_ETHERSCAN_API_URL, DEFAULT_LOCAL_RPC_URL, DEFAULT_RECORDS_FILENAME,
    DeployConfig, EtherscanConfig, NetworkConfig, VERIFICATION_BLOCK_CONFIRMATIONS,
};

mod contract;
pub use contract::{
    ConstructorArg, ContractSpec, DeploymentResult, STAKING_REWARDS, TOKEN_REWARD, TOKEN_STAKING,
    TransactionHandle, encode_constructor_args, staking_plan,
};

mod deployer;
pub use deployer::{ContractDeployer, ContractDeployment, RpcDeployer};

mod error;
pub use error::{DeployError, StoreError};

mod network;
pub use network::{NetworkProfile, SigningCredentials};

pub mod rpc;

mod sequencer;
pub use sequencer::{RunOptions, Sequencer, validate_order};

mod store;
pub use store::{DeploymentRecords, RecordStore};

mod verify;
pub use verify::{
    EtherscanVerifier, VerificationError, VerificationOutcome, VerificationRequest, Verifier,
    classify_rejection,
};
