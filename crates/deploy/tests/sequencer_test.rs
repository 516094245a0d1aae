//! Integration tests for the deployment sequencer.
//!
//! The chain and the block explorer are replaced by in-memory fakes, the records file lives
//! in a temporary directory.
//! Run with: cargo test --test sequencer_test

use std::sync::Mutex;

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256},
};
use stakehouse_deploy::{
    ConstructorArg, ContractDeployer, ContractDeployment, ContractSpec, DeployError, DeploymentResult,
    NetworkProfile, RecordStore, RunOptions, STAKING_REWARDS, Sequencer, SigningCredentials,
    StoreError, TOKEN_REWARD, TOKEN_STAKING, TransactionHandle, VerificationError,
    VerificationOutcome, VerificationRequest, Verifier, staking_plan,
};
use tempdir::TempDir;
use url::Url;

/// Deployer handing out sequential addresses.
#[derive(Default)]
struct FakeDeployer {
    deployments: Mutex<Vec<ContractDeployment>>,
    confirmations: Mutex<Vec<(String, u64)>>,
    fail_on: Option<&'static str>,
    fail_confirmations: bool,
}

impl FakeDeployer {
    fn failing_on(contract: &'static str) -> Self {
        Self {
            fail_on: Some(contract),
            ..Default::default()
        }
    }

    fn deployed_names(&self) -> Vec<String> {
        self.deployments
            .lock()
            .unwrap()
            .iter()
            .map(|deployment| deployment.contract_name.clone())
            .collect()
    }

    fn deployment(&self, name: &str) -> ContractDeployment {
        self.deployments
            .lock()
            .unwrap()
            .iter()
            .find(|deployment| deployment.contract_name == name)
            .cloned()
            .unwrap()
    }
}

impl ContractDeployer for FakeDeployer {
    async fn deploy<'a>(
        &'a self,
        deployment: &'a ContractDeployment,
    ) -> anyhow::Result<DeploymentResult> {
        if self.fail_on == Some(deployment.contract_name.as_str()) {
            anyhow::bail!("execution reverted");
        }

        let mut deployments = self.deployments.lock().unwrap();
        deployments.push(deployment.clone());
        let n = deployments.len() as u8;

        Ok(DeploymentResult {
            contract_name: deployment.contract_name.clone(),
            address: Address::with_last_byte(n),
            transaction: TransactionHandle {
                hash: B256::with_last_byte(n),
                block_number: n as u64,
            },
        })
    }

    async fn wait_for_confirmations<'a>(
        &'a self,
        result: &'a DeploymentResult,
        confirmations: u64,
    ) -> anyhow::Result<()> {
        if self.fail_confirmations {
            anyhow::bail!("Timeout waiting for confirmations");
        }

        self.confirmations
            .lock()
            .unwrap()
            .push((result.contract_name.clone(), confirmations));
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Verified,
    AlreadyVerified,
    Failing,
}

struct FakeVerifier {
    mode: Mode,
    requests: Mutex<Vec<VerificationRequest>>,
}

impl FakeVerifier {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn verified_names(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.contract_name.clone())
            .collect()
    }
}

impl Verifier for FakeVerifier {
    async fn verify<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> Result<VerificationOutcome, VerificationError> {
        self.requests.lock().unwrap().push(request.clone());
        match self.mode {
            Mode::Verified => Ok(VerificationOutcome::Verified),
            Mode::AlreadyVerified => Ok(VerificationOutcome::AlreadyVerified),
            Mode::Failing => Err(VerificationError::Rejected(
                "Fail - Unable to verify".to_string(),
            )),
        }
    }
}

fn hardhat() -> NetworkProfile {
    NetworkProfile::development("hardhat", 1337, Url::parse("http://127.0.0.1:8545").unwrap())
}

fn sepolia() -> NetworkProfile {
    NetworkProfile {
        name: "sepolia".to_string(),
        chain_id: 11155111,
        rpc_url: Url::parse("https://rpc.sepolia.example").unwrap(),
        credentials: SigningCredentials::Unlocked,
        is_development: false,
        required_confirmations: 6,
    }
}

fn sequencer(
    dir: &TempDir,
    deployer: FakeDeployer,
    mode: Mode,
    options: RunOptions,
) -> Sequencer<FakeDeployer, FakeVerifier> {
    Sequencer::new(
        deployer,
        FakeVerifier::new(mode),
        RecordStore::new(dir.path().join("deployed-contracts.json")),
        options,
    )
}

#[tokio::test]
async fn test_hardhat_scenario() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    let results = sequencer.run(&hardhat(), &staking_plan()).await.unwrap();

    let names: Vec<_> = results.iter().map(|r| r.contract_name.as_str()).collect();
    assert_eq!(names, [TOKEN_STAKING, TOKEN_REWARD, STAKING_REWARDS]);

    // The rewards contract is wired to both tokens.
    let rewards = sequencer.deployer().deployment(STAKING_REWARDS);
    assert_eq!(
        rewards.constructor_args,
        vec![
            DynSolValue::Address(results[0].address),
            DynSolValue::Address(results[1].address),
        ]
    );

    // Development networks neither wait nor verify.
    assert!(sequencer.deployer().confirmations.lock().unwrap().is_empty());
    assert!(sequencer.verifier().verified_names().is_empty());

    let records = sequencer.store().load().unwrap();
    let hardhat = records.network("hardhat").unwrap();
    assert_eq!(hardhat.len(), 3);
    for result in &results {
        assert_eq!(hardhat[&result.contract_name], result.address.to_string());
    }
}

#[tokio::test]
async fn test_live_network_waits_and_verifies() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    sequencer.run(&sepolia(), &staking_plan()).await.unwrap();

    let confirmations = sequencer.deployer().confirmations.lock().unwrap().clone();
    assert_eq!(
        confirmations,
        vec![
            (TOKEN_STAKING.to_string(), 6),
            (TOKEN_REWARD.to_string(), 6),
            (STAKING_REWARDS.to_string(), 6),
        ]
    );
    assert_eq!(
        sequencer.verifier().verified_names(),
        [TOKEN_STAKING, TOKEN_REWARD, STAKING_REWARDS]
    );

    let requests = sequencer.verifier().requests.lock().unwrap().clone();
    assert_eq!(requests[2].source_identifier, "contracts/StakingRewards.sol:StakingRewards");
    assert_eq!(requests[2].constructor_args.len(), 2);
}

#[tokio::test]
async fn test_verification_disabled() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(
        &dir,
        FakeDeployer::default(),
        Mode::Verified,
        RunOptions { verify: false },
    );

    sequencer.run(&sepolia(), &staking_plan()).await.unwrap();

    assert!(sequencer.deployer().confirmations.lock().unwrap().is_empty());
    assert!(sequencer.verifier().verified_names().is_empty());
    assert_eq!(sequencer.store().load().unwrap().network("sepolia").unwrap().len(), 3);
}

#[tokio::test]
async fn test_already_verified_is_success() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(
        &dir,
        FakeDeployer::default(),
        Mode::AlreadyVerified,
        RunOptions::default(),
    );

    // Running twice verifies the same contracts twice; both runs succeed.
    let first = sequencer.run(&sepolia(), &staking_plan()).await.unwrap();
    let second = sequencer.run(&sepolia(), &staking_plan()).await.unwrap();

    assert_eq!(sequencer.verifier().verified_names().len(), 6);

    // The second run's addresses replace the first ones.
    let records = sequencer.store().load().unwrap();
    let sepolia = records.network("sepolia").unwrap();
    assert_eq!(sepolia.len(), 3);
    for (old, new) in first.iter().zip(&second) {
        assert_ne!(old.address, new.address);
        assert_eq!(sepolia[&new.contract_name], new.address.to_string());
    }
}

#[tokio::test]
async fn test_verification_failure_is_not_fatal() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Failing, RunOptions::default());

    let results = sequencer.run(&sepolia(), &staking_plan()).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(sequencer.verifier().verified_names().len(), 3);
    assert_eq!(sequencer.store().load().unwrap().network("sepolia").unwrap().len(), 3);
}

#[tokio::test]
async fn test_reversed_order_fails_before_deploying() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    let mut plan = staking_plan();
    plan.reverse();

    let err = sequencer.run(&hardhat(), &plan).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::UnresolvedDependency { ref contract, .. } if contract == STAKING_REWARDS
    ));
    assert!(sequencer.deployer().deployed_names().is_empty());
    assert!(!sequencer.store().path().exists());
}

#[tokio::test]
async fn test_dependent_contract_waits_for_its_dependency() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    // B depends on A: deploying [A, B] works, [B, A] does not.
    let a = ContractSpec::new("A", "contracts/A.sol:A");
    let b = ContractSpec::new("B", "contracts/B.sol:B").depends_on("A");

    sequencer.run(&hardhat(), &[a.clone(), b.clone()]).await.unwrap();
    assert_eq!(sequencer.deployer().deployed_names(), ["A", "B"]);

    let err = sequencer.run(&hardhat(), &[b, a]).await.unwrap_err();
    assert!(matches!(err, DeployError::UnresolvedDependency { .. }));
    assert_eq!(sequencer.deployer().deployed_names(), ["A", "B"]);
}

#[tokio::test]
async fn test_mid_run_failure_leaves_records_untouched() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(
        &dir,
        FakeDeployer::failing_on(STAKING_REWARDS),
        Mode::Verified,
        RunOptions::default(),
    );

    let existing = r#"{"hardhat": {"TokenStaking": "0x01"}}"#;
    std::fs::write(sequencer.store().path(), existing).unwrap();

    let err = sequencer.run(&hardhat(), &staking_plan()).await.unwrap_err();

    match err {
        DeployError::DeploymentFailure { contract, reason } => {
            assert_eq!(contract, STAKING_REWARDS);
            assert!(reason.contains("execution reverted"));
        }
        other => panic!("expected DeploymentFailure, got {other:?}"),
    }
    assert_eq!(sequencer.deployer().deployed_names(), [TOKEN_STAKING, TOKEN_REWARD]);
    assert_eq!(std::fs::read_to_string(sequencer.store().path()).unwrap(), existing);
}

#[tokio::test]
async fn test_confirmation_failure_is_fatal() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let deployer = FakeDeployer {
        fail_confirmations: true,
        ..Default::default()
    };
    let sequencer = sequencer(&dir, deployer, Mode::Verified, RunOptions::default());

    let err = sequencer.run(&sepolia(), &staking_plan()).await.unwrap_err();

    assert!(matches!(
        err,
        DeployError::DeploymentFailure { ref contract, .. } if contract == TOKEN_STAKING
    ));
    assert!(sequencer.verifier().verified_names().is_empty());
    assert!(!sequencer.store().path().exists());
}

#[tokio::test]
async fn test_commit_keeps_other_networks() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    std::fs::write(
        sequencer.store().path(),
        r#"{"sepolia": {"TokenStaking": "0x5FbDB2315678afecb367f032d93F642f64180aa3"}}"#,
    )
    .unwrap();

    sequencer.run(&hardhat(), &staking_plan()).await.unwrap();

    let records = sequencer.store().load().unwrap();
    assert_eq!(
        records.network("sepolia").unwrap()[TOKEN_STAKING],
        "0x5FbDB2315678afecb367f032d93F642f64180aa3"
    );
    assert_eq!(records.network("hardhat").unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_records_fail_after_deploying() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());
    std::fs::write(sequencer.store().path(), "not json").unwrap();

    let err = sequencer.run(&hardhat(), &staking_plan()).await.unwrap_err();

    assert!(matches!(err, DeployError::Store(StoreError::Malformed { .. })));
    assert_eq!(sequencer.deployer().deployed_names().len(), 3);
}

#[tokio::test]
async fn test_hardhat_scenario_with_existing_token() {
    let dir = TempDir::new("stakehouse-sequencer").unwrap();
    let sequencer = sequencer(&dir, FakeDeployer::default(), Mode::Verified, RunOptions::default());

    let token_staking = Address::repeat_byte(0xaa);
    std::fs::write(
        sequencer.store().path(),
        format!(r#"{{"hardhat": {{"TokenStaking": "{token_staking}"}}}}"#),
    )
    .unwrap();

    // TokenStaking is already deployed: pass its address directly.
    let plan = vec![
        ContractSpec::new(TOKEN_REWARD, "contracts/TokenReward.sol:TokenReward"),
        ContractSpec::new(STAKING_REWARDS, "contracts/StakingRewards.sol:StakingRewards")
            .arg(ConstructorArg::Address(token_staking))
            .arg(ConstructorArg::Contract(TOKEN_REWARD.to_string())),
    ];

    let results = sequencer.run(&hardhat(), &plan).await.unwrap();

    let records = sequencer.store().load().unwrap();
    let hardhat = records.network("hardhat").unwrap();
    assert_eq!(hardhat.len(), 3);
    assert_eq!(hardhat[TOKEN_STAKING], token_staking.to_string());
    assert_eq!(hardhat[TOKEN_REWARD], results[0].address.to_string());
    assert_eq!(hardhat[STAKING_REWARDS], results[1].address.to_string());
}
