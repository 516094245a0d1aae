//! Orchestration of a deployment run.

use std::collections::{HashMap, HashSet};

use alloy_core::primitives::Address;

use crate::{
    ContractDeployer, ContractDeployment, ContractSpec, DeployError, DeploymentResult,
    NetworkProfile, RecordStore, VerificationOutcome, VerificationRequest, Verifier,
};

/// Options of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Verify contracts on the block explorer. Ignored on development networks.
    pub verify: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { verify: true }
    }
}

/// Check that every dependency of a plan is deployed before it is needed.
///
/// Runs before any transaction is sent, so a misordered plan never leaves half a
/// deployment behind.
pub fn validate_order(specs: &[ContractSpec]) -> Result<(), DeployError> {
    let mut seen = HashSet::new();

    for spec in specs {
        if let Some(dependency) = spec
            .dependencies()
            .into_iter()
            .find(|dependency| !seen.contains(dependency))
        {
            return Err(DeployError::UnresolvedDependency {
                contract: spec.name.clone(),
                dependency: dependency.to_string(),
            });
        }

        if !seen.insert(spec.name.as_str()) {
            return Err(DeployError::DuplicateContract(spec.name.clone()));
        }
    }

    Ok(())
}

/// Deploys a plan contract by contract, verifies on live networks, then records the
/// addresses.
pub struct Sequencer<D, V> {
    deployer: D,
    verifier: V,
    store: RecordStore,
    options: RunOptions,
}

impl<D: ContractDeployer, V: Verifier> Sequencer<D, V> {
    pub fn new(deployer: D, verifier: V, store: RecordStore, options: RunOptions) -> Self {
        Self {
            deployer,
            verifier,
            store,
            options,
        }
    }

    pub fn deployer(&self) -> &D {
        &self.deployer
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Deploy `specs` in order on `profile`.
    ///
    /// The records are only written once every contract is deployed. Verification
    /// failures are logged and never abort the run.
    pub async fn run(
        &self,
        profile: &NetworkProfile,
        specs: &[ContractSpec],
    ) -> Result<Vec<DeploymentResult>, DeployError> {
        validate_order(specs)?;

        let verify = self.options.verify && !profile.is_development;

        tracing::info!(
            network = %profile.name,
            chain_id = profile.chain_id,
            contracts = specs.len(),
            verify,
            "Starting deployment..."
        );

        let mut deployed: HashMap<String, Address> = HashMap::new();
        let mut results = Vec::with_capacity(specs.len());

        for spec in specs {
            let constructor_args = spec.resolve_args(&deployed)?;
            let deployment = ContractDeployment {
                contract_name: spec.name.clone(),
                source_identifier: spec.source_identifier.clone(),
                constructor_args,
            };

            tracing::info!(contract = %spec.name, "Deploying contract...");

            let result = self
                .deployer
                .deploy(&deployment)
                .await
                .map_err(|err| DeployError::deployment(&spec.name, err))?;

            tracing::info!(
                contract = %result.contract_name,
                address = %result.address,
                tx_hash = %result.transaction.hash,
                "Contract deployed"
            );

            if verify {
                self.deployer
                    .wait_for_confirmations(&result, profile.required_confirmations)
                    .await
                    .map_err(|err| DeployError::deployment(&spec.name, err))?;

                self.verify(&result, deployment).await;
            }

            deployed.insert(result.contract_name.clone(), result.address);
            results.push(result);
        }

        for result in &results {
            tracing::info!(
                network = %profile.name,
                contract = %result.contract_name,
                address = %result.address,
                "Deployed"
            );
        }

        self.store.commit(&profile.name, &results)?;

        Ok(results)
    }

    async fn verify(&self, result: &DeploymentResult, deployment: ContractDeployment) {
        let request = VerificationRequest {
            contract_name: deployment.contract_name,
            address: result.address,
            source_identifier: deployment.source_identifier,
            constructor_args: deployment.constructor_args,
        };

        tracing::info!(contract = %request.contract_name, "Verifying contract...");

        match self.verifier.verify(&request).await {
            Ok(VerificationOutcome::Verified) => {
                tracing::info!(contract = %request.contract_name, "Contract verified");
            }
            Ok(VerificationOutcome::AlreadyVerified) => {
                tracing::info!(contract = %request.contract_name, "Contract already verified");
            }
            Err(err) => {
                tracing::warn!(
                    contract = %request.contract_name,
                    address = %request.address,
                    error = %err,
                    "Verification failed, continuing"
                );
            }
        }
    }
}
