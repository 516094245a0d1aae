//! Contract deployment over JSON-RPC.

use std::{future::Future, time::Duration};

use alloy_consensus::{SignableTransaction, TxEip1559, TxEnvelope};
use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, B256, Bytes, TxKind, U256},
};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::json;

use crate::{
    ArtifactStore, DeploymentResult, NetworkProfile, SigningCredentials, TransactionHandle,
    encode_constructor_args,
    rpc::{self, deserialize_u64_from_hex, parse_quantity, parse_quantity_u128},
};

/// A contract ready to be deployed, with its constructor arguments resolved.
#[derive(Debug, Clone)]
pub struct ContractDeployment {
    pub contract_name: String,
    pub source_identifier: String,
    pub constructor_args: Vec<DynSolValue>,
}

/// Submits deployment transactions.
///
/// `deploy` returns once the transaction is mined (one confirmation). Waiting for a
/// deeper confirmation count is the separate [`ContractDeployer::wait_for_confirmations`]
/// step, so development networks can skip it.
pub trait ContractDeployer: Send + Sync {
    /// Submit exactly one deployment transaction and wait for it to be mined.
    fn deploy<'a>(
        &'a self,
        deployment: &'a ContractDeployment,
    ) -> impl Future<Output = Result<DeploymentResult>> + Send + 'a;

    /// Wait until the deployment transaction has `confirmations` confirmations.
    fn wait_for_confirmations<'a>(
        &'a self,
        result: &'a DeploymentResult,
        confirmations: u64,
    ) -> impl Future<Output = Result<()>> + Send + 'a;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(deserialize_with = "deserialize_u64_from_hex")]
    block_number: u64,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    contract_address: Option<Address>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        // Pre-Byzantium receipts carry no status.
        self.status.as_deref().is_none_or(|status| status != "0x0")
    }
}

/// The block at which a transaction mined in `block_number` has `confirmations` confirmations.
///
/// The block holding the transaction counts as the first confirmation.
fn confirmation_target(block_number: u64, confirmations: u64) -> u64 {
    block_number.saturating_add(confirmations.saturating_sub(1))
}

/// [`ContractDeployer`] talking to a node over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcDeployer {
    client: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    credentials: SigningCredentials,
    artifacts: ArtifactStore,
    receipt_timeout: Duration,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

impl RpcDeployer {
    /// Create a deployer for the given network.
    pub fn new(profile: &NetworkProfile, artifacts: ArtifactStore) -> Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            rpc_url: profile.rpc_url.to_string(),
            chain_id: profile.chain_id,
            credentials: profile.credentials.clone(),
            artifacts,
            receipt_timeout: Duration::from_secs(300),
            confirmation_timeout: Duration::from_secs(900),
            poll_interval: rpc::DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set the maximum time to wait for a deployment transaction to be mined.
    pub fn receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// Set the maximum time to wait for the required confirmations.
    pub fn confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    /// Set the delay between two receipt or block number polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<serde_json::Value>,
    ) -> Result<T> {
        rpc::json_rpc_call(&self.client, &self.rpc_url, method, params).await
    }

    async fn block_number(&self) -> Result<u64> {
        let block_number: String = self.call("eth_blockNumber", vec![]).await?;
        parse_quantity(&block_number)
    }

    /// Sign an EIP-1559 creation transaction locally and submit it.
    async fn send_signed(&self, signer: &PrivateKeySigner, init_code: Bytes) -> Result<B256> {
        let from = signer.address();

        let nonce: String = self
            .call(
                "eth_getTransactionCount",
                vec![json!(from), json!("pending")],
            )
            .await
            .context("Failed to fetch deployer nonce")?;
        let gas: String = self
            .call(
                "eth_estimateGas",
                vec![json!({ "from": from, "data": init_code })],
            )
            .await
            .context("Failed to estimate deployment gas")?;
        let gas_price: String = self.call("eth_gasPrice", vec![]).await?;
        let priority_fee: String = self.call("eth_maxPriorityFeePerGas", vec![]).await?;

        let gas_limit = parse_quantity(&gas)?;
        let gas_price = parse_quantity_u128(&gas_price)?;
        let max_priority_fee_per_gas = parse_quantity_u128(&priority_fee)?;

        let tx = TxEip1559 {
            chain_id: self.chain_id,
            nonce: parse_quantity(&nonce)?,
            // 20% headroom over the estimate.
            gas_limit: gas_limit.saturating_mul(6) / 5,
            max_fee_per_gas: gas_price
                .saturating_mul(2)
                .saturating_add(max_priority_fee_per_gas),
            max_priority_fee_per_gas,
            to: TxKind::Create,
            value: U256::ZERO,
            input: init_code,
            ..Default::default()
        };

        tracing::debug!(
            from = %from,
            nonce = tx.nonce,
            gas_limit = tx.gas_limit,
            max_fee_per_gas = tx.max_fee_per_gas,
            "Signing deployment transaction"
        );

        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .context("Failed to sign deployment transaction")?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        let raw = Bytes::from(envelope.encoded_2718());

        self.call("eth_sendRawTransaction", vec![json!(raw)])
            .await
            .context("Deployment transaction rejected")
    }

    /// Submit a creation transaction signed by the node's first unlocked account.
    async fn send_unlocked(&self, init_code: Bytes) -> Result<B256> {
        let accounts: Vec<Address> = self.call("eth_accounts", vec![]).await?;
        let from = accounts.first().copied().context(
            "The node exposes no unlocked account; configure a private key for this network",
        )?;

        tracing::debug!(from = %from, "Sending deployment transaction from unlocked account");

        self.call(
            "eth_sendTransaction",
            vec![json!({ "from": from, "data": init_code })],
        )
        .await
        .context("Deployment transaction rejected")
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        rpc::poll_until(
            &format!("transaction {tx_hash} to be mined"),
            self.receipt_timeout,
            self.poll_interval,
            || async move {
                self.call::<Option<TransactionReceipt>>(
                    "eth_getTransactionReceipt",
                    vec![json!(tx_hash)],
                )
                .await
            },
        )
        .await
    }
}

impl ContractDeployer for RpcDeployer {
    async fn deploy<'a>(&'a self, deployment: &'a ContractDeployment) -> Result<DeploymentResult> {
        let artifact = self.artifacts.load(&deployment.source_identifier)?;
        artifact.check_constructor_args(&deployment.constructor_args)?;

        let mut init_code = artifact.bytecode.to_vec();
        init_code.extend(encode_constructor_args(&deployment.constructor_args));
        let init_code = Bytes::from(init_code);

        let tx_hash = match &self.credentials {
            SigningCredentials::LocalKey(signer) => self.send_signed(signer, init_code).await?,
            SigningCredentials::Unlocked => self.send_unlocked(init_code).await?,
        };

        tracing::info!(
            contract = %deployment.contract_name,
            tx_hash = %tx_hash,
            "Deployment transaction submitted, waiting for it to be mined..."
        );

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            anyhow::bail!(
                "Deployment transaction {} reverted in block {}",
                tx_hash,
                receipt.block_number
            );
        }

        let address = receipt
            .contract_address
            .with_context(|| format!("Receipt of {} has no contract address", tx_hash))?;

        Ok(DeploymentResult {
            contract_name: deployment.contract_name.clone(),
            address,
            transaction: TransactionHandle {
                hash: tx_hash,
                block_number: receipt.block_number,
            },
        })
    }

    async fn wait_for_confirmations<'a>(
        &'a self,
        result: &'a DeploymentResult,
        confirmations: u64,
    ) -> Result<()> {
        if confirmations <= 1 {
            return Ok(());
        }

        let target = confirmation_target(result.transaction.block_number, confirmations);

        tracing::info!(
            contract = %result.contract_name,
            confirmations,
            target_block = target,
            "Waiting for confirmations..."
        );

        rpc::poll_until(
            &format!("{} confirmations of {}", confirmations, result.contract_name),
            self.confirmation_timeout,
            self.poll_interval,
            || async move { Ok((self.block_number().await? >= target).then_some(())) },
        )
        .await
    }
}
