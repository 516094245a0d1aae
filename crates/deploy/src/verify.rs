//! Source verification on Etherscan-compatible block explorers.

use std::{future::Future, time::Duration};

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};
use serde::Deserialize;
use url::Url;

use crate::{ArtifactStore, EtherscanConfig, NetworkProfile, encode_constructor_args, rpc};

/// What the explorer needs to match a deployed contract with its source.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub contract_name: String,
    pub address: Address,
    pub source_identifier: String,
    pub constructor_args: Vec<DynSolValue>,
}

/// Successful verification outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The explorer accepted and verified the source.
    Verified,
    /// The contract was verified before; nothing was done.
    AlreadyVerified,
}

/// Verification failures. None of them abort a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("no explorer API key configured for network {0}")]
    MissingApiKey(String),
    #[error("verification rejected: {0}")]
    Rejected(String),
    #[error("verification request failed: {0}")]
    Request(String),
}

impl VerificationError {
    fn request(err: impl std::fmt::Display) -> Self {
        Self::Request(err.to_string())
    }
}

/// Requests third-party source verification of deployed contracts.
pub trait Verifier: Send + Sync {
    fn verify<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> impl Future<Output = Result<VerificationOutcome, VerificationError>> + Send + 'a;
}

/// Classify an explorer failure message.
///
/// Explorers only report the "already verified" case through the message text, so this is
/// the single place that inspects it.
pub fn classify_rejection(message: &str) -> Result<VerificationOutcome, VerificationError> {
    if message.to_lowercase().contains("already verified") {
        Ok(VerificationOutcome::AlreadyVerified)
    } else {
        Err(VerificationError::Rejected(message.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl EtherscanResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }

    fn is_pending(&self) -> bool {
        self.result.to_lowercase().contains("pending in queue")
    }
}

/// [`Verifier`] backed by the Etherscan v2 API.
#[derive(Debug, Clone)]
pub struct EtherscanVerifier {
    client: reqwest::Client,
    api_url: Url,
    api_key: Option<String>,
    network: String,
    chain_id: u64,
    artifacts: ArtifactStore,
    poll_interval: Duration,
    max_status_checks: u32,
}

impl EtherscanVerifier {
    /// Create a verifier for the given network.
    pub fn new(
        config: &EtherscanConfig,
        profile: &NetworkProfile,
        artifacts: ArtifactStore,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: rpc::create_client()?,
            api_url: config.api_url.clone(),
            api_key: config.api_keys.get(&profile.name).cloned(),
            network: profile.name.clone(),
            chain_id: profile.chain_id,
            artifacts,
            poll_interval: config.poll_interval(),
            max_status_checks: config.max_status_checks,
        })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<EtherscanResponse, VerificationError> {
        request
            .query(&[("chainid", self.chain_id.to_string())])
            .send()
            .await
            .map_err(VerificationError::request)?
            .json()
            .await
            .map_err(VerificationError::request)
    }

    async fn submit(
        &self,
        api_key: &str,
        request: &VerificationRequest,
    ) -> Result<EtherscanResponse, VerificationError> {
        let build_info = self
            .artifacts
            .load_build_info(&request.source_identifier)
            .map_err(|err| VerificationError::Request(format!("{err:#}")))?;

        let source_code =
            serde_json::to_string(&build_info.input).map_err(VerificationError::request)?;
        let constructor_args = hex::encode(encode_constructor_args(&request.constructor_args));
        let address = request.address.to_string();
        let compiler_version = build_info.compiler_version();

        let form = [
            ("apikey", api_key),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source_code.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", request.source_identifier.as_str()),
            ("compilerversion", compiler_version.as_str()),
            // Etherscan's spelling.
            ("constructorArguements", constructor_args.as_str()),
        ];

        self.send(self.client.post(self.api_url.clone()).form(&form))
            .await
    }

    async fn poll_status(
        &self,
        api_key: &str,
        guid: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        for attempt in 1..=self.max_status_checks {
            tokio::time::sleep(self.poll_interval).await;

            let response = self
                .send(self.client.get(self.api_url.clone()).query(&[
                    ("apikey", api_key),
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                ]))
                .await?;

            if response.is_pending() {
                tracing::debug!(guid, attempt, "Verification pending in queue");
                continue;
            }

            if response.is_ok() {
                return Ok(VerificationOutcome::Verified);
            }

            return classify_rejection(&response.result);
        }

        Err(VerificationError::Request(format!(
            "verification {} still pending after {} checks",
            guid, self.max_status_checks
        )))
    }
}

impl Verifier for EtherscanVerifier {
    async fn verify<'a>(
        &'a self,
        request: &'a VerificationRequest,
    ) -> Result<VerificationOutcome, VerificationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| VerificationError::MissingApiKey(self.network.clone()))?;

        let response = self.submit(api_key, request).await?;
        if !response.is_ok() {
            tracing::debug!(
                contract = %request.contract_name,
                message = %response.message,
                result = %response.result,
                "Explorer refused verification request"
            );
            return classify_rejection(&response.result);
        }

        tracing::info!(
            contract = %request.contract_name,
            guid = %response.result,
            "Verification request accepted, waiting for the explorer..."
        );

        self.poll_status(api_key, &response.result).await
    }
}
