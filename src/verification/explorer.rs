//! Source verification through an Etherscan compatible explorer API.
//!
//! Verification is never part of a deployment's success: every failure is
//! logged and dropped by [`ExplorerVerifier::verify_best_effort`].

use std::time::Duration;

use alloy::primitives::{hex, Address, Bytes};
use deploy_core::core::env::EnvReader;
use derive_builder::Builder;
use eyre::{eyre, Context};
use serde::Deserialize;
use volmex_contracts::artifact::{ArtifactStore, ContractArtifact};

use crate::app::{config::ConfigBuildError, network::NetworkConfig};

pub const ENV_ETHERSCAN_API_KEY: &str = "ETHERSCAN_API_KEY";

const ALREADY_VERIFIED: &str = "already verified";
const PENDING: &str = "pending in queue";

#[derive(Debug, Clone, Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct VerifierConfig {
    #[builder(setter(into))]
    pub api_url: String,

    #[builder(setter(into))]
    pub api_key: String,

    #[builder(default = "Duration::from_secs(5)")]
    pub poll_interval: Duration,

    #[builder(default = "12")]
    pub max_polls: usize,
}

impl VerifierConfig {
    #[must_use]
    pub fn builder() -> VerifierConfigBuilder {
        VerifierConfigBuilder::default()
    }

    /// Verifier for `network`, or none when the network has no explorer or
    /// no API key is configured.
    pub fn from_env(
        env: &EnvReader,
        network: &NetworkConfig,
    ) -> Result<Option<Self>, ConfigBuildError> {
        let Some(api_url) = network.explorer_api_url.clone() else {
            return Ok(None);
        };
        let Some(api_key) = env.optional(ENV_ETHERSCAN_API_KEY)? else {
            return Ok(None);
        };
        Self::builder()
            .api_url(api_url)
            .api_key(api_key)
            .try_build()
            .map(Some)
    }
}

/// Everything the explorer needs to rebuild a deployed contract.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub address: Address,
    pub contract_name: String,
    pub compiler_version: String,
    pub standard_json_input: String,
    pub constructor_args: Bytes,
}

impl VerificationRequest {
    pub fn from_artifact(
        store: &ArtifactStore,
        artifact: &ContractArtifact,
        address: Address,
        constructor_args: Bytes,
    ) -> eyre::Result<Self> {
        let build_info = store
            .build_info(artifact)
            .with_context(|| format!("No compiler input for {}", artifact.name))?;

        Ok(Self {
            address,
            contract_name: artifact.qualified_name(),
            compiler_version: format!("v{}", build_info.solc_long_version),
            standard_json_input: serde_json::to_string(&build_info.input)?,
            constructor_args,
        })
    }

    fn form(&self, api_key: &str) -> Vec<(&'static str, String)> {
        vec![
            ("apikey", api_key.to_owned()),
            ("module", String::from("contract")),
            ("action", String::from("verifysourcecode")),
            ("contractaddress", self.address.to_string()),
            ("sourceCode", self.standard_json_input.clone()),
            ("codeformat", String::from("solidity-standard-json-input")),
            ("contractname", self.contract_name.clone()),
            ("compilerversion", self.compiler_version.clone()),
            // Misspelling is part of the explorer API.
            ("constructorArguements", hex::encode(&self.constructor_args)),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    Submitted(String),
    Pending,
    Verified,
    AlreadyVerified,
    Failed(String),
}

impl VerificationStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified | VerificationStatus::AlreadyVerified
        )
    }

    fn from_submit(response: &ExplorerResponse) -> Self {
        if response.status == "1" {
            VerificationStatus::Submitted(response.result.clone())
        } else if response.result.to_lowercase().contains(ALREADY_VERIFIED) {
            VerificationStatus::AlreadyVerified
        } else {
            VerificationStatus::Failed(format!("{}: {}", response.message, response.result))
        }
    }

    fn from_check(response: &ExplorerResponse) -> Self {
        let result = response.result.to_lowercase();
        if result.contains(ALREADY_VERIFIED) {
            VerificationStatus::AlreadyVerified
        } else if response.status == "1" {
            VerificationStatus::Verified
        } else if result.contains(PENDING) {
            VerificationStatus::Pending
        } else {
            VerificationStatus::Failed(response.result.clone())
        }
    }
}

pub struct ExplorerVerifier {
    config: VerifierConfig,
    client: reqwest::Client,
}

impl ExplorerVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn submit(&self, request: &VerificationRequest) -> eyre::Result<VerificationStatus> {
        let response: ExplorerResponse = self
            .client
            .post(&self.config.api_url)
            .form(&request.form(&self.config.api_key))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(VerificationStatus::from_submit(&response))
    }

    async fn check(&self, guid: &str) -> eyre::Result<VerificationStatus> {
        let response: ExplorerResponse = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("apikey", self.config.api_key.as_str()),
                ("module", "contract"),
                ("action", "checkverifystatus"),
                ("guid", guid),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(VerificationStatus::from_check(&response))
    }

    /// Submit `request` and poll until the explorer reaches a verdict.
    pub async fn verify(&self, request: &VerificationRequest) -> eyre::Result<VerificationStatus> {
        tracing::info!(
            address = %request.address,
            contract = %request.contract_name,
            "Submitting source verification"
        );

        let guid = match self.submit(request).await? {
            VerificationStatus::Submitted(guid) => guid,
            other => return Ok(other),
        };

        for _ in 0..self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;
            match self.check(&guid).await? {
                VerificationStatus::Pending => {
                    tracing::debug!(%guid, "Verification pending");
                }
                status => return Ok(status),
            }
        }

        Err(eyre!(
            "Verification {} still pending after {} polls",
            guid,
            self.config.max_polls
        ))
    }

    /// Verify and report success, logging instead of failing.
    pub async fn verify_best_effort(&self, request: &VerificationRequest) -> bool {
        match self.verify(request).await {
            Ok(status) if status.is_success() => {
                tracing::info!(
                    address = %request.address,
                    contract = %request.contract_name,
                    ?status,
                    "Source verified"
                );
                true
            }
            Ok(status) => {
                tracing::warn!(
                    address = %request.address,
                    contract = %request.contract_name,
                    ?status,
                    "Source verification rejected"
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    address = %request.address,
                    contract = %request.contract_name,
                    "Source verification failed: {:?}",
                    err
                );
                false
            }
        }
    }
}
