//! Persisted record of a deployment.
//!
//! Each completed step is written to disk as soon as it is confirmed. A run
//! interrupted after step N can be resumed from the manifest without
//! repeating steps 1..N.

use std::{fmt, path::Path};

use alloy::primitives::{Address, Bytes, B256, U256};
use chrono::{DateTime, Utc};
use deploy_core::core::json_file_async::{read_from_json_file_async, write_json_to_file_async};
use eyre::eyre;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use volmex_contracts::util::DeployedContract;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeployStep {
    CollateralToken,
    PositionTokenImplementation,
    ProxyAdmin,
    /// Factory deployed without a proxy.
    IndexFactory,
    IndexFactoryImplementation,
    IndexFactoryProxy,
    VolatilityToken,
    InverseVolatilityToken,
    TokenAdminGrant,
    ProtocolImplementation,
    ProtocolProxy,
    FeeUpdate,
    Registration,
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub step: DeployStep,
    pub contract: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_count: Option<U256>,
    /// ABI encoded constructor arguments, kept for source verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor_args: Option<Bytes>,
    pub recorded_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(step: DeployStep, contract: impl Into<String>, address: Address) -> Self {
        Self {
            step,
            contract: contract.into(),
            address,
            tx_hash: None,
            block_number: None,
            index_count: None,
            constructor_args: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn deployed(
        step: DeployStep,
        contract: impl Into<String>,
        deployed: &DeployedContract,
    ) -> Self {
        Self {
            tx_hash: Some(deployed.tx_hash),
            block_number: deployed.block_number,
            ..Self::new(step, contract, deployed.address)
        }
    }

    pub fn with_tx(mut self, tx_hash: B256) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }

    pub fn with_constructor_args(mut self, args: Bytes) -> Self {
        self.constructor_args = Some(args);
        self
    }

    pub fn with_index_count(mut self, index_count: Option<U256>) -> Self {
        self.index_count = index_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentManifest {
    pub network: String,
    pub chain_id: u64,
    pub deployer: Address,
    pub records: Vec<DeploymentRecord>,
}

impl DeploymentManifest {
    pub fn new(network: impl Into<String>, chain_id: u64, deployer: Address) -> Self {
        Self {
            network: network.into(),
            chain_id,
            deployer,
            records: Vec::new(),
        }
    }

    pub fn find(&self, step: DeployStep) -> Option<&DeploymentRecord> {
        self.records.iter().find(|r| r.step == step)
    }

    pub fn address_of(&self, step: DeployStep) -> Option<Address> {
        self.find(step).map(|r| r.address)
    }

    /// Add `record`, replacing an earlier record of the same step.
    pub fn record(&mut self, record: DeploymentRecord) {
        self.records.retain(|r| r.step != record.step);
        self.records.push(record);
    }

    /// Load a previous manifest to resume from, or start a new one.
    ///
    /// A manifest recorded on another chain is refused rather than resumed.
    pub async fn load_or_new(
        path: &Path,
        resume: bool,
        network: &str,
        chain_id: u64,
        deployer: Address,
    ) -> eyre::Result<Self> {
        if !resume || !path.exists() {
            return Ok(Self::new(network, chain_id, deployer));
        }

        let manifest: Self = read_from_json_file_async(path).await?;
        if manifest.chain_id != chain_id {
            return Err(eyre!(
                "Manifest {} was recorded on chain {}, connected to {}",
                path.display(),
                manifest.chain_id,
                chain_id
            ));
        }
        if manifest.deployer != deployer {
            tracing::warn!(
                recorded = %manifest.deployer,
                current = %deployer,
                "Resuming a deployment started by another account"
            );
        }

        tracing::info!(
            "Resuming from {} with completed steps: {}",
            path.display(),
            manifest.records.iter().map(|r| r.step).join(", ")
        );
        Ok(manifest)
    }

    pub async fn load(path: &Path) -> eyre::Result<Self> {
        read_from_json_file_async(path).await
    }

    pub async fn save(&self, path: &Path) -> eyre::Result<()> {
        write_json_to_file_async(path, self).await
    }
}

impl fmt::Display for DeploymentManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Deployment on {} (chain {}) by {}",
            self.network, self.chain_id, self.deployer
        )?;
        for record in &self.records {
            write!(
                f,
                "  {:<28} {:<28} {}",
                record.step.to_string(),
                record.contract,
                record.address
            )?;
            if let Some(index_count) = record.index_count {
                write!(f, " (index {})", index_count)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
