use alloy::{
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, B256},
    providers::{PendingTransactionBuilder, Provider},
    rpc::types::{TransactionReceipt, TransactionRequest},
};
use serde::{Deserialize, Serialize};

use crate::{artifact::ContractArtifact, error::ChainError};

/// Address and origin of a contract created by the tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

impl DeployedContract {
    pub fn from_receipt(action: &str, receipt: &TransactionReceipt) -> Result<Self, ChainError> {
        let address = receipt.contract_address.ok_or_else(|| ChainError::Rpc {
            action: action.to_owned(),
            message: format!(
                "No contract address in receipt {}",
                receipt.transaction_hash
            ),
        })?;
        Ok(Self {
            address,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }
}

/// Wait for one confirmation of a sent transaction and require success.
///
/// `sent` is the raw outcome of `.send().await` on a contract call, so that
/// a revert caught during gas estimation and one found in the receipt end
/// up as the same [`ChainError::Reverted`].
pub async fn confirm(
    action: &str,
    sent: Result<PendingTransactionBuilder<Ethereum>, alloy::contract::Error>,
) -> Result<TransactionReceipt, ChainError> {
    let pending = sent.map_err(|err| ChainError::from_contract_error(action, err))?;
    wait_receipt(action, pending).await
}

async fn wait_receipt(
    action: &str,
    pending: PendingTransactionBuilder<Ethereum>,
) -> Result<TransactionReceipt, ChainError> {
    let tx_hash = *pending.tx_hash();
    tracing::debug!(%tx_hash, "Waiting for {}", action);

    let receipt = pending
        .get_receipt()
        .await
        .map_err(|err| ChainError::Rpc {
            action: action.to_owned(),
            message: err.to_string(),
        })?;

    if !receipt.status() {
        return Err(ChainError::Reverted {
            action: action.to_owned(),
            reason: format!("transaction {} failed", receipt.transaction_hash),
        });
    }

    tracing::info!(
        tx_hash = %receipt.transaction_hash,
        block_number = ?receipt.block_number,
        gas_used = receipt.gas_used,
        "{} confirmed",
        action
    );
    Ok(receipt)
}

/// Contract creation from artifact bytecode with ABI encoded constructor
/// arguments appended.
pub fn creation_input(artifact: &ContractArtifact, constructor_args: &[u8]) -> eyre::Result<Bytes> {
    let code = artifact.creation_code()?;
    let mut input = Vec::with_capacity(code.len() + constructor_args.len());
    input.extend_from_slice(code);
    input.extend_from_slice(constructor_args);
    Ok(Bytes::from(input))
}

pub async fn deploy_contract(
    provider: &impl Provider,
    from: Address,
    artifact: &ContractArtifact,
    constructor_args: &[u8],
) -> eyre::Result<DeployedContract> {
    let action = format!("deploy {}", artifact.name);
    let tx = TransactionRequest::default()
        .with_from(from)
        .with_deploy_code(creation_input(artifact, constructor_args)?);

    let pending = provider
        .send_transaction(tx)
        .await
        .map_err(|err| ChainError::from_transport_error(&action, err))?;

    let receipt = wait_receipt(&action, pending).await?;
    let deployed = DeployedContract::from_receipt(&action, &receipt)?;

    tracing::info!(
        contract = %artifact.name,
        address = %deployed.address,
        tx_hash = %deployed.tx_hash,
        "Deployed"
    );
    Ok(deployed)
}

/// Whether `address` has code, i.e. is a deployed contract.
pub async fn has_code(provider: &impl Provider, address: Address) -> eyre::Result<bool> {
    let code = provider.get_code_at(address).await?;
    Ok(!code.is_empty())
}
