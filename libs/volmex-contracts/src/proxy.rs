//! Transparent proxies and their `ProxyAdmin`.

use alloy::{
    primitives::{b256, Address, Bytes, B256, U256},
    providers::Provider,
    sol_types::{SolCall, SolConstructor},
};

use crate::{
    artifact::ContractArtifact,
    contracts::{ProxyAdmin, TransparentUpgradeableProxy},
    error::ChainError,
    util::{confirm, deploy_contract, DeployedContract},
};

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const IMPLEMENTATION_SLOT: B256 =
    b256!("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// `bytes32(uint256(keccak256("eip1967.proxy.admin")) - 1)`
pub const ADMIN_SLOT: B256 =
    b256!("0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103");

pub fn address_from_slot(value: U256) -> Address {
    Address::from_word(B256::from(value.to_be_bytes::<32>()))
}

pub async fn read_address_slot(
    provider: &impl Provider,
    proxy: Address,
    slot: B256,
) -> eyre::Result<Address> {
    let value = provider
        .get_storage_at(proxy, U256::from_be_bytes(slot.0))
        .await?;
    Ok(address_from_slot(value))
}

pub async fn implementation_of(provider: &impl Provider, proxy: Address) -> eyre::Result<Address> {
    read_address_slot(provider, proxy, IMPLEMENTATION_SLOT).await
}

pub async fn admin_of(provider: &impl Provider, proxy: Address) -> eyre::Result<Address> {
    read_address_slot(provider, proxy, ADMIN_SLOT).await
}

pub fn proxy_constructor_args(logic: Address, admin: Address, data: Bytes) -> Bytes {
    TransparentUpgradeableProxy::constructorCall {
        _logic: logic,
        admin_: admin,
        _data: data,
    }
    .abi_encode()
    .into()
}

/// Deploy a transparent proxy in front of `logic`, calling `init` through it
/// in the same transaction.
pub async fn deploy_proxy(
    provider: &impl Provider,
    from: Address,
    proxy_artifact: &ContractArtifact,
    logic: Address,
    admin: Address,
    init: Bytes,
) -> eyre::Result<(DeployedContract, Bytes)> {
    let args = proxy_constructor_args(logic, admin, init);
    let deployed = deploy_contract(provider, from, proxy_artifact, &args).await?;
    tracing::info!(
        proxy = %deployed.address,
        implementation = %logic,
        proxy_admin = %admin,
        "Proxy deployed"
    );
    Ok((deployed, args))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyAdminHandle {
    pub address: Address,
}

impl ProxyAdminHandle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Calldata of `upgrade(proxy, implementation)` sent to the proxy admin.
    pub fn upgrade_calldata(proxy: Address, implementation: Address) -> Bytes {
        ProxyAdmin::upgradeCall {
            proxy,
            implementation,
        }
        .abi_encode()
        .into()
    }

    pub async fn owner(&self, provider: &impl Provider) -> Result<Address, ChainError> {
        ProxyAdmin::new(self.address, provider)
            .owner()
            .call()
            .await
            .map_err(|err| ChainError::from_contract_error("ProxyAdmin.owner", err))
    }

    pub async fn upgrade(
        &self,
        provider: &impl Provider,
        from: Address,
        proxy: Address,
        implementation: Address,
    ) -> Result<B256, ChainError> {
        let sent = ProxyAdmin::new(self.address, provider)
            .upgrade(proxy, implementation)
            .from(from)
            .send()
            .await;
        let receipt = confirm(&format!("upgrade({}, {})", proxy, implementation), sent).await?;
        Ok(receipt.transaction_hash)
    }

    pub async fn transfer_ownership(
        &self,
        provider: &impl Provider,
        from: Address,
        new_owner: Address,
    ) -> Result<B256, ChainError> {
        let sent = ProxyAdmin::new(self.address, provider)
            .transferOwnership(new_owner)
            .from(from)
            .send()
            .await;
        let receipt = confirm(
            &format!("ProxyAdmin.transferOwnership({})", new_owner),
            sent,
        )
        .await?;
        Ok(receipt.transaction_hash)
    }
}
