//! Protocol upgrades through the proxy admin.
//!
//! An upgrade must leave every readable protocol value untouched. The state
//! is captured before the upgrade and compared afterwards; any difference
//! fails the command even though the upgrade transaction itself succeeded.

use alloy::primitives::{Address, B256};
use eyre::eyre;
use volmex_contracts::{
    protocol::ProtocolSnapshot,
    proxy::{admin_of, implementation_of, ProxyAdminHandle},
    util::{has_code, DeployedContract},
};

use super::proposal::{UpgradeProposal, UpgradeProposer};
use crate::{app::config::UpgradeConfig, deployment::steps::DeployContext};

#[derive(Debug, Clone)]
pub struct UpgradeOutcome {
    pub proxy: Address,
    pub previous_implementation: Address,
    pub new_implementation: Address,
    pub tx_hash: B256,
    pub snapshot: ProtocolSnapshot,
}

pub struct UpgradeOrchestrator<'a> {
    ctx: &'a DeployContext,
    config: UpgradeConfig,
}

impl<'a> UpgradeOrchestrator<'a> {
    pub fn new(ctx: &'a DeployContext, config: UpgradeConfig) -> Self {
        Self { ctx, config }
    }

    async fn proxy_admin(&self) -> eyre::Result<ProxyAdminHandle> {
        let address = match self.config.proxy_admin {
            Some(address) => address,
            None => admin_of(&self.ctx.provider, self.config.proxy).await?,
        };
        if address.is_zero() || !has_code(&self.ctx.provider, address).await? {
            return Err(eyre!(
                "No proxy admin found for {}, set PROXY_ADMIN_ADDRESS",
                self.config.proxy
            ));
        }
        Ok(ProxyAdminHandle::new(address))
    }

    /// `IMPLEMENTATION_ADDRESS` when set, else a fresh deployment of the
    /// configured contract.
    async fn new_implementation(&self) -> eyre::Result<(Address, Option<DeployedContract>)> {
        if let Some(implementation) = self.config.implementation {
            if !has_code(&self.ctx.provider, implementation).await? {
                return Err(eyre!("No contract deployed at {}", implementation));
            }
            tracing::info!(%implementation, "Using prepared implementation");
            return Ok((implementation, None));
        }

        let (_, deployed) = self.ctx.deploy(&self.config.contract, &[]).await?;
        tracing::info!(
            implementation = %deployed.address,
            tx_hash = %deployed.tx_hash,
            "Deployed new {} implementation",
            self.config.contract
        );
        Ok((deployed.address, Some(deployed)))
    }

    /// Prepare the upgrade for the multisig. Nothing on chain changes apart
    /// from the new implementation being deployed.
    pub async fn propose_upgrade(
        &self,
        proposer: &(dyn UpgradeProposer + Send + Sync),
    ) -> eyre::Result<(UpgradeProposal, String)> {
        let proxy_admin = self.proxy_admin().await?;
        let current = implementation_of(&self.ctx.provider, self.config.proxy).await?;
        let (implementation, _) = self.new_implementation().await?;
        if implementation == current {
            return Err(eyre!(
                "Proxy {} already points at {}",
                self.config.proxy,
                implementation
            ));
        }

        let proposal = UpgradeProposal::new(
            self.ctx.network.clone(),
            self.ctx.chain_id,
            self.config.proxy,
            proxy_admin.address,
            current,
            implementation,
            self.config.contract.clone(),
            self.config.safe,
        );
        let location = proposer.propose(&proposal).await?;

        tracing::info!(
            proxy = %proposal.proxy,
            new_implementation = %proposal.new_implementation,
            "Upgrade proposal created at {}",
            location
        );
        Ok((proposal, location))
    }

    pub async fn execute_upgrade(&self) -> eyre::Result<UpgradeOutcome> {
        let proxy = self.config.proxy;
        let proxy_admin = self.proxy_admin().await?;

        let owner = proxy_admin.owner(&self.ctx.provider).await?;
        if owner != self.ctx.deployer {
            return Err(eyre!(
                "Proxy admin {} is owned by {}, propose the upgrade instead",
                proxy_admin.address,
                owner
            ));
        }

        let before = ProtocolSnapshot::read(&self.ctx.provider, proxy).await?;
        let previous_implementation = implementation_of(&self.ctx.provider, proxy).await?;

        let (new_implementation, _) = self.new_implementation().await?;
        if new_implementation == previous_implementation {
            return Err(eyre!(
                "Proxy {} already points at {}",
                proxy,
                new_implementation
            ));
        }

        let tx_hash = proxy_admin
            .upgrade(&self.ctx.provider, self.ctx.deployer, proxy, new_implementation)
            .await?;

        let current = implementation_of(&self.ctx.provider, proxy).await?;
        if current != new_implementation {
            return Err(eyre!(
                "Proxy {} points at {} after upgrade, expected {}",
                proxy,
                current,
                new_implementation
            ));
        }

        let after = ProtocolSnapshot::read(&self.ctx.provider, proxy).await?;
        check_preserved(&before, &after)?;

        tracing::info!(
            %proxy,
            %previous_implementation,
            %new_implementation,
            %tx_hash,
            "Upgrade complete, protocol state preserved"
        );

        Ok(UpgradeOutcome {
            proxy,
            previous_implementation,
            new_implementation,
            tx_hash,
            snapshot: after,
        })
    }
}

fn check_preserved(before: &ProtocolSnapshot, after: &ProtocolSnapshot) -> eyre::Result<()> {
    let changed = before.diff(after);
    if changed.is_empty() {
        return Ok(());
    }
    tracing::error!(?before, ?after, "Protocol state changed by upgrade");
    Err(eyre!(
        "Upgrade changed protocol state: {}",
        changed.join(", ")
    ))
}
