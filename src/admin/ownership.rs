//! Hand-over of every privileged role to the multisig.

use alloy::primitives::{Address, B256};
use eyre::eyre;
use volmex_contracts::{
    position_token::{has_role, hand_over_admin, TokenRole},
    protocol::{transfer_ownership, ProtocolSnapshot},
    proxy::{admin_of, ProxyAdminHandle},
};

use crate::{app::config::OwnershipConfig, deployment::steps::DeployContext};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    Sent(B256),
    AlreadyDone,
}

pub struct AdminOrchestrator<'a> {
    ctx: &'a DeployContext,
    config: OwnershipConfig,
}

impl<'a> AdminOrchestrator<'a> {
    pub fn new(ctx: &'a DeployContext, config: OwnershipConfig) -> Self {
        Self { ctx, config }
    }

    async fn proxy_admin(&self) -> eyre::Result<ProxyAdminHandle> {
        if let Some(address) = self.config.proxy_admin {
            return Ok(ProxyAdminHandle::new(address));
        }
        let protocol = self.config.protocol.ok_or_else(|| {
            eyre!("Set PROXY_ADMIN_ADDRESS or VOLMEX_PROTOCOL_ADDRESS to locate the proxy admin")
        })?;
        Ok(ProxyAdminHandle::new(
            admin_of(&self.ctx.provider, protocol).await?,
        ))
    }

    pub async fn transfer_proxy_admin_ownership(&self) -> eyre::Result<Transfer> {
        let proxy_admin = self.proxy_admin().await?;
        let safe = self.config.safe;

        let owner = proxy_admin.owner(&self.ctx.provider).await?;
        if owner == safe {
            tracing::info!(
                proxy_admin = %proxy_admin.address,
                %safe,
                "Proxy admin already owned by multisig"
            );
            return Ok(Transfer::AlreadyDone);
        }
        if owner != self.ctx.deployer {
            return Err(eyre!(
                "Proxy admin {} is owned by {}, not by {}",
                proxy_admin.address,
                owner,
                self.ctx.deployer
            ));
        }

        let tx_hash = proxy_admin
            .transfer_ownership(&self.ctx.provider, self.ctx.deployer, safe)
            .await?;
        tracing::info!(
            proxy_admin = %proxy_admin.address,
            %safe,
            %tx_hash,
            "Proxy admin ownership transferred"
        );
        Ok(Transfer::Sent(tx_hash))
    }

    pub async fn transfer_protocol_ownership(&self) -> eyre::Result<Transfer> {
        let protocol = self
            .config
            .protocol
            .ok_or_else(|| eyre!("VOLMEX_PROTOCOL_ADDRESS is required"))?;
        let safe = self.config.safe;

        let snapshot = ProtocolSnapshot::read(&self.ctx.provider, protocol).await?;
        if snapshot.owner == safe {
            tracing::info!(%protocol, %safe, "Protocol already owned by multisig");
            return Ok(Transfer::AlreadyDone);
        }

        let tx_hash =
            transfer_ownership(&self.ctx.provider, protocol, self.ctx.deployer, safe).await?;
        tracing::info!(%protocol, %safe, %tx_hash, "Protocol ownership transferred");
        Ok(Transfer::Sent(tx_hash))
    }

    /// Admin role of both position tokens moves to the multisig. Returns the
    /// tokens handed over by this call.
    pub async fn hand_over_token_admin(&self) -> eyre::Result<Vec<Address>> {
        let safe = self.config.safe;
        let mut transfers = Vec::new();

        for token in self.config.tokens()? {
            let deployer_is_admin =
                has_role(&self.ctx.provider, token, TokenRole::Admin, self.ctx.deployer).await?;
            let safe_is_admin = has_role(&self.ctx.provider, token, TokenRole::Admin, safe).await?;

            if safe_is_admin && !deployer_is_admin {
                tracing::info!(%token, %safe, "Token admin already handed over");
                continue;
            }
            if !deployer_is_admin {
                return Err(eyre!(
                    "{} is not an admin of token {}",
                    self.ctx.deployer,
                    token
                ));
            }

            hand_over_admin(&self.ctx.provider, token, self.ctx.deployer, safe).await?;
            transfers.push(token);
        }

        Ok(transfers)
    }

    /// Protocol ownership followed by both token admin roles.
    pub async fn transfer_roles(&self) -> eyre::Result<()> {
        self.transfer_protocol_ownership().await?;
        let handed_over = self.hand_over_token_admin().await?;
        tracing::info!(
            tokens = handed_over.len(),
            safe = %self.config.safe,
            "Roles transferred"
        );
        Ok(())
    }
}
