use std::path::{Path, PathBuf};

use alloy::primitives::{Address, U256};
use eyre::{eyre, Context};
use volmex_contracts::{
    factory::{FactoryVersion, TokenPair},
    protocol::{ProtocolParams, ProtocolSnapshot},
};

use crate::{
    app::config::RegisterConfig,
    deployment::{
        manifest::{DeployStep, DeploymentManifest, DeploymentRecord},
        steps::DeployContext,
    },
};

#[derive(Debug, Clone)]
pub struct RegisteredProtocol {
    pub protocol: Address,
    pub implementation: Address,
    pub index_count: U256,
    pub snapshot: ProtocolSnapshot,
}

async fn save(manifest: &DeploymentManifest, path: &Path) -> eyre::Result<()> {
    manifest
        .save(path)
        .await
        .with_context(|| format!("Failed to save {}", path.display()))
}

/// Deploy a protocol for a token pair that already exists and register it
/// with the factory that created the pair.
pub async fn register_protocol(
    ctx: &DeployContext,
    config: &RegisterConfig,
    manifest_path: PathBuf,
) -> eyre::Result<(RegisteredProtocol, DeploymentManifest)> {
    let factory = ctx
        .attach_factory(
            config.factory,
            config.factory_version,
            &ctx.contracts.index_factory,
        )
        .await?;
    if !factory.version.registers_explicitly() {
        return Err(eyre!(
            "Factory {} deploys its own protocols, use deploy instead",
            factory.address
        ));
    }

    let pair = TokenPair::new(
        config.volatility_token,
        config.inverse_volatility_token,
        config.index_count,
    )?;
    if factory.version == FactoryVersion::V2 && pair.index_count.is_none() {
        return Err(eyre!(
            "INDEX_COUNT is required to register with factory {}",
            factory.address
        ));
    }

    let mut manifest = DeploymentManifest::new(ctx.network.clone(), ctx.chain_id, ctx.deployer);

    let (proxy_admin, deployed_admin) = ctx
        .proxy_admin(config.proxy_admin, Some(config.factory))
        .await?;
    if let Some(deployed) = deployed_admin {
        manifest.record(DeploymentRecord::deployed(
            DeployStep::ProxyAdmin,
            ctx.contracts.proxy_admin.clone(),
            &deployed,
        ));
        save(&manifest, &manifest_path).await?;
    }

    let (_, implementation) = ctx.deploy(&config.protocol_contract, &[]).await?;
    manifest.record(DeploymentRecord::deployed(
        DeployStep::ProtocolImplementation,
        config.protocol_contract.clone(),
        &implementation,
    ));
    save(&manifest, &manifest_path).await?;

    let params = ProtocolParams::new(
        config.collateral_token,
        &pair,
        config.minimum_collateral_qty,
        config.volatility_cap_ratio,
    );
    let (proxy, proxy_args) = ctx
        .deploy_protocol_proxy(implementation.address, &params, proxy_admin)
        .await?;
    manifest.record(
        DeploymentRecord::deployed(
            DeployStep::ProtocolProxy,
            config.protocol_contract.clone(),
            &proxy,
        )
        .with_constructor_args(proxy_args),
    );
    save(&manifest, &manifest_path).await?;

    let registration = factory
        .register_index(
            &ctx.provider,
            ctx.deployer,
            proxy.address,
            &pair,
            &config.collateral_symbol,
        )
        .await?;
    manifest.record(
        DeploymentRecord::new(
            DeployStep::Registration,
            config.protocol_contract.clone(),
            proxy.address,
        )
        .with_tx(registration.tx_hash)
        .with_index_count(Some(registration.index_count)),
    );
    save(&manifest, &manifest_path).await?;

    let snapshot = ctx
        .check_deployment(
            proxy.address,
            &params,
            Some((&factory, registration.index_count)),
        )
        .await?;

    if config.verify {
        ctx.verify(
            &config.protocol_contract,
            implementation.address,
            Default::default(),
        )
        .await;
    }

    Ok((
        RegisteredProtocol {
            protocol: proxy.address,
            implementation: implementation.address,
            index_count: registration.index_count,
            snapshot,
        },
        manifest,
    ))
}
