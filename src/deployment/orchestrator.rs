use std::path::PathBuf;

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};
use eyre::{eyre, Context};
use itertools::Itertools;
use volmex_contracts::{
    contracts::IStandaloneIndexFactory,
    factory::{FactoryVersion, IndexFactoryHandle, TokenPair},
    position_token::{grant_role, inverse_token_names, matic_constructor_args, TokenRole},
    protocol::{update_fees, ProtocolParams, ProtocolSnapshot},
    proxy::deploy_proxy,
};

use super::{
    manifest::{DeployStep, DeploymentManifest, DeploymentRecord},
    steps::DeployContext,
};
use crate::app::config::{DeployConfig, TokenMode};

/// Steps whose records point at contracts this run deployed from an artifact
/// and which can be submitted for source verification.
const VERIFIABLE_STEPS: &[DeployStep] = &[
    DeployStep::CollateralToken,
    DeployStep::PositionTokenImplementation,
    DeployStep::ProxyAdmin,
    DeployStep::IndexFactory,
    DeployStep::IndexFactoryImplementation,
    DeployStep::VolatilityToken,
    DeployStep::InverseVolatilityToken,
    DeployStep::ProtocolImplementation,
];

/// How the index factory comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryPlan {
    /// Configured address, nothing is deployed.
    Attached(Address),
    /// Deployed without a proxy.
    Direct,
    /// Implementation behind a transparent proxy. `position_token` when the
    /// factory clones a position token implementation passed at initialize.
    Proxied { position_token: bool },
}

/// Steps a deployment runs for its configuration and factory version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentPlan {
    pub version: FactoryVersion,
    pub token_mode: TokenMode,
    pub factory: FactoryPlan,
    pub fees: bool,
}

impl DeploymentPlan {
    pub fn new(config: &DeployConfig, version: FactoryVersion) -> Self {
        let factory = match (config.factory, config.token_mode, version) {
            (Some(address), _, _) => FactoryPlan::Attached(address),
            (None, TokenMode::Factory, FactoryVersion::V1 | FactoryVersion::V2) => {
                FactoryPlan::Direct
            }
            (None, TokenMode::Factory, FactoryVersion::V3) => FactoryPlan::Proxied {
                position_token: true,
            },
            (None, TokenMode::Standalone { .. }, _) => FactoryPlan::Proxied {
                position_token: false,
            },
        };
        Self {
            version,
            token_mode: config.token_mode,
            factory,
            fees: config.fees.is_some(),
        }
    }

    /// Steps in the order they are recorded.
    pub fn steps(&self) -> Vec<DeployStep> {
        let mut steps = vec![DeployStep::CollateralToken];

        match self.factory {
            FactoryPlan::Attached(_) => steps.push(DeployStep::IndexFactoryProxy),
            FactoryPlan::Direct => steps.push(DeployStep::IndexFactory),
            FactoryPlan::Proxied { position_token } => {
                if position_token {
                    steps.push(DeployStep::PositionTokenImplementation);
                }
                steps.extend([
                    DeployStep::ProxyAdmin,
                    DeployStep::IndexFactoryImplementation,
                    DeployStep::IndexFactoryProxy,
                ]);
            }
        }

        steps.extend([
            DeployStep::VolatilityToken,
            DeployStep::InverseVolatilityToken,
        ]);

        if self.version == FactoryVersion::V1 {
            steps.extend([DeployStep::ProtocolProxy, DeployStep::Registration]);
        } else {
            if matches!(self.token_mode, TokenMode::Standalone { .. }) {
                steps.push(DeployStep::TokenAdminGrant);
            }
            if !steps.contains(&DeployStep::ProxyAdmin) {
                steps.push(DeployStep::ProxyAdmin);
            }
            steps.extend([
                DeployStep::ProtocolImplementation,
                DeployStep::ProtocolProxy,
                DeployStep::Registration,
            ]);
        }

        if self.fees {
            steps.push(DeployStep::FeeUpdate);
        }
        steps
    }

    /// Steps still to run: everything from the first step `manifest` has no
    /// record of.
    pub fn pending(&self, manifest: &DeploymentManifest) -> Vec<DeployStep> {
        self.steps()
            .into_iter()
            .skip_while(|step| manifest.find(*step).is_some())
            .collect()
    }
}

/// Token pair of an earlier run, once both tokens are recorded.
pub fn recorded_pair(manifest: &DeploymentManifest) -> eyre::Result<Option<TokenPair>> {
    let (Some(vol), Some(ivol)) = (
        manifest.find(DeployStep::VolatilityToken),
        manifest.find(DeployStep::InverseVolatilityToken),
    ) else {
        return Ok(None);
    };
    Ok(Some(TokenPair::new(vol.address, ivol.address, vol.index_count)?))
}

/// Pair, protocol and index count of an earlier `createIndex`.
pub fn recorded_index(
    manifest: &DeploymentManifest,
) -> eyre::Result<Option<(TokenPair, Address, U256)>> {
    let Some(protocol) = manifest.find(DeployStep::ProtocolProxy) else {
        return Ok(None);
    };
    let Some(pair) = recorded_pair(manifest)? else {
        return Ok(None);
    };
    let index_count = protocol
        .index_count
        .ok_or_else(|| eyre!("Recorded index {} has no index count", protocol.address))?;
    Ok(Some((pair, protocol.address, index_count)))
}

/// Index count of an earlier registration.
pub fn recorded_registration(manifest: &DeploymentManifest) -> eyre::Result<Option<U256>> {
    manifest
        .find(DeployStep::Registration)
        .map(|record| {
            record
                .index_count
                .ok_or_else(|| eyre!("Recorded registration has no index count"))
        })
        .transpose()
}

#[derive(Debug, Clone)]
pub struct DeploymentSummary {
    pub collateral: Address,
    pub factory: IndexFactoryHandle,
    pub pair: TokenPair,
    pub protocol: Address,
    pub index_count: Option<U256>,
    pub snapshot: ProtocolSnapshot,
}

/// Runs the deployment phases in order, persisting every completed step.
pub struct DeploymentOrchestrator<'a> {
    ctx: &'a DeployContext,
    config: DeployConfig,
    manifest: DeploymentManifest,
    manifest_path: PathBuf,
}

impl<'a> DeploymentOrchestrator<'a> {
    pub fn new(
        ctx: &'a DeployContext,
        config: DeployConfig,
        manifest: DeploymentManifest,
        manifest_path: PathBuf,
    ) -> Self {
        Self {
            ctx,
            config,
            manifest,
            manifest_path,
        }
    }

    async fn commit(&mut self, record: DeploymentRecord) -> eyre::Result<()> {
        tracing::info!(
            step = %record.step,
            contract = %record.contract,
            address = %record.address,
            tx_hash = ?record.tx_hash,
            "Step completed"
        );
        self.manifest.record(record);
        self.manifest
            .save(&self.manifest_path)
            .await
            .with_context(|| format!("Failed to save {}", self.manifest_path.display()))
    }

    fn completed(&self, step: DeployStep) -> Option<DeploymentRecord> {
        let record = self.manifest.find(step).cloned()?;
        tracing::info!(%step, address = %record.address, "Reusing recorded step");
        Some(record)
    }

    pub async fn run(mut self) -> eyre::Result<(DeploymentSummary, DeploymentManifest)> {
        let collateral = self.collateral().await?;
        let factory = self.factory().await?;

        let pending = DeploymentPlan::new(&self.config, factory.version).pending(&self.manifest);
        tracing::info!(
            factory_version = %factory.version,
            pending = %pending.iter().join(", "),
            "Deployment plan"
        );

        let (pair, protocol, index_count) = match factory.version {
            FactoryVersion::V1 => self.create_index(&factory, collateral).await?,
            FactoryVersion::V2 | FactoryVersion::V3 => {
                let pair = self.tokens(&factory).await?;
                let protocol = self.protocol(collateral, &pair).await?;
                let index_count = self.register(&factory, protocol, &pair).await?;
                (pair, protocol, index_count)
            }
        };

        self.update_fees(protocol).await?;

        let params = ProtocolParams::new(
            collateral,
            &pair,
            self.config.minimum_collateral_qty,
            self.config.volatility_cap_ratio,
        );
        let snapshot = self
            .ctx
            .check_deployment(protocol, &params, Some((&factory, index_count)))
            .await?;

        if self.config.verify {
            self.verify_all().await;
        }

        let summary = DeploymentSummary {
            collateral,
            factory,
            pair,
            protocol,
            index_count: Some(index_count),
            snapshot,
        };
        Ok((summary, self.manifest))
    }

    async fn collateral(&mut self) -> eyre::Result<Address> {
        if let Some(address) = self.config.collateral_token {
            tracing::info!(collateral = %address, "Using configured collateral token");
            if self.manifest.address_of(DeployStep::CollateralToken) != Some(address) {
                let symbol = self.config.collateral_symbol.clone();
                self.commit(DeploymentRecord::new(
                    DeployStep::CollateralToken,
                    symbol,
                    address,
                ))
                .await?;
            }
            return Ok(address);
        }

        if let Some(record) = self.completed(DeployStep::CollateralToken) {
            return Ok(record.address);
        }

        let name = self.config.contracts.collateral.clone();
        let (_, deployed) = self.ctx.deploy(&name, &[]).await?;
        self.commit(DeploymentRecord::deployed(
            DeployStep::CollateralToken,
            name,
            &deployed,
        ))
        .await?;
        Ok(deployed.address)
    }

    fn factory_artifact(&self) -> String {
        match self.config.token_mode {
            TokenMode::Factory => self.config.contracts.index_factory.clone(),
            TokenMode::Standalone { .. } => self.config.contracts.standalone_factory.clone(),
        }
    }

    async fn factory(&mut self) -> eyre::Result<IndexFactoryHandle> {
        let artifact_name = self.factory_artifact();
        let version = self
            .ctx
            .factory_version(self.config.factory_version, &artifact_name)?;

        let plan = DeploymentPlan::new(&self.config, version);
        if let FactoryPlan::Attached(address) = plan.factory {
            let factory = self
                .ctx
                .attach_factory(address, Some(version), &artifact_name)
                .await?;
            if self.manifest.address_of(DeployStep::IndexFactoryProxy) != Some(address) {
                self.commit(DeploymentRecord::new(
                    DeployStep::IndexFactoryProxy,
                    artifact_name,
                    address,
                ))
                .await?;
            }
            return Ok(factory);
        }

        if let Some(record) = self
            .completed(DeployStep::IndexFactoryProxy)
            .or_else(|| self.completed(DeployStep::IndexFactory))
        {
            return Ok(IndexFactoryHandle::new(record.address, version));
        }

        let address = match plan.factory {
            FactoryPlan::Proxied {
                position_token: true,
            } => {
                let implementation = self.position_token_implementation().await?;
                let init = IndexFactoryHandle::initialize_calldata(implementation);
                self.factory_proxy(&artifact_name, init).await?
            }
            FactoryPlan::Proxied {
                position_token: false,
            } => {
                let init = IStandaloneIndexFactory::initializeCall {}.abi_encode().into();
                self.factory_proxy(&artifact_name, init).await?
            }
            FactoryPlan::Direct | FactoryPlan::Attached(_) => {
                let (_, deployed) = self.ctx.deploy(&artifact_name, &[]).await?;
                self.commit(DeploymentRecord::deployed(
                    DeployStep::IndexFactory,
                    artifact_name,
                    &deployed,
                ))
                .await?;
                deployed.address
            }
        };

        Ok(IndexFactoryHandle::new(address, version))
    }

    async fn position_token_implementation(&mut self) -> eyre::Result<Address> {
        if let Some(record) = self.completed(DeployStep::PositionTokenImplementation) {
            return Ok(record.address);
        }
        let name = self.config.contracts.position_token.clone();
        let (_, deployed) = self.ctx.deploy(&name, &[]).await?;
        self.commit(DeploymentRecord::deployed(
            DeployStep::PositionTokenImplementation,
            name,
            &deployed,
        ))
        .await?;
        Ok(deployed.address)
    }

    async fn proxy_admin(&mut self) -> eyre::Result<Address> {
        if let Some(record) = self.completed(DeployStep::ProxyAdmin) {
            return Ok(record.address);
        }
        let (address, deployed) = self.ctx.proxy_admin(None, self.config.factory).await?;
        let record = match deployed {
            Some(deployed) => DeploymentRecord::deployed(
                DeployStep::ProxyAdmin,
                self.config.contracts.proxy_admin.clone(),
                &deployed,
            ),
            None => DeploymentRecord::new(
                DeployStep::ProxyAdmin,
                self.config.contracts.proxy_admin.clone(),
                address,
            ),
        };
        self.commit(record).await?;
        Ok(address)
    }

    async fn factory_proxy(&mut self, artifact_name: &str, init: Bytes) -> eyre::Result<Address> {
        let proxy_admin = self.proxy_admin().await?;

        let implementation = match self.completed(DeployStep::IndexFactoryImplementation) {
            Some(record) => record.address,
            None => {
                let (_, deployed) = self.ctx.deploy(artifact_name, &[]).await?;
                self.commit(DeploymentRecord::deployed(
                    DeployStep::IndexFactoryImplementation,
                    artifact_name,
                    &deployed,
                ))
                .await?;
                deployed.address
            }
        };

        let proxy_artifact = self.ctx.load(&self.config.contracts.proxy)?;
        let (proxy, args) = deploy_proxy(
            &self.ctx.provider,
            self.ctx.deployer,
            &proxy_artifact,
            implementation,
            proxy_admin,
            init,
        )
        .await
        .context("Failed to deploy index factory proxy")?;

        self.commit(
            DeploymentRecord::deployed(
                DeployStep::IndexFactoryProxy,
                self.config.contracts.proxy.clone(),
                &proxy,
            )
            .with_constructor_args(args),
        )
        .await?;
        Ok(proxy.address)
    }

    /// First generation factory creates tokens, protocol and registry entry
    /// in a single transaction.
    async fn create_index(
        &mut self,
        factory: &IndexFactoryHandle,
        collateral: Address,
    ) -> eyre::Result<(TokenPair, Address, U256)> {
        if let Some((pair, protocol, index_count)) = recorded_index(&self.manifest)? {
            tracing::info!(%protocol, %index_count, "Reusing recorded index");
            return Ok((pair, protocol, index_count));
        }

        let created = factory
            .create_index(
                &self.ctx.provider,
                self.ctx.deployer,
                collateral,
                self.config.minimum_collateral_qty,
                self.config.volatility_cap_ratio,
                &self.config.token_name,
                &self.config.token_symbol,
            )
            .await?;

        let symbol = self.config.token_symbol.clone();
        let (_, inverse_symbol) = inverse_token_names(&self.config.token_name, &symbol);
        let index_count = created.index_count;

        for (step, contract, address) in [
            (
                DeployStep::VolatilityToken,
                symbol,
                created.pair.volatility_token,
            ),
            (
                DeployStep::InverseVolatilityToken,
                inverse_symbol,
                created.pair.inverse_volatility_token,
            ),
            (
                DeployStep::ProtocolProxy,
                self.config.contracts.protocol.clone(),
                created.protocol,
            ),
            (
                DeployStep::Registration,
                self.config.contracts.protocol.clone(),
                created.protocol,
            ),
        ] {
            self.commit(
                DeploymentRecord::new(step, contract, address)
                    .with_tx(created.tx_hash)
                    .with_index_count(Some(index_count)),
            )
            .await?;
        }

        Ok((created.pair, created.protocol, index_count))
    }

    async fn tokens(&mut self, factory: &IndexFactoryHandle) -> eyre::Result<TokenPair> {
        match self.config.token_mode {
            TokenMode::Factory => self.factory_tokens(factory).await,
            TokenMode::Standalone {
                child_chain_manager,
            } => {
                self.standalone_tokens(factory, child_chain_manager)
                    .await
            }
        }
    }

    async fn factory_tokens(&mut self, factory: &IndexFactoryHandle) -> eyre::Result<TokenPair> {
        if let Some(pair) = recorded_pair(&self.manifest)? {
            tracing::info!(
                volatility_token = %pair.volatility_token,
                inverse_volatility_token = %pair.inverse_volatility_token,
                "Reusing recorded token pair"
            );
            return Ok(pair);
        }

        let created = factory
            .create_volatility_tokens(
                &self.ctx.provider,
                self.ctx.deployer,
                &self.config.token_name,
                &self.config.token_symbol,
            )
            .await?;

        let symbol = self.config.token_symbol.clone();
        let (_, inverse_symbol) = inverse_token_names(&self.config.token_name, &symbol);
        for (step, contract, address) in [
            (
                DeployStep::VolatilityToken,
                symbol,
                created.pair.volatility_token,
            ),
            (
                DeployStep::InverseVolatilityToken,
                inverse_symbol,
                created.pair.inverse_volatility_token,
            ),
        ] {
            let mut record = DeploymentRecord::new(step, contract, address)
                .with_tx(created.tx_hash)
                .with_index_count(created.pair.index_count);
            record.block_number = created.block_number;
            self.commit(record).await?;
        }

        Ok(created.pair)
    }

    async fn standalone_tokens(
        &mut self,
        factory: &IndexFactoryHandle,
        child_chain_manager: Address,
    ) -> eyre::Result<TokenPair> {
        let (inverse_name, inverse_symbol) =
            inverse_token_names(&self.config.token_name, &self.config.token_symbol);
        let volatility_token = self
            .standalone_token(
                DeployStep::VolatilityToken,
                matic_constructor_args(
                    &self.config.token_name,
                    &self.config.token_symbol,
                    child_chain_manager,
                ),
            )
            .await?;
        let inverse_volatility_token = self
            .standalone_token(
                DeployStep::InverseVolatilityToken,
                matic_constructor_args(&inverse_name, &inverse_symbol, child_chain_manager),
            )
            .await?;
        let pair = TokenPair::new(volatility_token, inverse_volatility_token, None)?;

        if self.completed(DeployStep::TokenAdminGrant).is_none() {
            let mut last_tx = None;
            for token in pair.tokens() {
                let tx_hash = grant_role(
                    &self.ctx.provider,
                    token,
                    self.ctx.deployer,
                    TokenRole::Admin,
                    factory.address,
                )
                .await?;
                last_tx = Some(tx_hash);
            }
            let mut record = DeploymentRecord::new(
                DeployStep::TokenAdminGrant,
                self.factory_artifact(),
                factory.address,
            );
            record.tx_hash = last_tx;
            self.commit(record).await?;
        }

        Ok(pair)
    }

    async fn standalone_token(&mut self, step: DeployStep, args: Bytes) -> eyre::Result<Address> {
        if let Some(record) = self.completed(step) {
            return Ok(record.address);
        }
        let name = self.config.contracts.standalone_token.clone();
        let (_, deployed) = self.ctx.deploy(&name, &args).await?;
        self.commit(DeploymentRecord::deployed(step, name, &deployed).with_constructor_args(args))
            .await?;
        Ok(deployed.address)
    }

    async fn protocol(&mut self, collateral: Address, pair: &TokenPair) -> eyre::Result<Address> {
        if let Some(record) = self.completed(DeployStep::ProtocolProxy) {
            return Ok(record.address);
        }

        let proxy_admin = self.proxy_admin().await?;
        let name = self.config.contracts.protocol.clone();

        let implementation = match self.completed(DeployStep::ProtocolImplementation) {
            Some(record) => record.address,
            None => {
                let (_, deployed) = self.ctx.deploy(&name, &[]).await?;
                self.commit(DeploymentRecord::deployed(
                    DeployStep::ProtocolImplementation,
                    name.clone(),
                    &deployed,
                ))
                .await?;
                deployed.address
            }
        };

        let params = ProtocolParams::new(
            collateral,
            pair,
            self.config.minimum_collateral_qty,
            self.config.volatility_cap_ratio,
        );
        let (proxy, args) = self
            .ctx
            .deploy_protocol_proxy(implementation, &params, proxy_admin)
            .await?;
        self.commit(
            DeploymentRecord::deployed(DeployStep::ProtocolProxy, name, &proxy)
                .with_constructor_args(args),
        )
        .await?;
        Ok(proxy.address)
    }

    async fn update_fees(&mut self, protocol: Address) -> eyre::Result<()> {
        let Some(fees) = self.config.fees else {
            return Ok(());
        };
        if self.completed(DeployStep::FeeUpdate).is_some() {
            return Ok(());
        }

        let tx_hash = update_fees(&self.ctx.provider, protocol, self.ctx.deployer, fees).await?;
        tracing::info!(
            issuance_fees = %fees.issuance_fees,
            redeem_fees = %fees.redeem_fees,
            "Fees updated"
        );
        self.commit(
            DeploymentRecord::new(
                DeployStep::FeeUpdate,
                self.config.contracts.protocol.clone(),
                protocol,
            )
            .with_tx(tx_hash),
        )
        .await
    }

    async fn register(
        &mut self,
        factory: &IndexFactoryHandle,
        protocol: Address,
        pair: &TokenPair,
    ) -> eyre::Result<U256> {
        if let Some(index_count) = recorded_registration(&self.manifest)? {
            tracing::info!(%protocol, %index_count, "Reusing recorded registration");
            return Ok(index_count);
        }

        let registration = factory
            .register_index(
                &self.ctx.provider,
                self.ctx.deployer,
                protocol,
                pair,
                &self.config.collateral_symbol,
            )
            .await?;

        self.commit(
            DeploymentRecord::new(
                DeployStep::Registration,
                self.config.contracts.protocol.clone(),
                protocol,
            )
            .with_tx(registration.tx_hash)
            .with_index_count(Some(registration.index_count)),
        )
        .await?;
        Ok(registration.index_count)
    }

    /// Submit every contract deployed from an artifact. Proxies are left to
    /// the explorer's proxy detection.
    async fn verify_all(&self) {
        let candidates: Vec<DeploymentRecord> = self
            .manifest
            .records
            .iter()
            .filter(|r| is_verifiable(r))
            .cloned()
            .collect();

        let mut verified = 0;
        for record in &candidates {
            let args = record.constructor_args.clone().unwrap_or_default();
            if self.ctx.verify(&record.contract, record.address, args).await {
                verified += 1;
            }
        }
        tracing::info!("Verified {} of {} contracts", verified, candidates.len());
    }
}

/// Deployed by this tool from a compiler artifact, as opposed to attached or
/// created by a factory.
fn is_verifiable(record: &DeploymentRecord) -> bool {
    if record.tx_hash.is_none() || !VERIFIABLE_STEPS.contains(&record.step) {
        return false;
    }
    match record.step {
        DeployStep::VolatilityToken | DeployStep::InverseVolatilityToken => {
            record.constructor_args.is_some()
        }
        _ => true,
    }
}

#[cfg(test)]
mod test {
    use alloy::primitives::{address, b256, Address, Bytes, U256};
    use test_case::test_case;
    use volmex_contracts::{factory::FactoryVersion, protocol::FeeParams};

    use super::{
        is_verifiable, recorded_index, recorded_pair, recorded_registration, DeploymentPlan,
        FactoryPlan,
    };
    use crate::{
        app::config::{DeployConfig, DeployConfigBuilder, TokenMode},
        deployment::manifest::{DeployStep, DeploymentManifest, DeploymentRecord},
    };

    const ADDR: Address = address!("0x00000000000000000000000000000000000000a1");
    const IVOL: Address = address!("0x00000000000000000000000000000000000000a2");
    const PROTOCOL: Address = address!("0x00000000000000000000000000000000000000b1");
    const FACTORY: Address = address!("0x1111111111111111111122222222222222222222");
    const DEPLOYER: Address = address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");

    fn config(f: impl FnOnce(DeployConfigBuilder) -> DeployConfigBuilder) -> DeployConfig {
        f(DeployConfig::builder().collateral_symbol("DAI"))
            .build()
            .unwrap()
    }

    fn manifest(records: Vec<DeploymentRecord>) -> DeploymentManifest {
        let mut manifest = DeploymentManifest::new("localhost", 31337, DEPLOYER);
        for record in records {
            manifest.record(record);
        }
        manifest
    }

    fn sent(step: DeployStep, address: Address) -> DeploymentRecord {
        DeploymentRecord::new(step, "Contract", address).with_tx(b256!(
            "0x2222222222222222222222222222222222222222222222222222222222222222"
        ))
    }

    #[test]
    fn test_plan_v3_factory_with_fees() {
        let plan = DeploymentPlan::new(
            &config(|b| {
                b.fees(FeeParams {
                    issuance_fees: U256::from(10),
                    redeem_fees: U256::from(30),
                })
            }),
            FactoryVersion::V3,
        );
        assert_eq!(
            plan.factory,
            FactoryPlan::Proxied {
                position_token: true
            }
        );
        assert_eq!(
            plan.steps(),
            vec![
                DeployStep::CollateralToken,
                DeployStep::PositionTokenImplementation,
                DeployStep::ProxyAdmin,
                DeployStep::IndexFactoryImplementation,
                DeployStep::IndexFactoryProxy,
                DeployStep::VolatilityToken,
                DeployStep::InverseVolatilityToken,
                DeployStep::ProtocolImplementation,
                DeployStep::ProtocolProxy,
                DeployStep::Registration,
                DeployStep::FeeUpdate,
            ]
        );
    }

    #[test]
    fn test_plan_v1_creates_index_in_one_step() {
        let plan = DeploymentPlan::new(&config(|b| b), FactoryVersion::V1);
        assert_eq!(plan.factory, FactoryPlan::Direct);
        assert_eq!(
            plan.steps(),
            vec![
                DeployStep::CollateralToken,
                DeployStep::IndexFactory,
                DeployStep::VolatilityToken,
                DeployStep::InverseVolatilityToken,
                DeployStep::ProtocolProxy,
                DeployStep::Registration,
            ]
        );
    }

    #[test]
    fn test_plan_v2_attached_factory_deploys_proxy_admin_for_protocol() {
        let plan = DeploymentPlan::new(&config(|b| b.factory(FACTORY)), FactoryVersion::V2);
        assert_eq!(plan.factory, FactoryPlan::Attached(FACTORY));
        assert_eq!(
            plan.steps(),
            vec![
                DeployStep::CollateralToken,
                DeployStep::IndexFactoryProxy,
                DeployStep::VolatilityToken,
                DeployStep::InverseVolatilityToken,
                DeployStep::ProxyAdmin,
                DeployStep::ProtocolImplementation,
                DeployStep::ProtocolProxy,
                DeployStep::Registration,
            ]
        );
    }

    #[test]
    fn test_plan_standalone_grants_admin_to_factory() {
        let plan = DeploymentPlan::new(
            &config(|b| {
                b.token_mode(TokenMode::Standalone {
                    child_chain_manager: ADDR,
                })
            }),
            FactoryVersion::V3,
        );
        assert_eq!(
            plan.factory,
            FactoryPlan::Proxied {
                position_token: false
            }
        );
        let steps = plan.steps();
        assert!(!steps.contains(&DeployStep::PositionTokenImplementation));
        assert_eq!(
            steps.iter().filter(|s| **s == DeployStep::ProxyAdmin).count(),
            1
        );
        let grant = steps
            .iter()
            .position(|s| *s == DeployStep::TokenAdminGrant)
            .unwrap();
        let inverse = steps
            .iter()
            .position(|s| *s == DeployStep::InverseVolatilityToken)
            .unwrap();
        assert_eq!(grant, inverse + 1);
    }

    #[test]
    fn test_resume_skips_recorded_steps() {
        let plan = DeploymentPlan::new(&config(|b| b), FactoryVersion::V2);
        let manifest = manifest(vec![
            sent(DeployStep::CollateralToken, ADDR),
            sent(DeployStep::IndexFactory, FACTORY),
            sent(DeployStep::VolatilityToken, ADDR).with_index_count(Some(U256::from(3))),
            sent(DeployStep::InverseVolatilityToken, IVOL).with_index_count(Some(U256::from(3))),
        ]);

        assert_eq!(
            plan.pending(&manifest),
            vec![
                DeployStep::ProxyAdmin,
                DeployStep::ProtocolImplementation,
                DeployStep::ProtocolProxy,
                DeployStep::Registration,
            ]
        );

        let pair = recorded_pair(&manifest).unwrap().unwrap();
        assert_eq!(pair.tokens(), [ADDR, IVOL]);
        assert_eq!(pair.index_count, Some(U256::from(3)));
        assert_eq!(recorded_registration(&manifest).unwrap(), None);
    }

    #[test]
    fn test_failed_step_leaves_later_steps_pending() {
        // Protocol proxy deployment reverted after its implementation was recorded
        let plan = DeploymentPlan::new(&config(|b| b), FactoryVersion::V2);
        let manifest = manifest(vec![
            sent(DeployStep::CollateralToken, ADDR),
            sent(DeployStep::IndexFactory, FACTORY),
            sent(DeployStep::VolatilityToken, ADDR),
            sent(DeployStep::InverseVolatilityToken, IVOL),
            sent(DeployStep::ProxyAdmin, ADDR),
            sent(DeployStep::ProtocolImplementation, PROTOCOL),
        ]);

        assert_eq!(
            plan.pending(&manifest),
            vec![DeployStep::ProtocolProxy, DeployStep::Registration]
        );
        assert!(manifest.find(DeployStep::Registration).is_none());
        assert_eq!(recorded_index(&manifest).unwrap(), None);
    }

    #[test]
    fn test_only_one_token_recorded_is_not_a_pair() {
        let manifest = manifest(vec![sent(DeployStep::VolatilityToken, ADDR)]);
        assert_eq!(recorded_pair(&manifest).unwrap(), None);
    }

    #[test]
    fn test_resume_create_index_returns_recorded_protocol() {
        let index_count = Some(U256::from(7));
        let manifest = manifest(vec![
            sent(DeployStep::CollateralToken, ADDR),
            sent(DeployStep::IndexFactory, FACTORY),
            sent(DeployStep::VolatilityToken, ADDR).with_index_count(index_count),
            sent(DeployStep::InverseVolatilityToken, IVOL).with_index_count(index_count),
            sent(DeployStep::ProtocolProxy, PROTOCOL).with_index_count(index_count),
            sent(DeployStep::Registration, PROTOCOL).with_index_count(index_count),
        ]);

        let (pair, protocol, count) = recorded_index(&manifest).unwrap().unwrap();
        assert_eq!(pair.tokens(), [ADDR, IVOL]);
        assert_eq!(protocol, PROTOCOL);
        assert_eq!(count, U256::from(7));
        assert_eq!(recorded_registration(&manifest).unwrap(), index_count);

        let plan = DeploymentPlan::new(&config(|b| b), FactoryVersion::V1);
        assert!(plan.pending(&manifest).is_empty());
    }

    #[test]
    fn test_recorded_registration_without_index_count_is_error() {
        let manifest = manifest(vec![sent(DeployStep::Registration, PROTOCOL)]);
        assert!(recorded_registration(&manifest).is_err());
        assert!(recorded_index(&manifest).unwrap().is_none());
    }

    fn record(step: DeployStep, sent: bool, args: bool) -> DeploymentRecord {
        let mut record = DeploymentRecord::new(step, "Contract", ADDR);
        if sent {
            record = record.with_tx(b256!(
                "0x1111111111111111111111111111111111111111111111111111111111111111"
            ));
        }
        if args {
            record = record.with_constructor_args(Bytes::from(vec![0x01]));
        }
        record
    }

    #[test_case(DeployStep::ProtocolImplementation, true, false => true; "deployed implementation")]
    #[test_case(DeployStep::CollateralToken, false, false => false; "configured collateral")]
    #[test_case(DeployStep::ProtocolProxy, true, true => false; "proxy")]
    #[test_case(DeployStep::VolatilityToken, true, false => false; "factory clone")]
    #[test_case(DeployStep::VolatilityToken, true, true => true; "standalone token")]
    #[test_case(DeployStep::Registration, true, false => false; "registration")]
    fn test_verifiable(step: DeployStep, sent: bool, args: bool) -> bool {
        is_verifiable(&record(step, sent, args))
    }
}
