use std::path::PathBuf;

use alloy::primitives::{Address, Bytes};
use clap::Parser;
use deploy_core::{
    core::{env::EnvReader, logging::log_init},
    init_log,
};
use eyre::{eyre, Context};
use volmex_contracts::{
    artifact::ArtifactStore,
    position_token::token_info,
    protocol::ProtocolSnapshot,
    proxy::implementation_of,
    supply::audit_supply,
};
use volmex_deployer::{
    admin::{ownership::AdminOrchestrator, registration::register_protocol},
    app::{
        config::{
            ContractNames, DeployConfig, OwnershipConfig, RegisterConfig, UpgradeConfig,
            ENV_IMPLEMENTATION_ADDRESS, ENV_VERIFY,
        },
        credentials::DeployerCredentials,
        network::NetworkConfig,
    },
    cli::{default_manifest_path, Cli, Commands},
    deployment::{
        manifest::{DeployStep, DeploymentManifest},
        orchestrator::DeploymentOrchestrator,
        steps::DeployContext,
    },
    upgrade::{
        proposal::{FileProposer, HttpProposer, UpgradeProposer},
        upgrade_orchestrator::UpgradeOrchestrator,
    },
    verification::explorer::{ExplorerVerifier, VerificationRequest, VerifierConfig},
};

struct Session {
    cli: Cli,
    env: EnvReader,
    network: NetworkConfig,
}

impl Session {
    async fn context(&self, contracts: ContractNames) -> eyre::Result<DeployContext> {
        let credentials = DeployerCredentials::from_env(&self.env);
        let (provider, deployer) = self.network.connect(&credentials).await?;
        let verifier =
            VerifierConfig::from_env(&self.env, &self.network)?.map(ExplorerVerifier::new);

        Ok(DeployContext {
            provider,
            deployer,
            network: self.network.name.clone(),
            chain_id: self.network.chain_id,
            artifacts: ArtifactStore::new(&self.cli.artifacts),
            contracts,
            verifier,
        })
    }

    async fn deploy(&self, resume: bool) -> eyre::Result<()> {
        let config = DeployConfig::from_env(&self.env)?;
        let ctx = self.context(config.contracts.clone()).await?;

        let manifest_path = self.cli.manifest_path(&ctx.network);
        if !resume && manifest_path.exists() {
            tracing::warn!(
                "Starting a new deployment, {} will be overwritten",
                manifest_path.display()
            );
        }
        let manifest = DeploymentManifest::load_or_new(
            &manifest_path,
            resume,
            &ctx.network,
            ctx.chain_id,
            ctx.deployer,
        )
        .await?;

        let (summary, manifest) =
            DeploymentOrchestrator::new(&ctx, config, manifest, manifest_path.clone())
                .run()
                .await?;

        tracing::info!(
            protocol = %summary.protocol,
            factory = %summary.factory.address,
            factory_version = %summary.factory.version,
            volatility_token = %summary.pair.volatility_token,
            inverse_volatility_token = %summary.pair.inverse_volatility_token,
            index_count = ?summary.index_count,
            "Deployment complete, manifest written to {}",
            manifest_path.display()
        );
        println!("{}", manifest);
        Ok(())
    }

    async fn register_protocol(&self) -> eyre::Result<()> {
        let config = RegisterConfig::from_env(&self.env)?;
        let ctx = self
            .context(ContractNames {
                protocol: config.protocol_contract.clone(),
                ..Default::default()
            })
            .await?;

        let manifest_path = self.cli.manifest.clone().unwrap_or_else(|| {
            default_manifest_path(&ctx.network, Some(&config.collateral_symbol))
        });
        let (registered, manifest) = register_protocol(&ctx, &config, manifest_path).await?;

        tracing::info!(
            protocol = %registered.protocol,
            implementation = %registered.implementation,
            index_count = %registered.index_count,
            "Protocol registered"
        );
        println!("{}", manifest);
        Ok(())
    }

    async fn verify(
        &self,
        contract: &str,
        address: Option<Address>,
        constructor_args: Option<Bytes>,
    ) -> eyre::Result<()> {
        let address = match address {
            Some(address) => address,
            None => self.env.required_parsed(ENV_IMPLEMENTATION_ADDRESS)?,
        };
        let verifier = VerifierConfig::from_env(&self.env, &self.network)?
            .map(ExplorerVerifier::new)
            .ok_or_else(|| {
                eyre!(
                    "No explorer API for {} or ETHERSCAN_API_KEY is not set",
                    self.network.name
                )
            })?;

        let store = ArtifactStore::new(&self.cli.artifacts);
        let artifact = store.load(contract)?;
        let request = VerificationRequest::from_artifact(
            &store,
            &artifact,
            address,
            constructor_args.unwrap_or_default(),
        )?;

        let status = verifier.verify(&request).await?;
        if !status.is_success() {
            return Err(eyre!(
                "Verification of {} at {} failed: {:?}",
                contract,
                address,
                status
            ));
        }
        tracing::info!(%address, ?status, "Verified {}", contract);
        Ok(())
    }

    async fn upgrade(&self, contract: &str) -> eyre::Result<()> {
        let config = UpgradeConfig::from_env(&self.env, contract.to_owned())?;
        let ctx = self.context(ContractNames::default()).await?;

        let outcome = UpgradeOrchestrator::new(&ctx, config).execute_upgrade().await?;
        if self.env.flag(ENV_VERIFY)? {
            ctx.verify(contract, outcome.new_implementation, Bytes::new())
                .await;
        }

        println!(
            "{} upgraded from {} to {} in {}",
            outcome.proxy,
            outcome.previous_implementation,
            outcome.new_implementation,
            outcome.tx_hash
        );
        Ok(())
    }

    async fn propose_upgrade(
        &self,
        contract: &str,
        out: Option<PathBuf>,
    ) -> eyre::Result<()> {
        let config = UpgradeConfig::from_env(&self.env, contract.to_owned())?;
        let ctx = self.context(ContractNames::default()).await?;

        let proposer: Box<dyn UpgradeProposer + Send + Sync> = match (out, &config.proposal_url) {
            (Some(path), _) => Box::new(FileProposer::new(path)),
            (None, Some(url)) => Box::new(HttpProposer::new(url, config.proposal_token.clone())),
            (None, None) => Box::new(FileProposer::new(default_manifest_path(
                &ctx.network,
                Some("upgrade-proposal"),
            ))),
        };

        let (proposal, location) = UpgradeOrchestrator::new(&ctx, config)
            .propose_upgrade(proposer.as_ref())
            .await?;
        println!("{}: {}", proposal.title(), location);
        Ok(())
    }

    async fn transfer_ownership(&self) -> eyre::Result<()> {
        let config = OwnershipConfig::from_env(&self.env)?;
        let ctx = self.context(ContractNames::default()).await?;
        let transfer = AdminOrchestrator::new(&ctx, config)
            .transfer_proxy_admin_ownership()
            .await?;
        tracing::info!(?transfer, "Proxy admin ownership handled");
        Ok(())
    }

    async fn transfer_roles(&self) -> eyre::Result<()> {
        let config = OwnershipConfig::from_env(&self.env)?;
        let ctx = self.context(ContractNames::default()).await?;
        AdminOrchestrator::new(&ctx, config).transfer_roles().await
    }

    async fn audit_supply(&self, token: Address, from_block: u64) -> eyre::Result<()> {
        let provider = self.network.connect_read_only().await?;
        let report = audit_supply(&provider, token, from_block).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);

        if !report.consistent() {
            return Err(eyre!(
                "Supply of {} is {} on chain but {} from transfer history",
                token,
                report.on_chain,
                report.ledger.supply
            ));
        }
        Ok(())
    }

    async fn show(&self) -> eyre::Result<()> {
        let manifest_path = self.cli.manifest_path(&self.network.name);
        let manifest = DeploymentManifest::load(&manifest_path)
            .await
            .with_context(|| format!("No deployment recorded at {}", manifest_path.display()))?;
        println!("{}", manifest);

        let Some(protocol) = manifest.address_of(DeployStep::ProtocolProxy) else {
            return Ok(());
        };

        let provider = self.network.connect_read_only().await?;
        let snapshot = ProtocolSnapshot::read(&provider, protocol).await?;
        let implementation = implementation_of(&provider, protocol).await?;
        println!("Protocol {} (implementation {})", protocol, implementation);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);

        for token in [snapshot.volatility_token, snapshot.inverse_volatility_token] {
            let info = token_info(&provider, token).await?;
            println!(
                "  {:<8} {} supply {}{}",
                info.symbol,
                info.address,
                info.total_supply,
                if info.paused { " (paused)" } else { "" }
            );
        }
        Ok(())
    }

    async fn run(&self) -> eyre::Result<()> {
        match &self.cli.command {
            Commands::Deploy { resume } => self.deploy(*resume).await,
            Commands::RegisterProtocol => self.register_protocol().await,
            Commands::Verify {
                contract,
                address,
                constructor_args,
            } => {
                self.verify(contract, *address, constructor_args.clone())
                    .await
            }
            Commands::Upgrade { contract } => self.upgrade(contract).await,
            Commands::ProposeUpgrade { contract, out } => {
                self.propose_upgrade(contract, out.clone()).await
            }
            Commands::TransferOwnership => self.transfer_ownership().await,
            Commands::TransferRoles => self.transfer_roles().await,
            Commands::AuditSupply { token, from_block } => {
                self.audit_supply(*token, *from_block).await
            }
            Commands::Show => self.show().await,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_log!(cli.log_path.clone());

    tracing::info!("--==| Volmex Deployer |==--");

    let env = EnvReader::from_env();
    let network = NetworkConfig::from_env(&env, cli.network.as_deref(), cli.rpc_url.as_deref());
    let network = match network {
        Ok(network) => network,
        Err(err) => {
            tracing::error!("Invalid network configuration: {:?}", err);
            std::process::exit(1);
        }
    };

    let session = Session { cli, env, network };
    if let Err(err) = session.run().await {
        tracing::error!("{:?}", err);
        std::process::exit(1);
    }
}
