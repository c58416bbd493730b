//! End to end runs against a development node.
//!
//! They need a node listening on `RPC_URL` (default `http://127.0.0.1:8545`,
//! chain 31337) with the default development accounts funded, and the
//! compiled protocol contracts under `ARTIFACTS_DIR` (default `artifacts`).

use std::path::PathBuf;

use alloy::primitives::{Address, U256};
use deploy_core::core::env::EnvReader;
use volmex_contracts::{
    artifact::ArtifactStore,
    contracts::PositionToken,
    error::KnownRevert,
    util::confirm,
};
use volmex_deployer::{
    app::{
        config::{ContractNames, DeployConfig, UpgradeConfig},
        credentials::DeployerCredentials,
        network::NetworkConfig,
    },
    deployment::{
        manifest::DeploymentManifest,
        orchestrator::{DeploymentOrchestrator, DeploymentSummary},
        steps::DeployContext,
    },
    upgrade::upgrade_orchestrator::UpgradeOrchestrator,
};

// First two accounts of the default development mnemonic.
const DEPLOYER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const OUTSIDER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

async fn context(key: &'static str) -> DeployContext {
    let env = EnvReader::from_env();
    let network = NetworkConfig::from_env(&env, None, None).unwrap();
    let credentials = DeployerCredentials::new(move || Some(String::from(key)));
    let (provider, deployer) = network.connect(&credentials).await.unwrap();

    DeployContext {
        provider,
        deployer,
        network: network.name.clone(),
        chain_id: network.chain_id,
        artifacts: ArtifactStore::new(
            env.optional("ARTIFACTS_DIR")
                .unwrap()
                .unwrap_or_else(|| String::from("artifacts")),
        ),
        contracts: ContractNames::default(),
        verifier: None,
    }
}

fn manifest_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "volmex-scenario-{}-{}.json",
        name,
        std::process::id()
    ))
}

async fn deploy_ethv(ctx: &DeployContext, name: &str) -> DeploymentSummary {
    let config = DeployConfig::builder()
        .collateral_symbol("DAI")
        .token_name("Ethereum Volatility Index Token")
        .token_symbol("ETHV")
        .minimum_collateral_qty(U256::from(200_000_000_000_000_000_000u128))
        .volatility_cap_ratio(U256::from(200))
        .build()
        .unwrap();

    let path = manifest_path(name);
    let manifest = DeploymentManifest::new(&ctx.network, ctx.chain_id, ctx.deployer);
    let (summary, _) = DeploymentOrchestrator::new(ctx, config, manifest, path.clone())
        .run()
        .await
        .unwrap();

    let _ = std::fs::remove_file(&path);
    summary
}

#[tokio::test]
#[ignore = "needs a development node and compiled artifacts"]
async fn test_ethv_deployment_is_active() {
    let ctx = context(DEPLOYER_KEY).await;
    let summary = deploy_ethv(&ctx, "ethv").await;

    assert!(summary.snapshot.active);
    assert_eq!(summary.snapshot.volatility_cap_ratio, U256::from(200));
    assert_eq!(
        summary.snapshot.minimum_collateral_qty,
        U256::from(200_000_000_000_000_000_000u128)
    );
    assert_eq!(summary.snapshot.collateral, summary.collateral);

    let [vol, ivol] = summary.pair.tokens();
    assert_ne!(vol, Address::ZERO);
    assert_ne!(ivol, Address::ZERO);
    assert_ne!(vol, ivol);
}

#[tokio::test]
#[ignore = "needs a development node and compiled artifacts"]
async fn test_registration_lookup() {
    let ctx = context(DEPLOYER_KEY).await;
    let summary = deploy_ethv(&ctx, "registration").await;
    let index_count = summary.index_count.unwrap();

    assert_eq!(
        summary
            .factory
            .index_at(&ctx.provider, index_count)
            .await
            .unwrap(),
        summary.protocol
    );
    assert_eq!(
        summary
            .factory
            .find_registration(&ctx.provider, summary.protocol)
            .await
            .unwrap(),
        Some(index_count)
    );
}

#[tokio::test]
#[ignore = "needs a development node and compiled artifacts"]
async fn test_upgrade_preserves_state() {
    let ctx = context(DEPLOYER_KEY).await;
    let summary = deploy_ethv(&ctx, "upgrade").await;

    let env = EnvReader::from_pairs([("PROXY_ADDRESS", summary.protocol.to_string())]);
    let config = UpgradeConfig::from_env(&env, String::from("VolmexProtocol")).unwrap();
    let outcome = UpgradeOrchestrator::new(&ctx, config)
        .execute_upgrade()
        .await
        .unwrap();

    assert_ne!(outcome.previous_implementation, outcome.new_implementation);
    assert_eq!(outcome.snapshot, summary.snapshot);
}

#[tokio::test]
#[ignore = "needs a development node and compiled artifacts"]
async fn test_mint_burn_pause_without_role_revert() {
    let ctx = context(DEPLOYER_KEY).await;
    let summary = deploy_ethv(&ctx, "roles").await;

    let outsider = context(OUTSIDER_KEY).await;
    let token = PositionToken::new(summary.pair.volatility_token, &outsider.provider);
    let supply_before = token.totalSupply().call().await.unwrap();

    let sent = token
        .mint(outsider.deployer, U256::from(1))
        .from(outsider.deployer)
        .send()
        .await;
    let err = confirm("mint", sent).await.unwrap_err();
    assert_eq!(err.known_revert(), Some(KnownRevert::MissingMinterRole));

    let sent = token
        .burn(ctx.deployer, U256::from(1))
        .from(outsider.deployer)
        .send()
        .await;
    let err = confirm("burn", sent).await.unwrap_err();
    assert_eq!(err.known_revert(), Some(KnownRevert::MissingBurnerRole));

    let sent = token.pause().from(outsider.deployer).send().await;
    let err = confirm("pause", sent).await.unwrap_err();
    assert_eq!(err.known_revert(), Some(KnownRevert::MissingPauserRole));

    assert_eq!(token.totalSupply().call().await.unwrap(), supply_before);
    assert!(!token.paused().call().await.unwrap());
}
