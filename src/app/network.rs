use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
};
use deploy_core::core::env::EnvReader;
use derive_builder::Builder;
use eyre::{eyre, Context};

use super::{config::ConfigBuildError, credentials::DeployerCredentials};

pub const ENV_NETWORK: &str = "NETWORK";
pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_CHAIN_ID: &str = "CHAIN_ID";
pub const ENV_EXPLORER_API_URL: &str = "EXPLORER_API_URL";

pub const DEFAULT_NETWORK: &str = "localhost";

#[derive(Debug, Clone, Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct NetworkConfig {
    #[builder(setter(into))]
    pub name: String,

    pub chain_id: u64,

    #[builder(setter(into))]
    pub rpc_url: String,

    /// Etherscan compatible API used for source verification.
    #[builder(setter(into, strip_option), default)]
    pub explorer_api_url: Option<String>,
}

struct Preset {
    name: &'static str,
    chain_id: u64,
    rpc_url: Option<&'static str>,
    explorer_api_url: Option<&'static str>,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "localhost",
        chain_id: 31337,
        rpc_url: Some("http://127.0.0.1:8545"),
        explorer_api_url: None,
    },
    Preset {
        name: "hardhat",
        chain_id: 31337,
        rpc_url: Some("http://127.0.0.1:8545"),
        explorer_api_url: None,
    },
    Preset {
        name: "kovan",
        chain_id: 42,
        rpc_url: None,
        explorer_api_url: Some("https://api-kovan.etherscan.io/api"),
    },
    Preset {
        name: "mainnet",
        chain_id: 1,
        rpc_url: None,
        explorer_api_url: Some("https://api.etherscan.io/api"),
    },
    Preset {
        name: "polygon",
        chain_id: 137,
        rpc_url: Some("https://polygon-rpc.com"),
        explorer_api_url: Some("https://api.polygonscan.com/api"),
    },
    Preset {
        name: "mumbai",
        chain_id: 80001,
        rpc_url: Some("https://rpc-mumbai.maticvigil.com"),
        explorer_api_url: Some("https://api-testnet.polygonscan.com/api"),
    },
];

impl NetworkConfig {
    #[must_use]
    pub fn builder() -> NetworkConfigBuilder {
        NetworkConfigBuilder::default()
    }

    /// Named preset, with `RPC_URL`, `CHAIN_ID` and `EXPLORER_API_URL`
    /// overriding its values. Unknown names need both `RPC_URL` and
    /// `CHAIN_ID`.
    pub fn from_env(
        env: &EnvReader,
        network: Option<&str>,
        rpc_url: Option<&str>,
    ) -> Result<Self, ConfigBuildError> {
        let name = match network {
            Some(name) => name.to_owned(),
            None => env
                .optional(ENV_NETWORK)?
                .unwrap_or_else(|| String::from(DEFAULT_NETWORK)),
        };
        let preset = PRESETS.iter().find(|p| p.name == name);

        let mut builder = Self::builder().name(name.clone());

        let rpc_url = match rpc_url {
            Some(url) => Some(url.to_owned()),
            None => env.optional(ENV_RPC_URL)?,
        };
        if let Some(url) = rpc_url.or_else(|| preset.and_then(|p| p.rpc_url).map(String::from)) {
            builder = builder.rpc_url(url);
        }

        if let Some(chain_id) = env
            .optional_parsed::<u64>(ENV_CHAIN_ID)?
            .or_else(|| preset.map(|p| p.chain_id))
        {
            builder = builder.chain_id(chain_id);
        }

        if let Some(url) = env
            .optional(ENV_EXPLORER_API_URL)?
            .or_else(|| preset.and_then(|p| p.explorer_api_url).map(String::from))
        {
            builder = builder.explorer_api_url(url);
        }

        builder.try_build()
    }

    pub fn is_local(&self) -> bool {
        self.chain_id == 31337
    }

    /// Connect a signing provider and check it is on the configured chain.
    pub async fn connect(
        &self,
        credentials: &DeployerCredentials,
    ) -> eyre::Result<(DynProvider, Address)> {
        let signer = credentials.signer()?;
        let deployer = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect(&self.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to {}", self.rpc_url))?
            .erased();

        self.check_chain_id(&provider).await?;

        tracing::info!(
            network = %self.name,
            chain_id = self.chain_id,
            %deployer,
            "Connected"
        );
        Ok((provider, deployer))
    }

    /// Provider for commands that only read chain state.
    pub async fn connect_read_only(&self) -> eyre::Result<DynProvider> {
        let provider = ProviderBuilder::new()
            .connect(&self.rpc_url)
            .await
            .with_context(|| format!("Failed to connect to {}", self.rpc_url))?
            .erased();

        self.check_chain_id(&provider).await?;
        Ok(provider)
    }

    async fn check_chain_id(&self, provider: &DynProvider) -> eyre::Result<()> {
        let chain_id = provider.get_chain_id().await?;
        if chain_id != self.chain_id {
            return Err(eyre!(
                "Node at {} is on chain {}, expected {} for {}",
                self.rpc_url,
                chain_id,
                self.chain_id,
                self.name
            ));
        }
        Ok(())
    }
}
