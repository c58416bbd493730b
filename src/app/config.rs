//! Deployment parameters loaded from the environment.
//!
//! Every value is parsed and validated before the first transaction is sent,
//! so a missing or malformed variable never surfaces halfway through a
//! deployment.

use alloy::primitives::{Address, U256};
use deploy_core::core::env::{EnvError, EnvReader};
use derive_builder::{Builder, UninitializedFieldError};
use eyre::Report;
use thiserror::Error;
use volmex_contracts::{factory::FactoryVersion, protocol::FeeParams};

pub const ENV_COLLATERAL_TOKEN_ADDRESS: &str = "COLLATERAL_TOKEN_ADDRESS";
pub const ENV_COLLATERAL_TOKEN_SYMBOL: &str = "COLLATERAL_TOKEN_SYMBOL";
pub const ENV_VOLATILITY_TOKEN_NAME: &str = "VOLATILITY_TOKEN_NAME";
pub const ENV_VOLATILITY_TOKEN_SYMBOL: &str = "VOLATILITY_TOKEN_SYMBOL";
pub const ENV_MINIMUM_COLLATERAL_QTY: &str = "MINIMUM_COLLATERAL_QTY";
pub const ENV_VOLATILITY_CAP_RATIO: &str = "VOLATILITY_CAP_RATIO";
pub const ENV_ISSUE_FEES: &str = "ISSUE_FEES";
pub const ENV_REDEEM_FEES: &str = "REDEEM_FEES";
pub const ENV_FACTORY_ADDRESS: &str = "FACTORY_ADDRESS";
pub const ENV_FACTORY_VERSION: &str = "FACTORY_VERSION";
pub const ENV_VOLATILITY_TOKEN_ADDRESS: &str = "VOLATILITY_TOKEN_ADDRESS";
pub const ENV_INVERSE_VOLATILITY_TOKEN_ADDRESS: &str = "INVERSE_VOLATILITY_TOKEN_ADDRESS";
pub const ENV_INDEX_COUNT: &str = "INDEX_COUNT";
pub const ENV_VOLMEX_PROTOCOL_ADDRESS: &str = "VOLMEX_PROTOCOL_ADDRESS";
pub const ENV_PROTOCOL_CONTRACT: &str = "VOLMEX_PROTOCOL_CONTRACT";
pub const ENV_PROXY_ADDRESS: &str = "PROXY_ADDRESS";
pub const ENV_PROXY_ADMIN_ADDRESS: &str = "PROXY_ADMIN_ADDRESS";
pub const ENV_IMPLEMENTATION_ADDRESS: &str = "IMPLEMENTATION_ADDRESS";
pub const ENV_GNOSIS_SAFE_ADDRESS: &str = "GNOSIS_SAFE_ADDRESS";
pub const ENV_CHILD_CHAIN_MANAGER: &str = "CHILD_CHAIN_MANAGER";
pub const ENV_UPGRADE_PROPOSAL_URL: &str = "UPGRADE_PROPOSAL_URL";
pub const ENV_UPGRADE_PROPOSAL_TOKEN: &str = "UPGRADE_PROPOSAL_TOKEN";
pub const ENV_VERIFY: &str = "VERIFY";

pub const DEFAULT_TOKEN_NAME: &str = "Ethereum Volatility Index Token";
pub const DEFAULT_TOKEN_SYMBOL: &str = "ETHV";
pub const DEFAULT_MINIMUM_COLLATERAL_QTY: u128 = 200_000_000_000_000_000_000;
pub const DEFAULT_VOLATILITY_CAP_RATIO: u64 = 200;

#[derive(Debug, Error)]
pub enum ConfigBuildError {
    #[error("Configuration missing or invalid `{0}`")]
    UninitializedField(&'static str),
    #[error("Configuration error `{0}`")]
    Other(String),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
    #[error(transparent)]
    EnvError(#[from] EnvError),
}

impl From<UninitializedFieldError> for ConfigBuildError {
    fn from(err: UninitializedFieldError) -> Self {
        ConfigBuildError::UninitializedField(err.field_name())
    }
}

impl From<Report> for ConfigBuildError {
    fn from(report: Report) -> Self {
        ConfigBuildError::Other(format!("{:?}", report))
    }
}

fn non_zero(key: &str, address: Address) -> Result<Address, ConfigBuildError> {
    if address.is_zero() {
        return Err(ConfigBuildError::ValidationError(format!(
            "{} must not be the zero address",
            key
        )));
    }
    Ok(address)
}

fn optional_address(env: &EnvReader, key: &str) -> Result<Option<Address>, ConfigBuildError> {
    env.optional_parsed::<Address>(key)?
        .map(|address| non_zero(key, address))
        .transpose()
}

fn required_address(env: &EnvReader, key: &str) -> Result<Address, ConfigBuildError> {
    non_zero(key, env.required_parsed::<Address>(key)?)
}

/// Fees are either both configured or both left alone.
fn fees_from_env(env: &EnvReader) -> Result<Option<FeeParams>, ConfigBuildError> {
    let issue = env.optional_parsed::<U256>(ENV_ISSUE_FEES)?;
    let redeem = env.optional_parsed::<U256>(ENV_REDEEM_FEES)?;
    match (issue, redeem) {
        (Some(issuance_fees), Some(redeem_fees)) => Ok(Some(FeeParams {
            issuance_fees,
            redeem_fees,
        })),
        (None, None) => Ok(None),
        (Some(_), None) => Err(EnvError::Missing(ENV_REDEEM_FEES.to_owned()).into()),
        (None, Some(_)) => Err(EnvError::Missing(ENV_ISSUE_FEES.to_owned()).into()),
    }
}

/// How the position tokens come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenMode {
    /// Cloned by the index factory from the position token implementation.
    #[default]
    Factory,
    /// Bridged tokens deployed one by one, for chains fed by a child chain
    /// manager.
    Standalone { child_chain_manager: Address },
}

/// Artifact names of the contracts the deployment creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractNames {
    pub collateral: String,
    pub position_token: String,
    pub standalone_token: String,
    pub index_factory: String,
    pub standalone_factory: String,
    pub protocol: String,
    pub proxy_admin: String,
    pub proxy: String,
}

impl Default for ContractNames {
    fn default() -> Self {
        Self {
            collateral: String::from("TestCollateralToken"),
            position_token: String::from("VolmexPositionToken"),
            standalone_token: String::from("VolatilityTokenPolygon"),
            index_factory: String::from("VolmexIndexFactory"),
            standalone_factory: String::from("IndexFactoryPolygon"),
            protocol: String::from("VolmexProtocol"),
            proxy_admin: String::from("ProxyAdmin"),
            proxy: String::from("TransparentUpgradeableProxy"),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(
    pattern = "owned",
    build_fn(name = "try_build", error = "ConfigBuildError")
)]
pub struct DeployConfig {
    #[builder(setter(into), default = "String::from(DEFAULT_TOKEN_NAME)")]
    pub token_name: String,

    #[builder(setter(into), default = "String::from(DEFAULT_TOKEN_SYMBOL)")]
    pub token_symbol: String,

    #[builder(setter(into))]
    pub collateral_symbol: String,

    /// Existing collateral; a test collateral token is deployed when unset.
    #[builder(setter(into, strip_option), default)]
    pub collateral_token: Option<Address>,

    #[builder(default = "U256::from(DEFAULT_MINIMUM_COLLATERAL_QTY)")]
    pub minimum_collateral_qty: U256,

    #[builder(default = "U256::from(DEFAULT_VOLATILITY_CAP_RATIO)")]
    pub volatility_cap_ratio: U256,

    #[builder(setter(strip_option), default)]
    pub fees: Option<FeeParams>,

    /// Attach to an existing factory proxy instead of deploying one.
    #[builder(setter(strip_option), default)]
    pub factory: Option<Address>,

    /// Forces the factory ABI generation instead of detecting it.
    #[builder(setter(strip_option), default)]
    pub factory_version: Option<FactoryVersion>,

    #[builder(default)]
    pub token_mode: TokenMode,

    #[builder(default)]
    pub contracts: ContractNames,

    #[builder(default)]
    pub verify: bool,
}

impl DeployConfig {
    #[must_use]
    pub fn builder() -> DeployConfigBuilder {
        DeployConfigBuilder::default()
    }

    pub fn from_env(env: &EnvReader) -> Result<Self, ConfigBuildError> {
        let mut builder = Self::builder()
            .collateral_symbol(env.required(ENV_COLLATERAL_TOKEN_SYMBOL)?)
            .verify(env.flag(ENV_VERIFY)?);

        if let Some(name) = env.optional(ENV_VOLATILITY_TOKEN_NAME)? {
            builder = builder.token_name(name);
        }
        if let Some(symbol) = env.optional(ENV_VOLATILITY_TOKEN_SYMBOL)? {
            builder = builder.token_symbol(symbol);
        }
        if let Some(collateral) = optional_address(env, ENV_COLLATERAL_TOKEN_ADDRESS)? {
            builder = builder.collateral_token(collateral);
        }
        if let Some(qty) = env.optional_parsed::<U256>(ENV_MINIMUM_COLLATERAL_QTY)? {
            builder = builder.minimum_collateral_qty(qty);
        }
        if let Some(ratio) = env.optional_parsed::<U256>(ENV_VOLATILITY_CAP_RATIO)? {
            builder = builder.volatility_cap_ratio(ratio);
        }
        if let Some(fees) = fees_from_env(env)? {
            builder = builder.fees(fees);
        }
        if let Some(factory) = optional_address(env, ENV_FACTORY_ADDRESS)? {
            builder = builder.factory(factory);
        }
        if let Some(version) = env.optional_parsed::<FactoryVersion>(ENV_FACTORY_VERSION)? {
            builder = builder.factory_version(version);
        }
        if let Some(child_chain_manager) = optional_address(env, ENV_CHILD_CHAIN_MANAGER)? {
            builder = builder.token_mode(TokenMode::Standalone {
                child_chain_manager,
            });
        }

        let mut contracts = ContractNames::default();
        if let Some(protocol) = env.optional(ENV_PROTOCOL_CONTRACT)? {
            contracts.protocol = protocol;
        }

        builder.contracts(contracts).build()
    }
}

impl DeployConfigBuilder {
    pub fn build(self) -> Result<DeployConfig, ConfigBuildError> {
        let config = self.try_build()?;

        if config.token_name.trim().is_empty() {
            return Err(ConfigBuildError::ValidationError(String::from(
                "Volatility token name must not be empty",
            )));
        }
        if config.token_symbol.trim().is_empty() {
            return Err(ConfigBuildError::ValidationError(String::from(
                "Volatility token symbol must not be empty",
            )));
        }
        if config.collateral_symbol.trim().is_empty() {
            return Err(ConfigBuildError::UninitializedField("collateral_symbol"));
        }
        if config.minimum_collateral_qty.is_zero() {
            return Err(ConfigBuildError::ValidationError(String::from(
                "Minimum collateral quantity must be positive",
            )));
        }
        if config.volatility_cap_ratio.is_zero() {
            return Err(ConfigBuildError::ValidationError(String::from(
                "Volatility cap ratio must be positive",
            )));
        }
        if let TokenMode::Standalone {
            child_chain_manager,
        } = config.token_mode
        {
            non_zero(ENV_CHILD_CHAIN_MANAGER, child_chain_manager)?;
            if config.factory_version == Some(FactoryVersion::V1) {
                return Err(ConfigBuildError::ValidationError(String::from(
                    "Standalone tokens cannot be used with a createIndex factory",
                )));
            }
        }

        Ok(config)
    }
}

/// Deploy a protocol for an existing token pair and register it.
#[derive(Debug, Clone)]
pub struct RegisterConfig {
    pub factory: Address,
    pub factory_version: Option<FactoryVersion>,
    pub collateral_token: Address,
    pub collateral_symbol: String,
    pub volatility_token: Address,
    pub inverse_volatility_token: Address,
    pub index_count: Option<U256>,
    pub minimum_collateral_qty: U256,
    pub volatility_cap_ratio: U256,
    pub protocol_contract: String,
    /// Admin for the new protocol proxy; taken from the factory proxy when
    /// unset.
    pub proxy_admin: Option<Address>,
    pub verify: bool,
}

impl RegisterConfig {
    pub fn from_env(env: &EnvReader) -> Result<Self, ConfigBuildError> {
        let volatility_token = required_address(env, ENV_VOLATILITY_TOKEN_ADDRESS)?;
        let inverse_volatility_token = required_address(env, ENV_INVERSE_VOLATILITY_TOKEN_ADDRESS)?;
        if volatility_token == inverse_volatility_token {
            return Err(ConfigBuildError::ValidationError(String::from(
                "Volatility and inverse volatility token must differ",
            )));
        }

        Ok(Self {
            factory: required_address(env, ENV_FACTORY_ADDRESS)?,
            factory_version: env.optional_parsed(ENV_FACTORY_VERSION)?,
            collateral_token: required_address(env, ENV_COLLATERAL_TOKEN_ADDRESS)?,
            collateral_symbol: env.required(ENV_COLLATERAL_TOKEN_SYMBOL)?,
            volatility_token,
            inverse_volatility_token,
            index_count: env.optional_parsed(ENV_INDEX_COUNT)?,
            minimum_collateral_qty: env.required_parsed(ENV_MINIMUM_COLLATERAL_QTY)?,
            volatility_cap_ratio: env.required_parsed(ENV_VOLATILITY_CAP_RATIO)?,
            protocol_contract: env
                .optional(ENV_PROTOCOL_CONTRACT)?
                .unwrap_or_else(|| ContractNames::default().protocol),
            proxy_admin: optional_address(env, ENV_PROXY_ADMIN_ADDRESS)?,
            verify: env.flag(ENV_VERIFY)?,
        })
    }
}

/// Targets of an ownership or role hand-over to the multisig.
#[derive(Debug, Clone)]
pub struct OwnershipConfig {
    pub safe: Address,
    pub proxy_admin: Option<Address>,
    pub protocol: Option<Address>,
    pub volatility_token: Option<Address>,
    pub inverse_volatility_token: Option<Address>,
}

impl OwnershipConfig {
    pub fn from_env(env: &EnvReader) -> Result<Self, ConfigBuildError> {
        Ok(Self {
            safe: required_address(env, ENV_GNOSIS_SAFE_ADDRESS)?,
            proxy_admin: optional_address(env, ENV_PROXY_ADMIN_ADDRESS)?,
            protocol: optional_address(env, ENV_VOLMEX_PROTOCOL_ADDRESS)?,
            volatility_token: optional_address(env, ENV_VOLATILITY_TOKEN_ADDRESS)?,
            inverse_volatility_token: optional_address(
                env,
                ENV_INVERSE_VOLATILITY_TOKEN_ADDRESS,
            )?,
        })
    }

    /// Both position tokens, which are only handed over together.
    pub fn tokens(&self) -> Result<[Address; 2], ConfigBuildError> {
        match (self.volatility_token, self.inverse_volatility_token) {
            (Some(vol), Some(ivol)) => Ok([vol, ivol]),
            (None, _) => Err(EnvError::Missing(ENV_VOLATILITY_TOKEN_ADDRESS.to_owned()).into()),
            (_, None) => {
                Err(EnvError::Missing(ENV_INVERSE_VOLATILITY_TOKEN_ADDRESS.to_owned()).into())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpgradeConfig {
    pub proxy: Address,
    pub proxy_admin: Option<Address>,
    pub implementation: Option<Address>,
    pub contract: String,
    pub safe: Option<Address>,
    pub proposal_url: Option<String>,
    pub proposal_token: Option<String>,
}

impl UpgradeConfig {
    pub fn from_env(env: &EnvReader, contract: String) -> Result<Self, ConfigBuildError> {
        let proxy = match optional_address(env, ENV_PROXY_ADDRESS)? {
            Some(proxy) => proxy,
            None => required_address(env, ENV_VOLMEX_PROTOCOL_ADDRESS)?,
        };

        Ok(Self {
            proxy,
            proxy_admin: optional_address(env, ENV_PROXY_ADMIN_ADDRESS)?,
            implementation: optional_address(env, ENV_IMPLEMENTATION_ADDRESS)?,
            contract,
            safe: optional_address(env, ENV_GNOSIS_SAFE_ADDRESS)?,
            proposal_url: env.optional(ENV_UPGRADE_PROPOSAL_URL)?,
            proposal_token: env.optional(ENV_UPGRADE_PROPOSAL_TOKEN)?,
        })
    }
}

#[cfg(test)]
mod test {
    use alloy::primitives::{address, U256};
    use deploy_core::core::env::EnvReader;
    use test_case::test_case;
    use volmex_contracts::factory::FactoryVersion;

    use super::{
        ConfigBuildError, DeployConfig, OwnershipConfig, RegisterConfig, TokenMode,
        UpgradeConfig,
    };

    fn env(pairs: &[(&str, &str)]) -> EnvReader {
        EnvReader::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_deploy_defaults() {
        let config = DeployConfig::from_env(&env(&[("COLLATERAL_TOKEN_SYMBOL", "DAI")])).unwrap();

        assert_eq!(config.token_name, "Ethereum Volatility Index Token");
        assert_eq!(config.token_symbol, "ETHV");
        assert_eq!(
            config.minimum_collateral_qty,
            U256::from(200_000_000_000_000_000_000u128)
        );
        assert_eq!(config.volatility_cap_ratio, U256::from(200));
        assert_eq!(config.collateral_token, None);
        assert_eq!(config.fees, None);
        assert_eq!(config.token_mode, TokenMode::Factory);
        assert_eq!(config.contracts.protocol, "VolmexProtocol");
        assert!(!config.verify);
    }

    #[test]
    fn test_deploy_full() {
        let config = DeployConfig::from_env(&env(&[
            ("COLLATERAL_TOKEN_SYMBOL", "USDC"),
            ("COLLATERAL_TOKEN_ADDRESS", "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"),
            ("VOLATILITY_TOKEN_NAME", "Bitcoin Volatility Index Token"),
            ("VOLATILITY_TOKEN_SYMBOL", "BTCV"),
            ("ISSUE_FEES", "10"),
            ("REDEEM_FEES", "30"),
            ("FACTORY_VERSION", "v2"),
            ("CHILD_CHAIN_MANAGER", "0xa6fa4fb5f76172d178d61b04b0ecd319c5d1c0aa"),
            ("VOLMEX_PROTOCOL_CONTRACT", "VolmexProtocolWithPrecision"),
            ("VERIFY", "true"),
        ]))
        .unwrap();

        assert_eq!(config.token_symbol, "BTCV");
        assert_eq!(
            config.collateral_token,
            Some(address!("0x2791bca1f2de4661ed88a30c99a7a9449aa84174"))
        );
        let fees = config.fees.unwrap();
        assert_eq!(fees.issuance_fees, U256::from(10));
        assert_eq!(fees.redeem_fees, U256::from(30));
        assert_eq!(config.factory_version, Some(FactoryVersion::V2));
        assert_eq!(
            config.token_mode,
            TokenMode::Standalone {
                child_chain_manager: address!("0xa6fa4fb5f76172d178d61b04b0ecd319c5d1c0aa")
            }
        );
        assert_eq!(config.contracts.protocol, "VolmexProtocolWithPrecision");
        assert!(config.verify);
    }

    #[test_case(&[]; "missing collateral symbol")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("ISSUE_FEES", "10")]; "issue fee without redeem fee")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("COLLATERAL_TOKEN_ADDRESS", "undefined")]; "unset template placeholder")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("COLLATERAL_TOKEN_ADDRESS", "0x1234")]; "malformed address")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("FACTORY_ADDRESS", "0x0000000000000000000000000000000000000000")]; "zero factory")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("VOLATILITY_CAP_RATIO", "0")]; "zero cap ratio")]
    #[test_case(&[("COLLATERAL_TOKEN_SYMBOL", "DAI"), ("FACTORY_VERSION", "v1"), ("CHILD_CHAIN_MANAGER", "0xa6fa4fb5f76172d178d61b04b0ecd319c5d1c0aa")]; "standalone tokens with createIndex")]
    fn test_deploy_rejected(pairs: &[(&str, &str)]) {
        assert!(DeployConfig::from_env(&env(pairs)).is_err());
    }

    #[test]
    fn test_builder_requires_collateral_symbol() {
        let err = DeployConfig::builder().build().unwrap_err();
        assert!(matches!(
            err,
            ConfigBuildError::UninitializedField("collateral_symbol")
        ));
    }

    #[test]
    fn test_register_requires_distinct_tokens() {
        let pairs = [
            ("FACTORY_ADDRESS", "0x1111111111111111111122222222222222222222"),
            ("COLLATERAL_TOKEN_ADDRESS", "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"),
            ("COLLATERAL_TOKEN_SYMBOL", "USDC"),
            ("VOLATILITY_TOKEN_ADDRESS", "0x00000000000000000000000000000000000000a1"),
            ("INVERSE_VOLATILITY_TOKEN_ADDRESS", "0x00000000000000000000000000000000000000a1"),
            ("MINIMUM_COLLATERAL_QTY", "200000000000000000000"),
            ("VOLATILITY_CAP_RATIO", "200"),
        ];
        assert!(matches!(
            RegisterConfig::from_env(&env(&pairs)),
            Err(ConfigBuildError::ValidationError(_))
        ));

        let mut ok = pairs;
        ok[4].1 = "0x00000000000000000000000000000000000000a2";
        let config = RegisterConfig::from_env(&env(&ok)).unwrap();
        assert_eq!(config.protocol_contract, "VolmexProtocol");
        assert_eq!(config.index_count, None);
        assert_eq!(config.proxy_admin, None);
    }

    #[test]
    fn test_register_reads_index_count() {
        let config = RegisterConfig::from_env(&env(&[
            ("FACTORY_ADDRESS", "0x1111111111111111111122222222222222222222"),
            ("COLLATERAL_TOKEN_ADDRESS", "0x2791bca1f2de4661ed88a30c99a7a9449aa84174"),
            ("COLLATERAL_TOKEN_SYMBOL", "USDC"),
            ("VOLATILITY_TOKEN_ADDRESS", "0x00000000000000000000000000000000000000a1"),
            ("INVERSE_VOLATILITY_TOKEN_ADDRESS", "0x00000000000000000000000000000000000000a2"),
            ("MINIMUM_COLLATERAL_QTY", "200000000000000000000"),
            ("VOLATILITY_CAP_RATIO", "200"),
            ("INDEX_COUNT", "4"),
        ]))
        .unwrap();
        assert_eq!(config.index_count, Some(U256::from(4)));
    }

    #[test]
    fn test_ownership_tokens_come_in_pairs() {
        let config = OwnershipConfig::from_env(&env(&[
            ("GNOSIS_SAFE_ADDRESS", "0x00000000000000000000000000000000000000ee"),
            ("VOLATILITY_TOKEN_ADDRESS", "0x00000000000000000000000000000000000000a1"),
        ]))
        .unwrap();
        assert!(config.tokens().is_err());

        assert!(OwnershipConfig::from_env(&env(&[])).is_err());
    }

    #[test]
    fn test_upgrade_proxy_falls_back_to_protocol_address() {
        let config = UpgradeConfig::from_env(
            &env(&[(
                "VOLMEX_PROTOCOL_ADDRESS",
                "0x00000000000000000000000000000000000000b1",
            )]),
            String::from("VolmexProtocolV2"),
        )
        .unwrap();
        assert_eq!(
            config.proxy,
            address!("0x00000000000000000000000000000000000000b1")
        );
        assert_eq!(config.implementation, None);
    }
}
