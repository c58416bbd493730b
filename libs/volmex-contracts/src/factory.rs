use std::{fmt, str::FromStr};

use alloy::{
    json_abi::JsonAbi,
    primitives::{Address, Bytes, B256, U256},
    providers::Provider,
    rpc::types::TransactionReceipt,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

use crate::{
    contracts::{IndexFactoryV1, IndexFactoryV2, IndexFactoryV3},
    error::ChainError,
    events::{decode_events, expect_event},
    util::confirm,
};

/// Index factory ABI generation.
///
/// The three generations differ in how the token pair is created, which
/// event reports it and how a protocol is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactoryVersion {
    /// `createIndex` deploys the protocol too; registration is implicit.
    V1,
    /// Pair creation reports an index count; registration by index count.
    V2,
    /// Registration by collateral symbol.
    V3,
}

impl FactoryVersion {
    pub fn detect(abi: &JsonAbi) -> Option<Self> {
        if abi.function("createIndex").is_some() {
            return Some(FactoryVersion::V1);
        }

        let register = abi.function("registerIndex")?.first()?;
        match register.inputs.first().map(|input| input.ty.as_str()) {
            Some("uint256") => Some(FactoryVersion::V2),
            Some("address") => Some(FactoryVersion::V3),
            _ => None,
        }
    }

    pub fn registers_explicitly(&self) -> bool {
        !matches!(self, FactoryVersion::V1)
    }

    /// Event reporting the protocol registered under an index count.
    pub fn registration_event(&self) -> &'static str {
        match self {
            FactoryVersion::V1 => "IndexCreated",
            FactoryVersion::V2 | FactoryVersion::V3 => "IndexRegistered",
        }
    }
}

impl fmt::Display for FactoryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryVersion::V1 => write!(f, "v1"),
            FactoryVersion::V2 => write!(f, "v2"),
            FactoryVersion::V3 => write!(f, "v3"),
        }
    }
}

impl FromStr for FactoryVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(FactoryVersion::V1),
            "v2" | "2" => Ok(FactoryVersion::V2),
            "v3" | "3" => Ok(FactoryVersion::V3),
            other => Err(format!("unknown factory version {}", other)),
        }
    }
}

/// Volatility and inverse volatility token created together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub volatility_token: Address,
    pub inverse_volatility_token: Address,
    pub index_count: Option<U256>,
}

impl TokenPair {
    pub fn new(
        volatility_token: Address,
        inverse_volatility_token: Address,
        index_count: Option<U256>,
    ) -> Result<Self, ChainError> {
        if volatility_token.is_zero() || inverse_volatility_token.is_zero() {
            return Err(ChainError::InvalidTokenPair(String::from(
                "token address is zero",
            )));
        }
        if volatility_token == inverse_volatility_token {
            return Err(ChainError::InvalidTokenPair(format!(
                "both tokens are {}",
                volatility_token
            )));
        }
        Ok(Self {
            volatility_token,
            inverse_volatility_token,
            index_count,
        })
    }

    pub fn tokens(&self) -> [Address; 2] {
        [self.volatility_token, self.inverse_volatility_token]
    }
}

/// Outcome of pair creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairCreation {
    pub pair: TokenPair,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// Outcome of `createIndex`, where the factory also deploys the protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCreation {
    pub pair: TokenPair,
    pub protocol: Address,
    pub index_count: U256,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRegistration {
    pub index_count: U256,
    pub protocol: Address,
    pub tx_hash: B256,
}

/// Extract the pair created in `receipt` according to `version`.
///
/// Exactly one creation event is expected from the factory.
pub fn pair_from_receipt(
    version: FactoryVersion,
    factory: Address,
    receipt: &TransactionReceipt,
) -> Result<TokenPair, ChainError> {
    let logs = receipt.logs();
    let (pairs, event): (Vec<(Address, Address, Option<U256>)>, &str) = match version {
        FactoryVersion::V1 => (
            decode_events::<IndexFactoryV1::PositionTokenCreated>(logs, factory)?
                .into_iter()
                .map(|e| (e.volatilityToken, e.inverseVolatilityToken, None))
                .collect(),
            "PositionTokenCreated",
        ),
        FactoryVersion::V2 => (
            decode_events::<IndexFactoryV2::PositionTokenCreated>(logs, factory)?
                .into_iter()
                .map(|e| {
                    (
                        e.volatilityToken,
                        e.inverseVolatilityToken,
                        Some(e.indexCount),
                    )
                })
                .collect(),
            "PositionTokenCreated",
        ),
        FactoryVersion::V3 => (
            decode_events::<IndexFactoryV3::VolatilityTokenCreated>(logs, factory)?
                .into_iter()
                .map(|e| (e.volatilityToken, e.inverseVolatilityToken, None))
                .collect(),
            "VolatilityTokenCreated",
        ),
    };

    match pairs.as_slice() {
        [] => Err(ChainError::MissingEvent {
            event: event.to_owned(),
            tx_hash: receipt.transaction_hash,
        }),
        [(vol, ivol, index_count)] => TokenPair::new(*vol, *ivol, *index_count),
        _ => Err(ChainError::InvalidTokenPair(format!(
            "{} {} events in one transaction",
            pairs.len(),
            event
        ))),
    }
}

/// Index factory proxy together with the ABI generation it speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFactoryHandle {
    pub address: Address,
    pub version: FactoryVersion,
}

impl IndexFactoryHandle {
    pub fn new(address: Address, version: FactoryVersion) -> Self {
        Self { address, version }
    }

    fn unsupported(&self, operation: &'static str) -> ChainError {
        ChainError::Unsupported {
            operation,
            version: self.version.to_string(),
        }
    }

    /// Calldata for the factory proxy's `initialize(implementation)`.
    pub fn initialize_calldata(implementation: Address) -> Bytes {
        IndexFactoryV3::initializeCall {
            _implementation: implementation,
        }
        .abi_encode()
        .into()
    }

    pub async fn create_volatility_tokens(
        &self,
        provider: &impl Provider,
        from: Address,
        name: &str,
        symbol: &str,
    ) -> eyre::Result<PairCreation> {
        let action = format!("createVolatilityTokens({})", symbol);
        let receipt = match self.version {
            FactoryVersion::V1 => return Err(self.unsupported("createVolatilityTokens").into()),
            FactoryVersion::V2 => {
                let factory = IndexFactoryV2::new(self.address, provider);
                let sent = factory
                    .createVolatilityTokens(name.to_owned(), symbol.to_owned())
                    .from(from)
                    .send()
                    .await;
                confirm(&action, sent).await?
            }
            FactoryVersion::V3 => {
                let factory = IndexFactoryV3::new(self.address, provider);
                let sent = factory
                    .createVolatilityTokens(name.to_owned(), symbol.to_owned())
                    .from(from)
                    .send()
                    .await;
                confirm(&action, sent).await?
            }
        };

        let pair = pair_from_receipt(self.version, self.address, &receipt)?;
        tracing::info!(
            volatility_token = %pair.volatility_token,
            inverse_volatility_token = %pair.inverse_volatility_token,
            index_count = ?pair.index_count,
            "Created {} token pair",
            symbol
        );

        Ok(PairCreation {
            pair,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }

    /// First generation factory: deploys tokens and protocol in one call.
    pub async fn create_index(
        &self,
        provider: &impl Provider,
        from: Address,
        collateral: Address,
        minimum_collateral_qty: U256,
        volatility_cap_ratio: U256,
        name: &str,
        symbol: &str,
    ) -> eyre::Result<IndexCreation> {
        if self.version != FactoryVersion::V1 {
            return Err(self.unsupported("createIndex").into());
        }

        let factory = IndexFactoryV1::new(self.address, provider);
        let sent = factory
            .createIndex(
                collateral,
                minimum_collateral_qty,
                volatility_cap_ratio,
                name.to_owned(),
                symbol.to_owned(),
            )
            .from(from)
            .send()
            .await;
        let receipt = confirm(&format!("createIndex({})", symbol), sent).await?;

        let created = expect_event::<IndexFactoryV1::IndexCreated>(&receipt, self.address)?;
        let pair = pair_from_receipt(self.version, self.address, &receipt)?;
        let pair = TokenPair {
            index_count: Some(created.indexCount),
            ..pair
        };

        tracing::info!(
            protocol = %created.index,
            index_count = %created.indexCount,
            volatility_token = %pair.volatility_token,
            inverse_volatility_token = %pair.inverse_volatility_token,
            "Created index {}",
            symbol
        );

        Ok(IndexCreation {
            pair,
            protocol: created.index,
            index_count: created.indexCount,
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
        })
    }

    /// Register `protocol` for `pair`.
    ///
    /// Second generation keys the registry by the pair's index count, third
    /// generation by collateral symbol.
    pub async fn register_index(
        &self,
        provider: &impl Provider,
        from: Address,
        protocol: Address,
        pair: &TokenPair,
        collateral_symbol: &str,
    ) -> eyre::Result<IndexRegistration> {
        let action = format!("registerIndex({})", protocol);
        let (receipt, index_count) = match self.version {
            FactoryVersion::V1 => return Err(self.unsupported("registerIndex").into()),
            FactoryVersion::V2 => {
                let index_count = pair.index_count.ok_or_else(|| {
                    ChainError::InvalidTokenPair(String::from(
                        "index count is required to register with this factory",
                    ))
                })?;
                let factory = IndexFactoryV2::new(self.address, provider);
                let sent = factory
                    .registerIndex(index_count, protocol)
                    .from(from)
                    .send()
                    .await;
                let receipt = confirm(&action, sent).await?;
                let registered =
                    expect_event::<IndexFactoryV2::IndexRegistered>(&receipt, self.address)?;
                (receipt, registered.indexCount)
            }
            FactoryVersion::V3 => {
                let factory = IndexFactoryV3::new(self.address, provider);
                let sent = factory
                    .registerIndex(protocol, collateral_symbol.to_owned())
                    .from(from)
                    .send()
                    .await;
                let receipt = confirm(&action, sent).await?;
                let registered =
                    expect_event::<IndexFactoryV3::IndexRegistered>(&receipt, self.address)?;
                (receipt, registered.indexCount)
            }
        };

        tracing::info!(
            %protocol,
            %index_count,
            tx_hash = %receipt.transaction_hash,
            "Registered protocol"
        );

        Ok(IndexRegistration {
            index_count,
            protocol,
            tx_hash: receipt.transaction_hash,
        })
    }

    /// Protocol registered under `index_count`, zero address if none.
    pub async fn index_at(
        &self,
        provider: &impl Provider,
        index_count: U256,
    ) -> Result<Address, ChainError> {
        IndexFactoryV3::new(self.address, provider)
            .getIndex(index_count)
            .call()
            .await
            .map_err(|err| ChainError::from_contract_error("getIndex", err))
    }

    pub async fn index_count(&self, provider: &impl Provider) -> Result<U256, ChainError> {
        IndexFactoryV3::new(self.address, provider)
            .indexCount()
            .call()
            .await
            .map_err(|err| ChainError::from_contract_error("indexCount", err))
    }

    /// Index count under which `protocol` is registered, scanning from the
    /// most recent entry.
    pub async fn find_registration(
        &self,
        provider: &impl Provider,
        protocol: Address,
    ) -> Result<Option<U256>, ChainError> {
        let count = self.index_count(provider).await?;
        let mut index = count;
        loop {
            if self.index_at(provider, index).await? == protocol {
                return Ok(Some(index));
            }
            if index.is_zero() {
                return Ok(None);
            }
            index -= U256::from(1);
        }
    }
}

#[cfg(test)]
mod test {
    use alloy::{
        json_abi::JsonAbi,
        primitives::{address, Address, U256},
        rpc::types::TransactionReceipt,
    };
    use test_case::test_case;

    use super::{pair_from_receipt, FactoryVersion, TokenPair};
    use crate::{
        contracts::{IndexFactoryV1, IndexFactoryV2, IndexFactoryV3},
        error::ChainError,
        events::test::make_log,
    };

    const FACTORY: Address = address!("0x1111111111111111111122222222222222222222");
    const VOL: Address = address!("0x00000000000000000000000000000000000000a1");
    const IVOL: Address = address!("0x00000000000000000000000000000000000000a2");

    fn receipt_with(logs: Vec<alloy::rpc::types::Log>) -> TransactionReceipt {
        let json = serde_json::json!({
            "transactionHash": "0x00000000000000000000000000000000000000000000000000000000000000ff",
            "transactionIndex": "0x0",
            "blockHash": "0x0000000000000000000000000000000000000000000000000000000000000001",
            "blockNumber": "0x1",
            "from": "0x0000000000000000000000000000000000000001",
            "to": FACTORY,
            "cumulativeGasUsed": "0x1",
            "gasUsed": "0x1",
            "contractAddress": null,
            "logs": logs,
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "type": "0x2",
            "status": "0x1",
            "effectiveGasPrice": "0x1"
        });
        serde_json::from_value(json).unwrap()
    }

    #[test_case(&["function createIndex(address,uint256,uint256,string,string) returns (address)"] => Some(FactoryVersion::V1); "create index")]
    #[test_case(&["function registerIndex(uint256 _indexCount, address _protocol)"] => Some(FactoryVersion::V2); "by index count")]
    #[test_case(&["function registerIndex(address _protocol, string _symbol)"] => Some(FactoryVersion::V3); "by symbol")]
    #[test_case(&["function indexCount() returns (uint256)"] => None; "not a factory")]
    fn test_detect_version(signatures: &[&str]) -> Option<FactoryVersion> {
        let abi = JsonAbi::parse(signatures.iter().copied()).unwrap();
        FactoryVersion::detect(&abi)
    }

    #[test_case("v1" => Ok(FactoryVersion::V1))]
    #[test_case("V2" => Ok(FactoryVersion::V2))]
    #[test_case("3" => Ok(FactoryVersion::V3))]
    #[test_case("v4" => matches Err(_))]
    fn test_parse_version(s: &str) -> Result<FactoryVersion, String> {
        s.parse()
    }

    #[test_case(FactoryVersion::V1 => "IndexCreated")]
    #[test_case(FactoryVersion::V2 => "IndexRegistered")]
    #[test_case(FactoryVersion::V3 => "IndexRegistered")]
    fn test_registration_event(version: FactoryVersion) -> &'static str {
        version.registration_event()
    }

    #[test]
    fn test_token_pair_invariants() {
        assert!(TokenPair::new(VOL, IVOL, None).is_ok());
        assert!(matches!(
            TokenPair::new(Address::ZERO, IVOL, None),
            Err(ChainError::InvalidTokenPair(_))
        ));
        assert!(matches!(
            TokenPair::new(VOL, VOL, None),
            Err(ChainError::InvalidTokenPair(_))
        ));
    }

    #[test]
    fn test_pair_from_v2_receipt_carries_index_count() {
        let receipt = receipt_with(vec![make_log(
            FACTORY,
            &IndexFactoryV2::PositionTokenCreated {
                indexCount: U256::from(4),
                volatilityToken: VOL,
                inverseVolatilityToken: IVOL,
                name: String::from("Ethereum Volatility Index Token"),
                symbol: String::from("ETHV"),
            },
        )]);

        let pair = pair_from_receipt(FactoryVersion::V2, FACTORY, &receipt).unwrap();
        assert_eq!(pair.volatility_token, VOL);
        assert_eq!(pair.inverse_volatility_token, IVOL);
        assert_eq!(pair.index_count, Some(U256::from(4)));
    }

    #[test]
    fn test_pair_from_v3_receipt() {
        let receipt = receipt_with(vec![make_log(
            FACTORY,
            &IndexFactoryV3::VolatilityTokenCreated {
                volatilityToken: VOL,
                inverseVolatilityToken: IVOL,
                tokenName: String::from("Ethereum Volatility Index Token"),
                tokenSymbol: String::from("ETHV"),
            },
        )]);

        let pair = pair_from_receipt(FactoryVersion::V3, FACTORY, &receipt).unwrap();
        assert_eq!(pair.tokens(), [VOL, IVOL]);
        assert_eq!(pair.index_count, None);
    }

    #[test]
    fn test_pair_from_receipt_wrong_version_is_missing_event() {
        let receipt = receipt_with(vec![make_log(
            FACTORY,
            &IndexFactoryV1::PositionTokenCreated {
                volatilityToken: VOL,
                inverseVolatilityToken: IVOL,
                name: String::from("Ethereum Volatility Index Token"),
                symbol: String::from("ETHV"),
            },
        )]);

        let err = pair_from_receipt(FactoryVersion::V3, FACTORY, &receipt).unwrap_err();
        assert!(matches!(
            err,
            ChainError::MissingEvent { ref event, .. } if event == "VolatilityTokenCreated"
        ));
    }
}
