//! Recovering values that creation calls only report through logs.
//!
//! Factory calls return addresses to other contracts, never to the sender of
//! the transaction, so the tooling reads them back from the receipt. Logs are
//! always matched against the emitting contract's own interface: a log is
//! only considered when it was emitted by `emitter` and its topic0 is the
//! selector of the requested event.

use alloy::{
    dyn_abi::{DynSolValue, EventExt},
    json_abi::JsonAbi,
    primitives::{Address, B256},
    rpc::types::{Log, TransactionReceipt},
    sol_types::SolEvent,
};

use crate::error::ChainError;

/// Decode every `E` emitted by `emitter`, in log order.
///
/// No matching log yields an empty vector. A matching log that fails to
/// decode means the binding does not describe the deployed contract, which
/// is reported as an error.
pub fn decode_events<E: SolEvent>(logs: &[Log], emitter: Address) -> Result<Vec<E>, ChainError> {
    logs.iter()
        .filter(|log| log.address() == emitter && log.topic0() == Some(&E::SIGNATURE_HASH))
        .map(|log| {
            log.log_decode::<E>()
                .map(|decoded| decoded.inner.data)
                .map_err(|err| ChainError::Decode {
                    event: E::SIGNATURE.to_owned(),
                    message: err.to_string(),
                })
        })
        .collect()
}

/// Decode the first `E` emitted by `emitter` in `receipt`, which must exist.
pub fn expect_event<E: SolEvent>(
    receipt: &TransactionReceipt,
    emitter: Address,
) -> Result<E, ChainError> {
    decode_events::<E>(receipt.logs(), emitter)?
        .into_iter()
        .next()
        .ok_or_else(|| ChainError::MissingEvent {
            event: E::SIGNATURE.to_owned(),
            tx_hash: receipt.transaction_hash,
        })
}

/// Event decoded through an ABI loaded at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEvent {
    pub name: String,
    pub fields: Vec<(String, DynSolValue)>,
}

impl NamedEvent {
    pub fn get(&self, field: &str) -> Option<&DynSolValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn address(&self, field: &str) -> Option<Address> {
        self.get(field).and_then(DynSolValue::as_address)
    }
}

/// Dynamic decoder bound to one contract's ABI and address.
///
/// Used when the contract version is only known from its artifact, e.g. a
/// factory attached by address.
#[derive(Debug, Clone)]
pub struct EventDecoder {
    abi: JsonAbi,
    emitter: Address,
}

impl EventDecoder {
    pub fn new(abi: JsonAbi, emitter: Address) -> Self {
        Self { abi, emitter }
    }

    pub fn decode(&self, logs: &[Log], name: &str) -> Result<Vec<NamedEvent>, ChainError> {
        let events = self
            .abi
            .events
            .get(name)
            .ok_or_else(|| ChainError::UnknownEvent(name.to_owned()))?;

        let mut decoded = Vec::new();
        for log in logs.iter().filter(|log| log.address() == self.emitter) {
            let Some(topic0) = log.topic0() else {
                continue;
            };

            let Some(event) = events
                .iter()
                .find(|event| !event.anonymous && event.selector() == *topic0)
            else {
                continue;
            };

            let values = event
                .decode_log(log.data())
                .map_err(|err| ChainError::Decode {
                    event: name.to_owned(),
                    message: err.to_string(),
                })?;

            let mut indexed = values.indexed.into_iter();
            let mut body = values.body.into_iter();
            let fields = event
                .inputs
                .iter()
                .map(|input| {
                    let value = if input.indexed {
                        indexed.next()
                    } else {
                        body.next()
                    };
                    value
                        .map(|value| (input.name.clone(), value))
                        .ok_or_else(|| ChainError::Decode {
                            event: name.to_owned(),
                            message: format!("missing value for {}", input.name),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;

            decoded.push(NamedEvent {
                name: name.to_owned(),
                fields,
            });
        }

        Ok(decoded)
    }

    /// Selector of `name`, failing if the ABI does not declare it.
    pub fn selector(&self, name: &str) -> Result<B256, ChainError> {
        self.abi
            .events
            .get(name)
            .and_then(|events| events.first())
            .map(|event| event.selector())
            .ok_or_else(|| ChainError::UnknownEvent(name.to_owned()))
    }
}

#[cfg(test)]
pub mod test {
    use alloy::{
        json_abi::JsonAbi,
        primitives::{address, Address, U256},
        rpc::types::Log,
        sol_types::SolEvent,
    };

    use super::{decode_events, EventDecoder};
    use crate::{
        contracts::{IndexFactoryV2, IndexFactoryV3},
        error::ChainError,
    };

    pub fn make_log<E: SolEvent>(emitter: Address, event: &E) -> Log {
        Log {
            inner: alloy::primitives::Log {
                address: emitter,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    const FACTORY: Address = address!("0x1111111111111111111122222222222222222222");
    const OTHER: Address = address!("0x3333333333333333333344444444444444444444");
    const VOL: Address = address!("0x00000000000000000000000000000000000000a1");
    const IVOL: Address = address!("0x00000000000000000000000000000000000000a2");

    fn created() -> IndexFactoryV3::VolatilityTokenCreated {
        IndexFactoryV3::VolatilityTokenCreated {
            volatilityToken: VOL,
            inverseVolatilityToken: IVOL,
            tokenName: String::from("Ethereum Volatility Index Token"),
            tokenSymbol: String::from("ETHV"),
        }
    }

    #[test]
    fn test_decode_typed_filters_by_emitter_and_topic() {
        let registered = IndexFactoryV3::IndexRegistered {
            indexCount: U256::from(1),
            index: OTHER,
        };
        let logs = vec![
            make_log(OTHER, &created()),
            make_log(FACTORY, &registered),
            make_log(FACTORY, &created()),
        ];

        let decoded =
            decode_events::<IndexFactoryV3::VolatilityTokenCreated>(&logs, FACTORY).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].volatilityToken, VOL);
        assert_eq!(decoded[0].inverseVolatilityToken, IVOL);
        assert_eq!(decoded[0].tokenSymbol, "ETHV");
    }

    #[test]
    fn test_decode_typed_no_match_is_empty() {
        let logs = vec![make_log(OTHER, &created())];
        let decoded =
            decode_events::<IndexFactoryV3::VolatilityTokenCreated>(&logs, FACTORY).unwrap();
        assert!(decoded.is_empty());

        let decoded = decode_events::<IndexFactoryV2::IndexRegistered>(&[], FACTORY).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_decode_dynamic_by_name() {
        let abi = JsonAbi::parse([
            "event VolatilityTokenCreated(address indexed volatilityToken, address indexed inverseVolatilityToken, string tokenName, string tokenSymbol)",
            "event IndexRegistered(uint256 indexed indexCount, address indexed index)",
        ])
        .unwrap();
        let decoder = EventDecoder::new(abi, FACTORY);

        let logs = vec![make_log(FACTORY, &created()), make_log(OTHER, &created())];
        let decoded = decoder.decode(&logs, "VolatilityTokenCreated").unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].address("volatilityToken"), Some(VOL));
        assert_eq!(decoded[0].address("inverseVolatilityToken"), Some(IVOL));
        assert_eq!(
            decoded[0].get("tokenSymbol").and_then(|v| v.as_str()),
            Some("ETHV")
        );

        let none = decoder.decode(&logs, "IndexRegistered").unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_decode_dynamic_unknown_event_is_fatal() {
        let abi = JsonAbi::parse([
            "event IndexRegistered(uint256 indexed indexCount, address indexed index)",
        ])
        .unwrap();
        let decoder = EventDecoder::new(abi, FACTORY);

        let err = decoder
            .decode(&[make_log(FACTORY, &created())], "PositionTokenCreated")
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownEvent(name) if name == "PositionTokenCreated"));
    }
}
