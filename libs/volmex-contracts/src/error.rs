use alloy::{
    primitives::B256,
    sol_types::decode_revert_reason,
    transports::{RpcError, TransportErrorKind},
};
use thiserror::Error;

/// Failures talking to the deployed contracts.
///
/// Reverts and missing events are final: nothing in this crate retries them.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("{action} reverted: {reason}")]
    Reverted { action: String, reason: String },

    #[error("{action} failed: {message}")]
    Rpc { action: String, message: String },

    #[error("Event {event} not found in transaction {tx_hash}")]
    MissingEvent { event: String, tx_hash: B256 },

    #[error("Event {0} is not part of the contract interface")]
    UnknownEvent(String),

    #[error("Failed to decode {event} log: {message}")]
    Decode { event: String, message: String },

    #[error("Invalid token pair: {0}")]
    InvalidTokenPair(String),

    #[error("Operation {operation} is not supported by index factory {version}")]
    Unsupported {
        operation: &'static str,
        version: String,
    },
}

impl ChainError {
    pub fn known_revert(&self) -> Option<KnownRevert> {
        match self {
            ChainError::Reverted { reason, .. } => KnownRevert::from_reason(reason),
            _ => None,
        }
    }

    pub fn from_contract_error(action: &str, err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(err) => Self::from_transport_error(action, err),
            other => ChainError::Rpc {
                action: action.to_owned(),
                message: other.to_string(),
            },
        }
    }

    pub fn from_transport_error(action: &str, err: RpcError<TransportErrorKind>) -> Self {
        let revert_reason = err
            .as_error_resp()
            .and_then(|payload| payload.as_revert_data())
            .and_then(|data| decode_revert_reason(&data));

        if let Some(reason) = revert_reason {
            return ChainError::Reverted {
                action: action.to_owned(),
                reason,
            };
        }

        let message = err.to_string();
        if message.contains("execution reverted") || message.contains("reverted with reason") {
            ChainError::Reverted {
                action: action.to_owned(),
                reason: message,
            }
        } else {
            ChainError::Rpc {
                action: action.to_owned(),
                message,
            }
        }
    }
}

/// Revert reasons the protocol contracts are known to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownRevert {
    MissingMinterRole,
    MissingBurnerRole,
    MissingPauserRole,
    MissingRole,
    NotOwner,
    Paused,
    ProtocolInactive,
    BelowMinimumCollateral,
    AlreadyInitialized,
}

impl KnownRevert {
    pub fn from_reason(reason: &str) -> Option<Self> {
        const PATTERNS: &[(&str, KnownRevert)] = &[
            ("must have minter role", KnownRevert::MissingMinterRole),
            ("must have burner role", KnownRevert::MissingBurnerRole),
            ("must have pauser role", KnownRevert::MissingPauserRole),
            ("is missing role", KnownRevert::MissingRole),
            ("caller is not the owner", KnownRevert::NotOwner),
            ("transfer while paused", KnownRevert::Paused),
            ("Pausable: paused", KnownRevert::Paused),
            ("Protocol not active", KnownRevert::ProtocolInactive),
            ("< minimum qty", KnownRevert::BelowMinimumCollateral),
            ("already initialized", KnownRevert::AlreadyInitialized),
        ];

        PATTERNS
            .iter()
            .find(|(pattern, _)| reason.contains(pattern))
            .map(|(_, known)| *known)
    }
}
