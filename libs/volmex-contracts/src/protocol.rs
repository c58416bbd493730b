use alloy::{
    primitives::{Address, Bytes, B256, U256},
    providers::Provider,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};

use crate::{contracts::VolmexProtocol, error::ChainError, factory::TokenPair, util::confirm};

/// Arguments of the protocol's `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    pub collateral: Address,
    pub volatility_token: Address,
    pub inverse_volatility_token: Address,
    pub minimum_collateral_qty: U256,
    pub volatility_cap_ratio: U256,
}

impl ProtocolParams {
    pub fn new(
        collateral: Address,
        pair: &TokenPair,
        minimum_collateral_qty: U256,
        volatility_cap_ratio: U256,
    ) -> Self {
        Self {
            collateral,
            volatility_token: pair.volatility_token,
            inverse_volatility_token: pair.inverse_volatility_token,
            minimum_collateral_qty,
            volatility_cap_ratio,
        }
    }

    pub fn initialize_calldata(&self) -> Bytes {
        VolmexProtocol::initializeCall {
            _collateralTokenAddress: self.collateral,
            _volatilityToken: self.volatility_token,
            _inverseVolatilityToken: self.inverse_volatility_token,
            _minimumCollateralQty: self.minimum_collateral_qty,
            _volatilityCapRatio: self.volatility_cap_ratio,
        }
        .abi_encode()
        .into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeParams {
    pub issuance_fees: U256,
    pub redeem_fees: U256,
}

/// Every readable state variable of a protocol instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolSnapshot {
    pub active: bool,
    pub collateral: Address,
    pub volatility_token: Address,
    pub inverse_volatility_token: Address,
    pub minimum_collateral_qty: U256,
    pub volatility_cap_ratio: U256,
    pub issuance_fees: U256,
    pub redeem_fees: U256,
    pub accumulated_fees: U256,
    pub owner: Address,
}

impl ProtocolSnapshot {
    pub async fn read(provider: &impl Provider, protocol: Address) -> Result<Self, ChainError> {
        let contract = VolmexProtocol::new(protocol, provider);
        let map = |action: &'static str| {
            move |err: alloy::contract::Error| ChainError::from_contract_error(action, err)
        };

        Ok(Self {
            active: contract.active().call().await.map_err(map("active"))?,
            collateral: contract
                .collateral()
                .call()
                .await
                .map_err(map("collateral"))?,
            volatility_token: contract
                .volatilityToken()
                .call()
                .await
                .map_err(map("volatilityToken"))?,
            inverse_volatility_token: contract
                .inverseVolatilityToken()
                .call()
                .await
                .map_err(map("inverseVolatilityToken"))?,
            minimum_collateral_qty: contract
                .minimumCollateralQty()
                .call()
                .await
                .map_err(map("minimumCollateralQty"))?,
            volatility_cap_ratio: contract
                .volatilityCapRatio()
                .call()
                .await
                .map_err(map("volatilityCapRatio"))?,
            issuance_fees: contract
                .issuanceFees()
                .call()
                .await
                .map_err(map("issuanceFees"))?,
            redeem_fees: contract
                .redeemFees()
                .call()
                .await
                .map_err(map("redeemFees"))?,
            accumulated_fees: contract
                .accumulatedFees()
                .call()
                .await
                .map_err(map("accumulatedFees"))?,
            owner: contract.owner().call().await.map_err(map("owner"))?,
        })
    }

    /// Names of the fields whose value differs from `other`.
    pub fn diff(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        let mut check = |name: &'static str, same: bool| {
            if !same {
                changed.push(name);
            }
        };
        check("active", self.active == other.active);
        check("collateral", self.collateral == other.collateral);
        check(
            "volatilityToken",
            self.volatility_token == other.volatility_token,
        );
        check(
            "inverseVolatilityToken",
            self.inverse_volatility_token == other.inverse_volatility_token,
        );
        check(
            "minimumCollateralQty",
            self.minimum_collateral_qty == other.minimum_collateral_qty,
        );
        check(
            "volatilityCapRatio",
            self.volatility_cap_ratio == other.volatility_cap_ratio,
        );
        check("issuanceFees", self.issuance_fees == other.issuance_fees);
        check("redeemFees", self.redeem_fees == other.redeem_fees);
        check(
            "accumulatedFees",
            self.accumulated_fees == other.accumulated_fees,
        );
        check("owner", self.owner == other.owner);
        changed
    }

    /// Names of the initialization parameters not reflected on chain.
    pub fn mismatches(&self, params: &ProtocolParams) -> Vec<&'static str> {
        let mut mismatched = Vec::new();
        if self.collateral != params.collateral {
            mismatched.push("collateral");
        }
        if self.volatility_token != params.volatility_token {
            mismatched.push("volatilityToken");
        }
        if self.inverse_volatility_token != params.inverse_volatility_token {
            mismatched.push("inverseVolatilityToken");
        }
        if self.minimum_collateral_qty != params.minimum_collateral_qty {
            mismatched.push("minimumCollateralQty");
        }
        if self.volatility_cap_ratio != params.volatility_cap_ratio {
            mismatched.push("volatilityCapRatio");
        }
        if !self.active {
            mismatched.push("active");
        }
        mismatched
    }
}

pub async fn update_fees(
    provider: &impl Provider,
    protocol: Address,
    from: Address,
    fees: FeeParams,
) -> Result<B256, ChainError> {
    let sent = VolmexProtocol::new(protocol, provider)
        .updateFees(fees.issuance_fees, fees.redeem_fees)
        .from(from)
        .send()
        .await;
    let receipt = confirm("updateFees", sent).await?;
    Ok(receipt.transaction_hash)
}

pub async fn transfer_ownership(
    provider: &impl Provider,
    protocol: Address,
    from: Address,
    new_owner: Address,
) -> Result<B256, ChainError> {
    let sent = VolmexProtocol::new(protocol, provider)
        .transferOwnership(new_owner)
        .from(from)
        .send()
        .await;
    let receipt = confirm(&format!("transferOwnership({})", new_owner), sent).await?;
    Ok(receipt.transaction_hash)
}
