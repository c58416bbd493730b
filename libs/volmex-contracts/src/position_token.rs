use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    providers::Provider,
    sol_types::SolConstructor,
};
use eyre::eyre;

use crate::{
    contracts::{MaticVolatilityToken, PositionToken},
    error::ChainError,
    util::confirm,
};

pub const DEFAULT_ADMIN_ROLE: B256 = B256::ZERO;

/// Access control roles of a position token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenRole {
    Admin,
    Minter,
    Burner,
    Pauser,
}

impl TokenRole {
    pub fn id(&self) -> B256 {
        match self {
            TokenRole::Admin => DEFAULT_ADMIN_ROLE,
            TokenRole::Minter => keccak256("MINTER_ROLE"),
            TokenRole::Burner => keccak256("BURNER_ROLE"),
            TokenRole::Pauser => keccak256("PAUSER_ROLE"),
        }
    }
}

/// Name and symbol of the inverse token paired with `name`/`symbol`.
pub fn inverse_token_names(name: &str, symbol: &str) -> (String, String) {
    (format!("Inverse {}", name), format!("i{}", symbol))
}

/// Constructor arguments of the bridged token deployed without the factory.
pub fn matic_constructor_args(name: &str, symbol: &str, child_chain_manager: Address) -> Bytes {
    MaticVolatilityToken::constructorCall {
        name: name.to_owned(),
        symbol: symbol.to_owned(),
        childChainManager: child_chain_manager,
    }
    .abi_encode()
    .into()
}

pub async fn has_role(
    provider: &impl Provider,
    token: Address,
    role: TokenRole,
    account: Address,
) -> Result<bool, ChainError> {
    PositionToken::new(token, provider)
        .hasRole(role.id(), account)
        .call()
        .await
        .map_err(|err| ChainError::from_contract_error("hasRole", err))
}

pub async fn grant_role(
    provider: &impl Provider,
    token: Address,
    from: Address,
    role: TokenRole,
    account: Address,
) -> Result<B256, ChainError> {
    let sent = PositionToken::new(token, provider)
        .grantRole(role.id(), account)
        .from(from)
        .send()
        .await;
    let receipt = confirm(&format!("grantRole({:?}, {})", role, account), sent).await?;
    Ok(receipt.transaction_hash)
}

pub async fn renounce_role(
    provider: &impl Provider,
    token: Address,
    from: Address,
    role: TokenRole,
) -> Result<B256, ChainError> {
    let sent = PositionToken::new(token, provider)
        .renounceRole(role.id(), from)
        .from(from)
        .send()
        .await;
    let receipt = confirm(&format!("renounceRole({:?})", role), sent).await?;
    Ok(receipt.transaction_hash)
}

/// Move the admin role of `token` from `from` to `new_admin`.
///
/// The role is renounced only once `new_admin` is confirmed to hold it, so a
/// failed grant never leaves the token without an admin.
pub async fn hand_over_admin(
    provider: &impl Provider,
    token: Address,
    from: Address,
    new_admin: Address,
) -> eyre::Result<()> {
    if new_admin == from {
        return Err(eyre!("New admin {} is the current admin", new_admin));
    }

    if !has_role(provider, token, TokenRole::Admin, new_admin).await? {
        grant_role(provider, token, from, TokenRole::Admin, new_admin).await?;
    }

    if !has_role(provider, token, TokenRole::Admin, new_admin).await? {
        return Err(eyre!(
            "Admin role was not granted to {} on {}, keeping current admin",
            new_admin,
            token
        ));
    }

    renounce_role(provider, token, from, TokenRole::Admin).await?;
    tracing::info!(%token, %new_admin, "Token admin handed over");
    Ok(())
}

/// Readable token state, used for reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub total_supply: U256,
    pub paused: bool,
}

pub async fn token_info(provider: &impl Provider, token: Address) -> Result<TokenInfo, ChainError> {
    let contract = PositionToken::new(token, provider);
    let map = |action: &'static str| {
        move |err: alloy::contract::Error| ChainError::from_contract_error(action, err)
    };

    Ok(TokenInfo {
        address: token,
        name: contract.name().call().await.map_err(map("name"))?,
        symbol: contract.symbol().call().await.map_err(map("symbol"))?,
        total_supply: contract
            .totalSupply()
            .call()
            .await
            .map_err(map("totalSupply"))?,
        paused: contract.paused().call().await.map_err(map("paused"))?,
    })
}
