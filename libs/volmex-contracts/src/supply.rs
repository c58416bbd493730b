//! Off-chain check of a position token's supply against its mint and burn
//! history.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::Filter,
    sol_types::SolEvent,
};
use serde::Serialize;
use thiserror::Error;

use crate::{contracts::ERC20, error::ChainError, events::decode_events};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupplyViolation {
    #[error("Burn of {amount} exceeds replayed supply {supply}")]
    NegativeSupply { supply: U256, amount: U256 },

    #[error("Mint of {amount} overflows replayed supply {supply}")]
    Overflow { supply: U256, amount: U256 },
}

/// Running sum of mints minus burns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SupplyLedger {
    pub supply: U256,
    pub minted: U256,
    pub burned: U256,
    pub mint_count: usize,
    pub burn_count: usize,
}

impl SupplyLedger {
    /// Ledger for a window that starts after some supply already exists.
    pub fn opening(supply: U256) -> Self {
        Self {
            supply,
            ..Default::default()
        }
    }

    pub fn apply(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), SupplyViolation> {
        match (from.is_zero(), to.is_zero()) {
            (true, true) => Ok(()),
            (true, false) => {
                self.supply = self.supply.checked_add(value).ok_or(
                    SupplyViolation::Overflow {
                        supply: self.supply,
                        amount: value,
                    },
                )?;
                self.minted = self.minted.saturating_add(value);
                self.mint_count += 1;
                Ok(())
            }
            (false, true) => {
                self.supply = self.supply.checked_sub(value).ok_or(
                    SupplyViolation::NegativeSupply {
                        supply: self.supply,
                        amount: value,
                    },
                )?;
                self.burned = self.burned.saturating_add(value);
                self.burn_count += 1;
                Ok(())
            }
            (false, false) => Ok(()),
        }
    }

    pub fn replay<'a>(
        opening_supply: U256,
        transfers: impl IntoIterator<Item = &'a ERC20::Transfer>,
    ) -> Result<Self, SupplyViolation> {
        let mut ledger = Self::opening(opening_supply);
        for transfer in transfers {
            ledger.apply(transfer.from, transfer.to, transfer.value)?;
        }
        Ok(ledger)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplyReport {
    pub token: Address,
    pub from_block: u64,
    pub to_block: u64,
    pub opening_supply: U256,
    pub ledger: SupplyLedger,
    pub on_chain: U256,
}

impl SupplyReport {
    pub fn consistent(&self) -> bool {
        self.ledger.supply == self.on_chain
    }
}

/// Blocks per `eth_getLogs` request.
const LOG_CHUNK: u64 = 10_000;

/// Replay every `Transfer` of `token` since `from_block` and compare with
/// `totalSupply()` at the last replayed block.
///
/// A window that starts after block zero opens with `totalSupply()` read at
/// `from_block - 1`, so burns of earlier mints stay within the ledger.
pub async fn audit_supply(
    provider: &impl Provider,
    token: Address,
    from_block: u64,
) -> eyre::Result<SupplyReport> {
    let to_block = provider.get_block_number().await?;
    let base_filter = Filter::new()
        .address(token)
        .event_signature(ERC20::Transfer::SIGNATURE_HASH);

    let mut transfers = Vec::new();
    let mut start = from_block;
    while start <= to_block {
        let end = to_block.min(start.saturating_add(LOG_CHUNK - 1));
        let logs = provider
            .get_logs(&base_filter.clone().from_block(start).to_block(end))
            .await
            .map_err(|err| ChainError::from_transport_error("eth_getLogs", err))?;
        tracing::debug!(%token, start, end, count = logs.len(), "Fetched transfer logs");
        transfers.extend(decode_events::<ERC20::Transfer>(&logs, token)?);
        start = end + 1;
    }

    let erc20 = ERC20::new(token, provider);
    let opening_supply = match from_block.checked_sub(1) {
        Some(before) => erc20
            .totalSupply()
            .block(before.into())
            .call()
            .await
            .map_err(|err| ChainError::from_contract_error("totalSupply", err))?,
        None => U256::ZERO,
    };

    let ledger = SupplyLedger::replay(opening_supply, &transfers)?;
    let on_chain = erc20
        .totalSupply()
        .block(to_block.into())
        .call()
        .await
        .map_err(|err| ChainError::from_contract_error("totalSupply", err))?;

    let report = SupplyReport {
        token,
        from_block,
        to_block,
        opening_supply,
        ledger,
        on_chain,
    };

    if report.consistent() {
        tracing::info!(
            %token,
            supply = %report.on_chain,
            mints = report.ledger.mint_count,
            burns = report.ledger.burn_count,
            "Supply matches mint and burn history"
        );
    } else {
        tracing::warn!(
            %token,
            replayed = %report.ledger.supply,
            on_chain = %report.on_chain,
            "Supply does not match mint and burn history"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod test {
    use alloy::primitives::{address, Address, U256};

    use super::{SupplyLedger, SupplyReport, SupplyViolation};
    use crate::contracts::ERC20;

    const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
    const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");

    fn transfer(from: Address, to: Address, value: u64) -> ERC20::Transfer {
        ERC20::Transfer {
            from,
            to,
            value: U256::from(value),
        }
    }

    #[test]
    fn test_supply_is_mints_minus_burns() {
        let transfers = vec![
            transfer(Address::ZERO, ALICE, 100),
            transfer(Address::ZERO, BOB, 50),
            transfer(ALICE, BOB, 30),
            transfer(BOB, Address::ZERO, 20),
        ];

        let ledger = SupplyLedger::replay(U256::ZERO, &transfers).unwrap();
        assert_eq!(ledger.supply, U256::from(130));
        assert_eq!(ledger.minted, U256::from(150));
        assert_eq!(ledger.burned, U256::from(20));
        assert_eq!(ledger.mint_count, 2);
        assert_eq!(ledger.burn_count, 1);
    }

    #[test]
    fn test_burn_below_zero_is_violation() {
        let transfers = vec![
            transfer(Address::ZERO, ALICE, 10),
            transfer(ALICE, Address::ZERO, 11),
        ];

        assert_eq!(
            SupplyLedger::replay(U256::ZERO, &transfers),
            Err(SupplyViolation::NegativeSupply {
                supply: U256::from(10),
                amount: U256::from(11),
            })
        );
    }

    #[test]
    fn test_window_burns_earlier_mints() {
        // 100 minted before the window opens
        let transfers = vec![
            transfer(ALICE, Address::ZERO, 40),
            transfer(Address::ZERO, BOB, 5),
        ];

        let ledger = SupplyLedger::replay(U256::from(100), &transfers).unwrap();
        assert_eq!(ledger.supply, U256::from(65));
        assert_eq!(ledger.minted, U256::from(5));
        assert_eq!(ledger.burned, U256::from(40));
        assert_eq!(ledger.burn_count, 1);
    }

    #[test]
    fn test_window_report_is_consistent() {
        let transfers = vec![transfer(Address::ZERO, ALICE, 25)];
        let report = SupplyReport {
            token: ALICE,
            from_block: 1200,
            to_block: 1300,
            opening_supply: U256::from(100),
            ledger: SupplyLedger::replay(U256::from(100), &transfers).unwrap(),
            on_chain: U256::from(125),
        };
        assert!(report.consistent());
    }

    #[test]
    fn test_mint_overflow_is_violation() {
        let mut ledger = SupplyLedger::default();
        ledger.apply(Address::ZERO, ALICE, U256::MAX).unwrap();
        assert!(matches!(
            ledger.apply(Address::ZERO, BOB, U256::from(1)),
            Err(SupplyViolation::Overflow { .. })
        ));
    }

    #[test]
    fn test_empty_history_is_zero() {
        let ledger = SupplyLedger::replay(U256::ZERO, &[]).unwrap();
        assert_eq!(ledger, SupplyLedger::default());
    }
}
