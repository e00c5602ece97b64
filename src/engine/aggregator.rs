//! Joins an obligation's positions with reserve metadata into displayable
//! balances.

use crate::engine::snapshot::ReserveSnapshot;
use crate::math::Decimal;
use crate::protocol::lending::types::Obligation;
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceEntry {
    pub asset: String,
    pub reserve: Pubkey,
    /// Token amount in human units (native / 10^mint_decimals).
    pub amount: f64,
    /// Supply APY for deposits, borrow APY for borrows.
    pub apy: Decimal,
    /// Loan-to-value ratio of the reserve.
    pub collateral_factor: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    pub deposits: Vec<BalanceEntry>,
    pub borrows: Vec<BalanceEntry>,
    /// Obligation's own `deposited_value`, as last refreshed on chain.
    pub total_deposited_value: Decimal,
    /// Obligation's own `borrowed_value`, as last refreshed on chain.
    pub total_borrowed_value: Decimal,
}

/// Positions whose reserve is not in `reserves` are dropped; so are
/// zero-amount positions. Totals are never recomputed from the entries.
pub fn aggregate(obligation: &Obligation, reserves: &[ReserveSnapshot]) -> Balances {
    let deposits = obligation
        .deposits
        .iter()
        .filter(|d| d.deposited_amount > 0)
        .filter_map(|d| {
            let reserve = lookup(reserves, &d.deposit_reserve, "deposit")?;
            Some(entry(
                reserve,
                Decimal::from(d.deposited_amount),
                reserve.rates.supply_apy,
            ))
        })
        .collect();

    let borrows = obligation
        .borrows
        .iter()
        .filter(|b| !b.borrowed_amount_wads.is_zero())
        .filter_map(|b| {
            let reserve = lookup(reserves, &b.borrow_reserve, "borrow")?;
            Some(entry(reserve, b.borrowed_amount_wads, reserve.rates.borrow_apy))
        })
        .collect();

    Balances {
        deposits,
        borrows,
        total_deposited_value: obligation.deposited_value,
        total_borrowed_value: obligation.borrowed_value,
    }
}

fn lookup<'a>(reserves: &'a [ReserveSnapshot], address: &Pubkey, side: &str) -> Option<&'a ReserveSnapshot> {
    let found = reserves.iter().find(|r| r.address == *address);
    if found.is_none() {
        log::debug!("{} position references unknown reserve {}, skipping", side, address);
    }
    found
}

fn entry(reserve: &ReserveSnapshot, native_amount: Decimal, apy: Decimal) -> BalanceEntry {
    BalanceEntry {
        asset: reserve.asset.clone(),
        reserve: reserve.address,
        amount: native_amount.to_display_f64(reserve.reserve.liquidity.mint_decimals),
        apy,
        collateral_factor: Decimal::from_percent(reserve.reserve.config.loan_to_value_ratio),
    }
}
