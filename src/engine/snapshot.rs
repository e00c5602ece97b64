//! Point-in-time view of a market: decoded reserves with their rates and the
//! user's obligation. Built from raw account data, replaced wholesale on each
//! refresh.

use crate::core::error::{Error, Result};
use crate::engine::aggregator::{aggregate, Balances};
use crate::math::Decimal;
use crate::protocol::lending::rates::{compute_rates, RateResult};
use crate::protocol::lending::types::{Obligation, Reserve};
use solana_sdk::pubkey::Pubkey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveSnapshot {
    pub address: Pubkey,
    pub asset: String,
    pub reserve: Reserve,
    pub rates: RateResult,
}

impl ReserveSnapshot {
    pub fn from_account_data(asset: &str, address: Pubkey, data: &[u8]) -> Result<Self> {
        let reserve = Reserve::from_account_data(data)?;
        let rates = compute_rates(&reserve)?;
        Ok(Self {
            address,
            asset: asset.to_string(),
            reserve,
            rates,
        })
    }

    fn decimals(&self) -> u8 {
        self.reserve.liquidity.mint_decimals
    }

    /// `available + borrowed` in human units.
    pub fn total_supply_human(&self) -> f64 {
        self.reserve
            .total_liquidity()
            .map(|total| total.to_display_f64(self.decimals()))
            .unwrap_or(0.0)
    }

    pub fn total_borrow_human(&self) -> f64 {
        self.reserve
            .liquidity
            .borrowed_amount_wads
            .to_display_f64(self.decimals())
    }

    /// Quote-currency price of one liquidity token.
    pub fn market_price(&self) -> f64 {
        self.reserve.liquidity.market_price.to_f64()
    }

    /// Interest accrued since the reserve was created, in percent.
    pub fn accrued_interest_pct(&self) -> f64 {
        self.reserve
            .liquidity
            .cumulative_borrow_rate_wads
            .try_sub(Decimal::one())
            .map(|accrued| accrued.to_f64() * 100.0)
            .unwrap_or(0.0)
    }

    pub fn total_supply_value(&self) -> f64 {
        self.total_supply_human() * self.market_price()
    }

    pub fn total_borrow_value(&self) -> f64 {
        self.total_borrow_human() * self.market_price()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    pub reserves: Vec<ReserveSnapshot>,
    pub obligation: Option<(Pubkey, Obligation)>,
    pub balances: Option<Balances>,
}

impl MarketSnapshot {
    /// `reserve_data[i]` is the account data fetched for `reserves[i]`
    /// (`None` when the account does not exist). Reserves that are missing or
    /// fail to decode are skipped. A missing obligation account means the
    /// owner has not opened one yet; one that exists but fails to decode is an
    /// error.
    pub fn build(
        reserves: &[(String, Pubkey)],
        reserve_data: &[Option<Vec<u8>>],
        obligation: Option<(Pubkey, Option<&[u8]>)>,
    ) -> Result<Self> {
        if reserves.len() != reserve_data.len() {
            return Err(Error::Rpc(format!(
                "expected {} reserve accounts, got {}",
                reserves.len(),
                reserve_data.len()
            )));
        }

        let reserves: Vec<ReserveSnapshot> = reserves
            .iter()
            .zip(reserve_data)
            .filter_map(|((asset, address), data)| {
                let Some(data) = data else {
                    log::warn!("Reserve {} ({}) not found on chain, skipping", asset, address);
                    return None;
                };
                match ReserveSnapshot::from_account_data(asset, *address, data) {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        log::warn!("Failed to load reserve {} ({}): {}", asset, address, e);
                        None
                    }
                }
            })
            .collect();

        let obligation = match obligation {
            Some((address, Some(data))) => Some((address, Obligation::from_account_data(data)?)),
            Some((address, None)) => {
                log::debug!("Obligation {} does not exist yet", address);
                None
            }
            None => None,
        };

        let balances = obligation
            .as_ref()
            .map(|(_, obligation)| aggregate(obligation, &reserves));

        Ok(Self {
            reserves,
            obligation,
            balances,
        })
    }

    pub fn reserve(&self, address: &Pubkey) -> Option<&ReserveSnapshot> {
        self.reserves.iter().find(|r| r.address == *address)
    }

    pub fn reserve_by_asset(&self, asset: &str) -> Option<&ReserveSnapshot> {
        self.reserves
            .iter()
            .find(|r| r.asset.eq_ignore_ascii_case(asset))
    }
}
