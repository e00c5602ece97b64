//! Reserve and Obligation account layouts.
//!
//! Both records are fixed-length buffers. Fields are split with `array_refs!`,
//! whose widths must add up to the record length at compile time, so every
//! byte belongs either to a field or to a named reserved region.

use super::rates::{borrow_rate, utilization_rate};
use crate::core::error::{ArithmeticError, DecodeError};
use crate::math::Decimal;
use arrayref::{array_ref, array_refs};
use solana_sdk::clock::{DEFAULT_TICKS_PER_SECOND, DEFAULT_TICKS_PER_SLOT, SECONDS_PER_DAY};
use solana_sdk::pubkey::{Pubkey, PUBKEY_BYTES};

/// Version written by the program into every initialised account.
pub const PROGRAM_VERSION: u8 = 1;

pub const RESERVE_LEN: usize = 571; // 1 + 8 + 1 + 32 + 32 + 1 + 32 + 32 + 32 + 8 + 16 + 16 + 16 + 32 + 8 + 32 + 7 + 8 + 8 + 1 + 248
pub const OBLIGATION_LEN: usize = 916; // 1 + 8 + 1 + 32 + 32 + 16 * 4 + 1 + 1 + 776
pub const MAX_OBLIGATION_RESERVES: usize = 10;
/// Collateral minted per liquidity unit by the first deposit.
pub const INITIAL_COLLATERAL_RATIO: u64 = 1;
/// Slot count the program compounds the annual borrow rate over.
pub const SLOTS_PER_YEAR: u64 = DEFAULT_TICKS_PER_SECOND / DEFAULT_TICKS_PER_SLOT * SECONDS_PER_DAY * 365;

const OBLIGATION_COLLATERAL_LEN: usize = 56; // 32 + 8 + 16
const OBLIGATION_LIQUIDITY_LEN: usize = 80; // 32 + 16 + 16 + 16
const OBLIGATION_DATA_FLAT_LEN: usize =
    OBLIGATION_COLLATERAL_LEN + OBLIGATION_LIQUIDITY_LEN * (MAX_OBLIGATION_RESERVES - 1);
const RESERVE_PADDING_LEN: usize = 248;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastUpdate {
    pub slot: u64,
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reserve {
    pub version: u8,
    pub last_update: LastUpdate,
    pub lending_market: Pubkey,
    pub liquidity: ReserveLiquidity,
    pub collateral: ReserveCollateral,
    pub config: ReserveConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveLiquidity {
    pub mint_pubkey: Pubkey,
    pub mint_decimals: u8,
    pub supply_pubkey: Pubkey,
    pub fee_receiver: Pubkey,
    pub oracle_pubkey: Pubkey,
    /// Native units sitting in the supply account.
    pub available_amount: u64,
    pub borrowed_amount_wads: Decimal,
    pub cumulative_borrow_rate_wads: Decimal,
    /// Quote-currency price of one whole token.
    pub market_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveCollateral {
    pub mint_pubkey: Pubkey,
    pub mint_total_supply: u64,
    pub supply_pubkey: Pubkey,
}

/// Rate curve and risk parameters. Rates are integer percentage points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReserveConfig {
    pub optimal_utilization_rate: u8,
    pub loan_to_value_ratio: u8,
    pub liquidation_bonus: u8,
    pub liquidation_threshold: u8,
    pub min_borrow_rate: u8,
    pub optimal_borrow_rate: u8,
    pub max_borrow_rate: u8,
    pub fees: ReserveFees,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReserveFees {
    pub borrow_fee_wad: u64,
    pub flash_loan_fee_wad: u64,
    pub host_fee_percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Obligation {
    pub version: u8,
    pub last_update: LastUpdate,
    pub lending_market: Pubkey,
    pub owner: Pubkey,
    /// Protocol-computed market value of all deposits.
    pub deposited_value: Decimal,
    /// Protocol-computed market value of all borrows.
    pub borrowed_value: Decimal,
    pub allowed_borrow_value: Decimal,
    pub unhealthy_borrow_value: Decimal,
    pub deposits: Vec<ObligationCollateral>,
    pub borrows: Vec<ObligationLiquidity>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationCollateral {
    pub deposit_reserve: Pubkey,
    /// Collateral tokens, native units.
    pub deposited_amount: u64,
    pub market_value: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObligationLiquidity {
    pub borrow_reserve: Pubkey,
    pub cumulative_borrow_rate_wads: Decimal,
    pub borrowed_amount_wads: Decimal,
    pub market_value: Decimal,
}

impl Reserve {
    pub fn from_account_data(data: &[u8]) -> Result<Self, DecodeError> {
        let input = fixed_len::<RESERVE_LEN>(data)?;
        #[allow(clippy::ptr_offset_with_cast)]
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            liquidity_mint_pubkey,
            liquidity_mint_decimals,
            liquidity_supply_pubkey,
            liquidity_fee_receiver,
            liquidity_oracle_pubkey,
            liquidity_available_amount,
            liquidity_borrowed_amount_wads,
            liquidity_cumulative_borrow_rate_wads,
            liquidity_market_price,
            collateral_mint_pubkey,
            collateral_mint_total_supply,
            collateral_supply_pubkey,
            config_optimal_utilization_rate,
            config_loan_to_value_ratio,
            config_liquidation_bonus,
            config_liquidation_threshold,
            config_min_borrow_rate,
            config_optimal_borrow_rate,
            config_max_borrow_rate,
            config_fees_borrow_fee_wad,
            config_fees_flash_loan_fee_wad,
            config_fees_host_fee_percentage,
            _padding,
        ) = array_refs![
            input,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            8,
            16,
            16,
            16,
            PUBKEY_BYTES,
            8,
            PUBKEY_BYTES,
            1,
            1,
            1,
            1,
            1,
            1,
            1,
            8,
            8,
            1,
            RESERVE_PADDING_LEN
        ];

        Ok(Reserve {
            version: unpack_version(version)?,
            last_update: LastUpdate {
                slot: u64::from_le_bytes(*last_update_slot),
                stale: unpack_bool(last_update_stale, "reserve.last_update.stale")?,
            },
            lending_market: Pubkey::new_from_array(*lending_market),
            liquidity: ReserveLiquidity {
                mint_pubkey: Pubkey::new_from_array(*liquidity_mint_pubkey),
                mint_decimals: u8::from_le_bytes(*liquidity_mint_decimals),
                supply_pubkey: Pubkey::new_from_array(*liquidity_supply_pubkey),
                fee_receiver: Pubkey::new_from_array(*liquidity_fee_receiver),
                oracle_pubkey: Pubkey::new_from_array(*liquidity_oracle_pubkey),
                available_amount: u64::from_le_bytes(*liquidity_available_amount),
                borrowed_amount_wads: unpack_decimal(liquidity_borrowed_amount_wads),
                cumulative_borrow_rate_wads: unpack_decimal(liquidity_cumulative_borrow_rate_wads),
                market_price: unpack_decimal(liquidity_market_price),
            },
            collateral: ReserveCollateral {
                mint_pubkey: Pubkey::new_from_array(*collateral_mint_pubkey),
                mint_total_supply: u64::from_le_bytes(*collateral_mint_total_supply),
                supply_pubkey: Pubkey::new_from_array(*collateral_supply_pubkey),
            },
            config: ReserveConfig {
                optimal_utilization_rate: u8::from_le_bytes(*config_optimal_utilization_rate),
                loan_to_value_ratio: u8::from_le_bytes(*config_loan_to_value_ratio),
                liquidation_bonus: u8::from_le_bytes(*config_liquidation_bonus),
                liquidation_threshold: u8::from_le_bytes(*config_liquidation_threshold),
                min_borrow_rate: u8::from_le_bytes(*config_min_borrow_rate),
                optimal_borrow_rate: u8::from_le_bytes(*config_optimal_borrow_rate),
                max_borrow_rate: u8::from_le_bytes(*config_max_borrow_rate),
                fees: ReserveFees {
                    borrow_fee_wad: u64::from_le_bytes(*config_fees_borrow_fee_wad),
                    flash_loan_fee_wad: u64::from_le_bytes(*config_fees_flash_loan_fee_wad),
                    host_fee_percentage: u8::from_le_bytes(*config_fees_host_fee_percentage),
                },
            },
        })
    }

    /// `available + borrowed` in native units.
    pub fn total_liquidity(&self) -> Result<Decimal, ArithmeticError> {
        Decimal::from(self.liquidity.available_amount).try_add(self.liquidity.borrowed_amount_wads)
    }

    /// Collateral tokens minted per unit of liquidity. An empty reserve mints
    /// at `INITIAL_COLLATERAL_RATIO`.
    pub fn collateral_exchange_rate(&self) -> Result<Decimal, ArithmeticError> {
        let total_liquidity = self.total_liquidity()?;
        if self.collateral.mint_total_supply == 0 || total_liquidity.is_zero() {
            return Ok(Decimal::from(INITIAL_COLLATERAL_RATIO));
        }
        Decimal::from(self.collateral.mint_total_supply).try_div(total_liquidity)
    }

    /// Compound borrow interest from `last_update.slot` up to `current_slot`,
    /// the way `RefreshReserve` does on chain. Borrowed liquidity grows, so
    /// the collateral exchange rate afterwards is lower.
    pub fn accrue_interest(&mut self, current_slot: u64) -> Result<(), ArithmeticError> {
        let slots_elapsed = current_slot.saturating_sub(self.last_update.slot);
        if slots_elapsed == 0 {
            return Ok(());
        }

        let utilization = utilization_rate(
            Decimal::from(self.liquidity.available_amount),
            self.liquidity.borrowed_amount_wads,
        )?;
        let slot_interest_rate = borrow_rate(&self.config, utilization)?.try_div_u64(SLOTS_PER_YEAR)?;
        let compounded_interest_rate = Decimal::one()
            .try_add(slot_interest_rate)?
            .try_pow(slots_elapsed)?;

        self.liquidity.cumulative_borrow_rate_wads = self
            .liquidity
            .cumulative_borrow_rate_wads
            .try_mul(compounded_interest_rate)?;
        self.liquidity.borrowed_amount_wads = self
            .liquidity
            .borrowed_amount_wads
            .try_mul(compounded_interest_rate)?;
        self.last_update.slot = current_slot;
        Ok(())
    }

    pub fn liquidity_to_collateral(&self, liquidity_amount: u64) -> Result<u64, ArithmeticError> {
        Decimal::from(liquidity_amount)
            .try_mul(self.collateral_exchange_rate()?)?
            .try_floor_u64()
    }

    pub fn collateral_to_liquidity(&self, collateral_amount: u64) -> Result<u64, ArithmeticError> {
        Decimal::from(collateral_amount)
            .try_div(self.collateral_exchange_rate()?)?
            .try_floor_u64()
    }
}

impl Obligation {
    pub fn from_account_data(data: &[u8]) -> Result<Self, DecodeError> {
        let input = fixed_len::<OBLIGATION_LEN>(data)?;
        #[allow(clippy::ptr_offset_with_cast)]
        let (
            version,
            last_update_slot,
            last_update_stale,
            lending_market,
            owner,
            deposited_value,
            borrowed_value,
            allowed_borrow_value,
            unhealthy_borrow_value,
            deposits_len,
            borrows_len,
            data_flat,
        ) = array_refs![
            input,
            1,
            8,
            1,
            PUBKEY_BYTES,
            PUBKEY_BYTES,
            16,
            16,
            16,
            16,
            1,
            1,
            OBLIGATION_DATA_FLAT_LEN
        ];

        let deposits_len = u8::from_le_bytes(*deposits_len) as usize;
        let borrows_len = u8::from_le_bytes(*borrows_len) as usize;
        if deposits_len + borrows_len > MAX_OBLIGATION_RESERVES
            || deposits_len * OBLIGATION_COLLATERAL_LEN + borrows_len * OBLIGATION_LIQUIDITY_LEN
                > OBLIGATION_DATA_FLAT_LEN
        {
            return Err(DecodeError::InvalidEntryCount {
                deposits: deposits_len,
                borrows: borrows_len,
                max: MAX_OBLIGATION_RESERVES,
            });
        }

        let mut offset = 0;
        let mut deposits = Vec::with_capacity(deposits_len);
        for _ in 0..deposits_len {
            let entry = array_ref![data_flat, offset, OBLIGATION_COLLATERAL_LEN];
            #[allow(clippy::ptr_offset_with_cast)]
            let (deposit_reserve, deposited_amount, market_value) =
                array_refs![entry, PUBKEY_BYTES, 8, 16];
            deposits.push(ObligationCollateral {
                deposit_reserve: Pubkey::new_from_array(*deposit_reserve),
                deposited_amount: u64::from_le_bytes(*deposited_amount),
                market_value: unpack_decimal(market_value),
            });
            offset += OBLIGATION_COLLATERAL_LEN;
        }

        let mut borrows = Vec::with_capacity(borrows_len);
        for _ in 0..borrows_len {
            let entry = array_ref![data_flat, offset, OBLIGATION_LIQUIDITY_LEN];
            #[allow(clippy::ptr_offset_with_cast)]
            let (borrow_reserve, cumulative_borrow_rate_wads, borrowed_amount_wads, market_value) =
                array_refs![entry, PUBKEY_BYTES, 16, 16, 16];
            borrows.push(ObligationLiquidity {
                borrow_reserve: Pubkey::new_from_array(*borrow_reserve),
                cumulative_borrow_rate_wads: unpack_decimal(cumulative_borrow_rate_wads),
                borrowed_amount_wads: unpack_decimal(borrowed_amount_wads),
                market_value: unpack_decimal(market_value),
            });
            offset += OBLIGATION_LIQUIDITY_LEN;
        }

        Ok(Obligation {
            version: unpack_version(version)?,
            last_update: LastUpdate {
                slot: u64::from_le_bytes(*last_update_slot),
                stale: unpack_bool(last_update_stale, "obligation.last_update.stale")?,
            },
            lending_market: Pubkey::new_from_array(*lending_market),
            owner: Pubkey::new_from_array(*owner),
            deposited_value: unpack_decimal(deposited_value),
            borrowed_value: unpack_decimal(borrowed_value),
            allowed_borrow_value: unpack_decimal(allowed_borrow_value),
            unhealthy_borrow_value: unpack_decimal(unhealthy_borrow_value),
            deposits,
            borrows,
        })
    }

    /// Reserves the program expects, in order, after the obligation in a
    /// `RefreshObligation` instruction.
    pub fn refresh_reserves(&self) -> Vec<Pubkey> {
        self.deposits
            .iter()
            .map(|d| d.deposit_reserve)
            .chain(self.borrows.iter().map(|b| b.borrow_reserve))
            .collect()
    }
}

fn fixed_len<const LEN: usize>(data: &[u8]) -> Result<&[u8; LEN], DecodeError> {
    if data.len() < LEN {
        return Err(DecodeError::BufferTooShort {
            expected: LEN,
            actual: data.len(),
        });
    }
    if data.len() > LEN {
        return Err(DecodeError::BufferTooLong {
            expected: LEN,
            actual: data.len(),
        });
    }
    <&[u8; LEN]>::try_from(data).map_err(|_| DecodeError::BufferTooShort {
        expected: LEN,
        actual: data.len(),
    })
}

fn unpack_version(src: &[u8; 1]) -> Result<u8, DecodeError> {
    match src[0] {
        PROGRAM_VERSION => Ok(PROGRAM_VERSION),
        value => Err(DecodeError::UnknownDiscriminant {
            field: "version",
            value,
        }),
    }
}

fn unpack_bool(src: &[u8; 1], field: &'static str) -> Result<bool, DecodeError> {
    match src[0] {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(DecodeError::UnknownDiscriminant { field, value }),
    }
}

fn unpack_decimal(src: &[u8; 16]) -> Decimal {
    Decimal::from_scaled_val(u128::from_le_bytes(*src))
}
