//! Account-data fixtures written at raw byte offsets, independent of the
//! decoder under test.

#![allow(dead_code)]

use lending_client::lending::types::{OBLIGATION_LEN, PROGRAM_VERSION, RESERVE_LEN};
use lending_client::math::WAD;
use solana_sdk::pubkey::Pubkey;

pub const WAD_U128: u128 = WAD as u128;

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

#[derive(Debug, Clone)]
pub struct ReserveFixture {
    pub lending_market: Pubkey,
    pub liquidity_mint: Pubkey,
    pub mint_decimals: u8,
    pub liquidity_supply: Pubkey,
    pub fee_receiver: Pubkey,
    pub oracle: Pubkey,
    pub available_amount: u64,
    pub borrowed_amount_wads: u128,
    pub cumulative_borrow_rate_wads: u128,
    pub market_price: u128,
    pub collateral_mint: Pubkey,
    pub collateral_mint_total_supply: u64,
    pub collateral_supply: Pubkey,
    pub optimal_utilization_rate: u8,
    pub loan_to_value_ratio: u8,
    pub liquidation_bonus: u8,
    pub liquidation_threshold: u8,
    pub min_borrow_rate: u8,
    pub optimal_borrow_rate: u8,
    pub max_borrow_rate: u8,
    pub borrow_fee_wad: u64,
    pub flash_loan_fee_wad: u64,
    pub host_fee_percentage: u8,
}

impl Default for ReserveFixture {
    fn default() -> Self {
        Self {
            lending_market: Pubkey::new_unique(),
            liquidity_mint: Pubkey::new_unique(),
            mint_decimals: 6,
            liquidity_supply: Pubkey::new_unique(),
            fee_receiver: Pubkey::new_unique(),
            oracle: Pubkey::new_unique(),
            available_amount: 900,
            borrowed_amount_wads: 100 * WAD_U128,
            cumulative_borrow_rate_wads: WAD_U128,
            market_price: WAD_U128,
            collateral_mint: Pubkey::new_unique(),
            collateral_mint_total_supply: 0,
            collateral_supply: Pubkey::new_unique(),
            optimal_utilization_rate: 80,
            loan_to_value_ratio: 75,
            liquidation_bonus: 5,
            liquidation_threshold: 80,
            min_borrow_rate: 0,
            optimal_borrow_rate: 8,
            max_borrow_rate: 100,
            borrow_fee_wad: 0,
            flash_loan_fee_wad: 0,
            host_fee_percentage: 0,
        }
    }
}

impl ReserveFixture {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; RESERVE_LEN];
        put(&mut buf, 0, &[PROGRAM_VERSION]);
        put(&mut buf, 1, &42u64.to_le_bytes());
        put(&mut buf, 9, &[0]);
        put(&mut buf, 10, self.lending_market.as_ref());
        put(&mut buf, 42, self.liquidity_mint.as_ref());
        put(&mut buf, 74, &[self.mint_decimals]);
        put(&mut buf, 75, self.liquidity_supply.as_ref());
        put(&mut buf, 107, self.fee_receiver.as_ref());
        put(&mut buf, 139, self.oracle.as_ref());
        put(&mut buf, 171, &self.available_amount.to_le_bytes());
        put(&mut buf, 179, &self.borrowed_amount_wads.to_le_bytes());
        put(&mut buf, 195, &self.cumulative_borrow_rate_wads.to_le_bytes());
        put(&mut buf, 211, &self.market_price.to_le_bytes());
        put(&mut buf, 227, self.collateral_mint.as_ref());
        put(&mut buf, 259, &self.collateral_mint_total_supply.to_le_bytes());
        put(&mut buf, 267, self.collateral_supply.as_ref());
        put(
            &mut buf,
            299,
            &[
                self.optimal_utilization_rate,
                self.loan_to_value_ratio,
                self.liquidation_bonus,
                self.liquidation_threshold,
                self.min_borrow_rate,
                self.optimal_borrow_rate,
                self.max_borrow_rate,
            ],
        );
        put(&mut buf, 306, &self.borrow_fee_wad.to_le_bytes());
        put(&mut buf, 314, &self.flash_loan_fee_wad.to_le_bytes());
        put(&mut buf, 322, &[self.host_fee_percentage]);
        buf
    }
}

#[derive(Debug, Clone)]
pub struct DepositFixture {
    pub reserve: Pubkey,
    pub amount: u64,
    pub market_value: u128,
}

#[derive(Debug, Clone)]
pub struct BorrowFixture {
    pub reserve: Pubkey,
    pub cumulative_borrow_rate_wads: u128,
    pub borrowed_amount_wads: u128,
    pub market_value: u128,
}

#[derive(Debug, Clone)]
pub struct ObligationFixture {
    pub lending_market: Pubkey,
    pub owner: Pubkey,
    pub deposited_value: u128,
    pub borrowed_value: u128,
    pub allowed_borrow_value: u128,
    pub unhealthy_borrow_value: u128,
    pub deposits: Vec<DepositFixture>,
    pub borrows: Vec<BorrowFixture>,
}

impl Default for ObligationFixture {
    fn default() -> Self {
        Self {
            lending_market: Pubkey::new_unique(),
            owner: Pubkey::new_unique(),
            deposited_value: 0,
            borrowed_value: 0,
            allowed_borrow_value: 0,
            unhealthy_borrow_value: 0,
            deposits: Vec::new(),
            borrows: Vec::new(),
        }
    }
}

impl ObligationFixture {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; OBLIGATION_LEN];
        put(&mut buf, 0, &[PROGRAM_VERSION]);
        put(&mut buf, 1, &7u64.to_le_bytes());
        put(&mut buf, 9, &[1]);
        put(&mut buf, 10, self.lending_market.as_ref());
        put(&mut buf, 42, self.owner.as_ref());
        put(&mut buf, 74, &self.deposited_value.to_le_bytes());
        put(&mut buf, 90, &self.borrowed_value.to_le_bytes());
        put(&mut buf, 106, &self.allowed_borrow_value.to_le_bytes());
        put(&mut buf, 122, &self.unhealthy_borrow_value.to_le_bytes());
        put(&mut buf, 138, &[self.deposits.len() as u8]);
        put(&mut buf, 139, &[self.borrows.len() as u8]);

        let mut offset = 140;
        for d in &self.deposits {
            put(&mut buf, offset, d.reserve.as_ref());
            put(&mut buf, offset + 32, &d.amount.to_le_bytes());
            put(&mut buf, offset + 40, &d.market_value.to_le_bytes());
            offset += 56;
        }
        for b in &self.borrows {
            put(&mut buf, offset, b.reserve.as_ref());
            put(&mut buf, offset + 32, &b.cumulative_borrow_rate_wads.to_le_bytes());
            put(&mut buf, offset + 48, &b.borrowed_amount_wads.to_le_bytes());
            put(&mut buf, offset + 64, &b.market_value.to_le_bytes());
            offset += 80;
        }
        buf
    }
}
