//! User-facing operations composed from single instructions.
//!
//! Builders are pure: the caller resolves which prerequisite accounts already
//! exist, generates a throwaway transfer-authority keypair, and signs with the
//! keys listed in [`Flow::signers`]. Later instructions in a batch may refer to
//! accounts created by earlier ones, so the order is fixed.
//!
//! The program only accepts a reserve refreshed in the current slot, and a
//! liquidity deposit marks it stale again, so each flow refreshes its reserve
//! ahead of the instructions that read it.

use super::accounts::get_associated_token_address;
use super::instructions::{
    approve, borrow_obligation_liquidity, create_associated_token_account, create_obligation_account,
    deposit_obligation_collateral, deposit_reserve_liquidity, init_obligation, redeem_reserve_collateral,
    refresh_obligation, refresh_reserve, repay_obligation_liquidity, revoke,
    withdraw_obligation_collateral,
};
use super::types::{Obligation, Reserve};
use crate::core::error::{ArithmeticError, Error};
use solana_sdk::{clock::MAX_PROCESSING_AGE, instruction::Instruction, pubkey::Pubkey};

/// Addresses shared by every reserve of one lending market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketAccounts {
    pub program_id: Pubkey,
    pub lending_market: Pubkey,
    pub lending_market_authority: Pubkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveAccounts {
    pub reserve: Pubkey,
    pub liquidity_mint: Pubkey,
    pub liquidity_supply: Pubkey,
    pub collateral_mint: Pubkey,
    pub collateral_supply: Pubkey,
    pub oracle: Pubkey,
}

impl ReserveAccounts {
    pub fn new(address: Pubkey, reserve: &Reserve) -> Self {
        Self {
            reserve: address,
            liquidity_mint: reserve.liquidity.mint_pubkey,
            liquidity_supply: reserve.liquidity.supply_pubkey,
            collateral_mint: reserve.collateral.mint_pubkey,
            collateral_supply: reserve.collateral.supply_pubkey,
            oracle: reserve.liquidity.oracle_pubkey,
        }
    }
}

/// The wallet driving a flow and its seeded obligation account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserAccounts {
    pub owner: Pubkey,
    pub obligation: Pubkey,
}

/// Which prerequisite accounts were found on chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExistingAccounts {
    pub liquidity_ata: bool,
    pub collateral_ata: bool,
    pub obligation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flow {
    pub instructions: Vec<Instruction>,
    /// Delegate approved for token transfers, if the flow uses one.
    pub transfer_authority: Option<Pubkey>,
}

impl Flow {
    /// Keys that must sign the batch, fee payer (owner) first.
    pub fn signers(&self, owner: Pubkey) -> Vec<Pubkey> {
        std::iter::once(owner).chain(self.transfer_authority).collect()
    }
}

/// Supply liquidity and post the minted collateral to the obligation.
///
/// The collateral leg is sized from the exchange rate the reserve will have
/// once interest is accrued up to `MAX_PROCESSING_AGE` slots past
/// `current_slot`, the last slot the batch can land in. Accrual only lowers
/// the rate, so the amount never exceeds what the deposit mints.
#[allow(clippy::too_many_arguments)]
pub fn lend(
    market: &MarketAccounts,
    reserve_accounts: &ReserveAccounts,
    reserve: &Reserve,
    user: &UserAccounts,
    existing: ExistingAccounts,
    transfer_authority: Pubkey,
    liquidity_amount: u64,
    obligation_rent_lamports: u64,
    current_slot: u64,
) -> Result<Flow, ArithmeticError> {
    let mut projected = reserve.clone();
    projected.accrue_interest(current_slot.saturating_add(MAX_PROCESSING_AGE as u64))?;
    let collateral_amount = projected.liquidity_to_collateral(liquidity_amount)?;
    let source_liquidity = get_associated_token_address(&user.owner, &reserve_accounts.liquidity_mint);
    let user_collateral = get_associated_token_address(&user.owner, &reserve_accounts.collateral_mint);

    let mut instructions = Vec::new();
    if !existing.liquidity_ata {
        instructions.push(create_associated_token_account(
            user.owner,
            user.owner,
            reserve_accounts.liquidity_mint,
        ));
    }
    if !existing.collateral_ata {
        instructions.push(create_associated_token_account(
            user.owner,
            user.owner,
            reserve_accounts.collateral_mint,
        ));
    }
    if !existing.obligation {
        instructions.extend(create_obligation(market, user, obligation_rent_lamports));
    }

    instructions.push(refresh_own_reserve(market, reserve_accounts));
    instructions.push(approve(source_liquidity, transfer_authority, user.owner, liquidity_amount));
    instructions.push(deposit_reserve_liquidity(
        market.program_id,
        liquidity_amount,
        source_liquidity,
        user_collateral,
        reserve_accounts.reserve,
        reserve_accounts.liquidity_supply,
        reserve_accounts.collateral_mint,
        market.lending_market,
        market.lending_market_authority,
        transfer_authority,
    ));
    instructions.push(revoke(source_liquidity, user.owner));

    instructions.push(refresh_own_reserve(market, reserve_accounts));
    instructions.push(approve(user_collateral, transfer_authority, user.owner, collateral_amount));
    instructions.push(deposit_obligation_collateral(
        market.program_id,
        collateral_amount,
        user_collateral,
        reserve_accounts.collateral_supply,
        reserve_accounts.reserve,
        user.obligation,
        market.lending_market,
        user.owner,
        transfer_authority,
    ));
    instructions.push(revoke(user_collateral, user.owner));

    Ok(Flow {
        instructions,
        transfer_authority: Some(transfer_authority),
    })
}

/// Pull collateral out of the obligation and redeem it for liquidity.
pub fn withdraw(
    market: &MarketAccounts,
    reserve_accounts: &ReserveAccounts,
    user: &UserAccounts,
    existing: ExistingAccounts,
    transfer_authority: Pubkey,
    collateral_amount: u64,
    obligation_rent_lamports: u64,
) -> Flow {
    let user_collateral = get_associated_token_address(&user.owner, &reserve_accounts.collateral_mint);
    let destination_liquidity = get_associated_token_address(&user.owner, &reserve_accounts.liquidity_mint);

    let mut instructions = Vec::new();
    if !existing.obligation {
        instructions.extend(create_obligation(market, user, obligation_rent_lamports));
    }

    instructions.push(refresh_own_reserve(market, reserve_accounts));
    instructions.push(withdraw_obligation_collateral(
        market.program_id,
        collateral_amount,
        reserve_accounts.collateral_supply,
        user_collateral,
        reserve_accounts.reserve,
        user.obligation,
        market.lending_market,
        market.lending_market_authority,
        user.owner,
    ));
    instructions.push(approve(user_collateral, transfer_authority, user.owner, collateral_amount));
    instructions.push(redeem_reserve_collateral(
        market.program_id,
        collateral_amount,
        user_collateral,
        destination_liquidity,
        reserve_accounts.reserve,
        reserve_accounts.collateral_mint,
        reserve_accounts.liquidity_supply,
        market.lending_market,
        market.lending_market_authority,
        transfer_authority,
    ));
    instructions.push(revoke(user_collateral, user.owner));

    Flow {
        instructions,
        transfer_authority: Some(transfer_authority),
    }
}

pub fn borrow(
    market: &MarketAccounts,
    reserve_accounts: &ReserveAccounts,
    user: &UserAccounts,
    existing: ExistingAccounts,
    liquidity_amount: u64,
) -> Flow {
    let destination_liquidity = get_associated_token_address(&user.owner, &reserve_accounts.liquidity_mint);

    let mut instructions = Vec::new();
    if !existing.liquidity_ata {
        instructions.push(create_associated_token_account(
            user.owner,
            user.owner,
            reserve_accounts.liquidity_mint,
        ));
    }
    instructions.push(refresh_own_reserve(market, reserve_accounts));
    instructions.push(borrow_obligation_liquidity(
        market.program_id,
        liquidity_amount,
        reserve_accounts.liquidity_supply,
        destination_liquidity,
        reserve_accounts.reserve,
        user.obligation,
        market.lending_market,
        market.lending_market_authority,
        user.owner,
    ));

    Flow {
        instructions,
        transfer_authority: None,
    }
}

pub fn repay(
    market: &MarketAccounts,
    reserve_accounts: &ReserveAccounts,
    user: &UserAccounts,
    existing: ExistingAccounts,
    transfer_authority: Pubkey,
    liquidity_amount: u64,
) -> Flow {
    let source_liquidity = get_associated_token_address(&user.owner, &reserve_accounts.liquidity_mint);

    let mut instructions = Vec::new();
    if !existing.liquidity_ata {
        instructions.push(create_associated_token_account(
            user.owner,
            user.owner,
            reserve_accounts.liquidity_mint,
        ));
    }
    instructions.push(refresh_own_reserve(market, reserve_accounts));
    instructions.push(approve(source_liquidity, transfer_authority, user.owner, liquidity_amount));
    instructions.push(repay_obligation_liquidity(
        market.program_id,
        liquidity_amount,
        source_liquidity,
        reserve_accounts.liquidity_supply,
        reserve_accounts.reserve,
        user.obligation,
        market.lending_market,
        transfer_authority,
    ));
    instructions.push(revoke(source_liquidity, user.owner));

    Flow {
        instructions,
        transfer_authority: Some(transfer_authority),
    }
}

/// `RefreshReserve` for every reserve the obligation touches, then
/// `RefreshObligation`. The program rejects withdraw, borrow and repay against
/// a stale obligation, so callers prepend this to those flows.
///
/// `oracle_of` maps a reserve address to its liquidity oracle. The obligation
/// refresh fails on chain unless every listed reserve is fresh, so a reserve
/// it cannot resolve is an error.
pub fn refresh_instructions<F>(
    market: &MarketAccounts,
    obligation_address: Pubkey,
    obligation: &Obligation,
    oracle_of: F,
) -> Result<Vec<Instruction>, Error>
where
    F: Fn(&Pubkey) -> Option<Pubkey>,
{
    let reserves = obligation.refresh_reserves();
    let mut unique: Vec<Pubkey> = Vec::with_capacity(reserves.len());
    for reserve in &reserves {
        if !unique.contains(reserve) {
            unique.push(*reserve);
        }
    }

    let mut instructions = unique
        .iter()
        .map(|reserve| {
            oracle_of(reserve)
                .map(|oracle| refresh_reserve(market.program_id, *reserve, oracle))
                .ok_or(Error::MissingOracle(*reserve))
        })
        .collect::<Result<Vec<_>, _>>()?;
    instructions.push(refresh_obligation(market.program_id, obligation_address, &reserves));
    Ok(instructions)
}

fn refresh_own_reserve(market: &MarketAccounts, reserve_accounts: &ReserveAccounts) -> Instruction {
    refresh_reserve(market.program_id, reserve_accounts.reserve, reserve_accounts.oracle)
}

fn create_obligation(market: &MarketAccounts, user: &UserAccounts, lamports: u64) -> [Instruction; 2] {
    [
        create_obligation_account(market.program_id, user.owner, user.obligation, lamports),
        init_obligation(market.program_id, user.obligation, market.lending_market, user.owner),
    ]
}
