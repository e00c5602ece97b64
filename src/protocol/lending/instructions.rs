//! Wire encoding for token-lending instructions.
//!
//! Every builder reproduces the program's fixed account schema: order and
//! signer/writable flags are part of the protocol contract and never depend
//! on argument order. A schema mistake is not detectable here; the program
//! rejects the transaction.

use super::accounts::OBLIGATION_SEED;
use super::types::OBLIGATION_LEN;
use crate::core::error::DecodeError;
use arrayref::array_ref;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, sysvar,
};
use spl_token::instruction::TokenInstruction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LendingInstruction {
    /// Accrue interest and refresh the market price of a reserve.
    RefreshReserve,
    /// Supply liquidity, receive collateral tokens.
    DepositReserveLiquidity { liquidity_amount: u64 },
    /// Burn collateral tokens, receive liquidity.
    RedeemReserveCollateral { collateral_amount: u64 },
    InitObligation,
    /// Recompute deposited/borrowed values of an obligation.
    RefreshObligation,
    DepositObligationCollateral { collateral_amount: u64 },
    WithdrawObligationCollateral { collateral_amount: u64 },
    BorrowObligationLiquidity { liquidity_amount: u64 },
    RepayObligationLiquidity { liquidity_amount: u64 },
}

impl LendingInstruction {
    pub const REFRESH_RESERVE: u8 = 3;
    pub const DEPOSIT_RESERVE_LIQUIDITY: u8 = 4;
    pub const REDEEM_RESERVE_COLLATERAL: u8 = 5;
    pub const INIT_OBLIGATION: u8 = 6;
    pub const REFRESH_OBLIGATION: u8 = 7;
    pub const DEPOSIT_OBLIGATION_COLLATERAL: u8 = 8;
    pub const WITHDRAW_OBLIGATION_COLLATERAL: u8 = 9;
    pub const BORROW_OBLIGATION_LIQUIDITY: u8 = 10;
    pub const REPAY_OBLIGATION_LIQUIDITY: u8 = 11;

    pub fn tag(&self) -> u8 {
        match self {
            Self::RefreshReserve => Self::REFRESH_RESERVE,
            Self::DepositReserveLiquidity { .. } => Self::DEPOSIT_RESERVE_LIQUIDITY,
            Self::RedeemReserveCollateral { .. } => Self::REDEEM_RESERVE_COLLATERAL,
            Self::InitObligation => Self::INIT_OBLIGATION,
            Self::RefreshObligation => Self::REFRESH_OBLIGATION,
            Self::DepositObligationCollateral { .. } => Self::DEPOSIT_OBLIGATION_COLLATERAL,
            Self::WithdrawObligationCollateral { .. } => Self::WITHDRAW_OBLIGATION_COLLATERAL,
            Self::BorrowObligationLiquidity { .. } => Self::BORROW_OBLIGATION_LIQUIDITY,
            Self::RepayObligationLiquidity { .. } => Self::REPAY_OBLIGATION_LIQUIDITY,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RefreshReserve => "RefreshReserve",
            Self::DepositReserveLiquidity { .. } => "DepositReserveLiquidity",
            Self::RedeemReserveCollateral { .. } => "RedeemReserveCollateral",
            Self::InitObligation => "InitObligation",
            Self::RefreshObligation => "RefreshObligation",
            Self::DepositObligationCollateral { .. } => "DepositObligationCollateral",
            Self::WithdrawObligationCollateral { .. } => "WithdrawObligationCollateral",
            Self::BorrowObligationLiquidity { .. } => "BorrowObligationLiquidity",
            Self::RepayObligationLiquidity { .. } => "RepayObligationLiquidity",
        }
    }

    /// `[tag][u64 LE amount]` or just `[tag]`.
    pub fn pack(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(9);
        data.push(self.tag());
        match self {
            Self::DepositReserveLiquidity { liquidity_amount }
            | Self::BorrowObligationLiquidity { liquidity_amount }
            | Self::RepayObligationLiquidity { liquidity_amount } => {
                data.extend_from_slice(&liquidity_amount.to_le_bytes());
            }
            Self::RedeemReserveCollateral { collateral_amount }
            | Self::DepositObligationCollateral { collateral_amount }
            | Self::WithdrawObligationCollateral { collateral_amount } => {
                data.extend_from_slice(&collateral_amount.to_le_bytes());
            }
            Self::RefreshReserve | Self::InitObligation | Self::RefreshObligation => {}
        }
        data
    }

    pub fn unpack(input: &[u8]) -> Result<Self, DecodeError> {
        let (&tag, rest) = input
            .split_first()
            .ok_or(DecodeError::BufferTooShort {
                expected: 1,
                actual: 0,
            })?;
        Ok(match tag {
            Self::REFRESH_RESERVE => Self::expect_empty(tag, rest, Self::RefreshReserve)?,
            Self::INIT_OBLIGATION => Self::expect_empty(tag, rest, Self::InitObligation)?,
            Self::REFRESH_OBLIGATION => Self::expect_empty(tag, rest, Self::RefreshObligation)?,
            Self::DEPOSIT_RESERVE_LIQUIDITY => Self::DepositReserveLiquidity {
                liquidity_amount: Self::unpack_u64(tag, rest)?,
            },
            Self::REDEEM_RESERVE_COLLATERAL => Self::RedeemReserveCollateral {
                collateral_amount: Self::unpack_u64(tag, rest)?,
            },
            Self::DEPOSIT_OBLIGATION_COLLATERAL => Self::DepositObligationCollateral {
                collateral_amount: Self::unpack_u64(tag, rest)?,
            },
            Self::WITHDRAW_OBLIGATION_COLLATERAL => Self::WithdrawObligationCollateral {
                collateral_amount: Self::unpack_u64(tag, rest)?,
            },
            Self::BORROW_OBLIGATION_LIQUIDITY => Self::BorrowObligationLiquidity {
                liquidity_amount: Self::unpack_u64(tag, rest)?,
            },
            Self::REPAY_OBLIGATION_LIQUIDITY => Self::RepayObligationLiquidity {
                liquidity_amount: Self::unpack_u64(tag, rest)?,
            },
            other => return Err(DecodeError::UnknownInstruction(other)),
        })
    }

    fn unpack_u64(tag: u8, rest: &[u8]) -> Result<u64, DecodeError> {
        match rest.len() {
            8 => Ok(u64::from_le_bytes(*array_ref![rest, 0, 8])),
            n if n < 8 => Err(DecodeError::InvalidInstructionData {
                tag,
                reason: "amount truncated",
            }),
            _ => Err(DecodeError::InvalidInstructionData {
                tag,
                reason: "trailing bytes after amount",
            }),
        }
    }

    fn expect_empty(tag: u8, rest: &[u8], ix: Self) -> Result<Self, DecodeError> {
        if rest.is_empty() {
            Ok(ix)
        } else {
            Err(DecodeError::InvalidInstructionData {
                tag,
                reason: "unexpected payload",
            })
        }
    }
}

pub fn refresh_reserve(program_id: Pubkey, reserve: Pubkey, reserve_liquidity_oracle: Pubkey) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(reserve, false),                            // 0. reserve
            AccountMeta::new_readonly(reserve_liquidity_oracle, false), // 1. oracle
            AccountMeta::new_readonly(sysvar::clock::id(), false),     // 2. clock
        ],
        data: LendingInstruction::RefreshReserve.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn deposit_reserve_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_collateral: Pubkey,
    reserve: Pubkey,
    reserve_liquidity_supply: Pubkey,
    reserve_collateral_mint: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),                    // 0. source liquidity
            AccountMeta::new(destination_collateral, false),              // 1. destination collateral
            AccountMeta::new(reserve, false),                             // 2. reserve
            AccountMeta::new(reserve_liquidity_supply, false),            // 3. reserve liquidity supply
            AccountMeta::new(reserve_collateral_mint, false),             // 4. reserve collateral mint
            AccountMeta::new_readonly(lending_market, false),             // 5. lending market
            AccountMeta::new_readonly(lending_market_authority, false),   // 6. lending market authority
            AccountMeta::new_readonly(user_transfer_authority, true),     // 7. transfer authority (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 8. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 9. token program
        ],
        data: LendingInstruction::DepositReserveLiquidity { liquidity_amount }.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn redeem_reserve_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_liquidity: Pubkey,
    reserve: Pubkey,
    reserve_collateral_mint: Pubkey,
    reserve_liquidity_supply: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),                   // 0. source collateral
            AccountMeta::new(destination_liquidity, false),               // 1. destination liquidity
            AccountMeta::new(reserve, false),                             // 2. reserve
            AccountMeta::new(reserve_collateral_mint, false),             // 3. reserve collateral mint
            AccountMeta::new(reserve_liquidity_supply, false),            // 4. reserve liquidity supply
            AccountMeta::new_readonly(lending_market, false),             // 5. lending market
            AccountMeta::new_readonly(lending_market_authority, false),   // 6. lending market authority
            AccountMeta::new_readonly(user_transfer_authority, true),     // 7. transfer authority (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 8. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 9. token program
        ],
        data: LendingInstruction::RedeemReserveCollateral { collateral_amount }.pack(),
    }
}

pub fn init_obligation(
    program_id: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    obligation_owner: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(obligation, false),                       // 0. obligation
            AccountMeta::new_readonly(lending_market, false),          // 1. lending market
            AccountMeta::new_readonly(obligation_owner, true),         // 2. obligation owner (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),     // 3. clock
            AccountMeta::new_readonly(sysvar::rent::id(), false),      // 4. rent
            AccountMeta::new_readonly(spl_token::id(), false),         // 5. token program
        ],
        data: LendingInstruction::InitObligation.pack(),
    }
}

/// `reserves` must list the obligation's deposit reserves, then its borrow
/// reserves, in account order (see `Obligation::refresh_reserves`).
pub fn refresh_obligation(program_id: Pubkey, obligation: Pubkey, reserves: &[Pubkey]) -> Instruction {
    let mut accounts = Vec::with_capacity(2 + reserves.len());
    accounts.push(AccountMeta::new(obligation, false));
    accounts.push(AccountMeta::new_readonly(sysvar::clock::id(), false));
    accounts.extend(
        reserves
            .iter()
            .map(|reserve| AccountMeta::new_readonly(*reserve, false)),
    );
    Instruction {
        program_id,
        accounts,
        data: LendingInstruction::RefreshObligation.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn deposit_obligation_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_collateral: Pubkey,
    deposit_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    obligation_owner: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),                   // 0. source collateral
            AccountMeta::new(destination_collateral, false),              // 1. reserve collateral supply
            AccountMeta::new(deposit_reserve, false),                     // 2. deposit reserve
            AccountMeta::new(obligation, false),                          // 3. obligation
            AccountMeta::new_readonly(lending_market, false),             // 4. lending market
            AccountMeta::new(obligation_owner, true),                     // 5. obligation owner (signer, writable)
            AccountMeta::new_readonly(user_transfer_authority, true),     // 6. transfer authority (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 7. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 8. token program
        ],
        data: LendingInstruction::DepositObligationCollateral { collateral_amount }.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn withdraw_obligation_collateral(
    program_id: Pubkey,
    collateral_amount: u64,
    source_collateral: Pubkey,
    destination_collateral: Pubkey,
    withdraw_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    obligation_owner: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_collateral, false),                   // 0. reserve collateral supply
            AccountMeta::new(destination_collateral, false),              // 1. destination collateral
            AccountMeta::new_readonly(withdraw_reserve, false),           // 2. withdraw reserve
            AccountMeta::new(obligation, false),                          // 3. obligation
            AccountMeta::new_readonly(lending_market, false),             // 4. lending market
            AccountMeta::new_readonly(lending_market_authority, false),   // 5. lending market authority
            AccountMeta::new_readonly(obligation_owner, true),            // 6. obligation owner (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 7. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 8. token program
        ],
        data: LendingInstruction::WithdrawObligationCollateral { collateral_amount }.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn borrow_obligation_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_liquidity: Pubkey,
    borrow_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    lending_market_authority: Pubkey,
    obligation_owner: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),                    // 0. reserve liquidity supply
            AccountMeta::new(destination_liquidity, false),               // 1. destination liquidity
            AccountMeta::new(borrow_reserve, false),                      // 2. borrow reserve
            AccountMeta::new(obligation, false),                          // 3. obligation
            AccountMeta::new_readonly(lending_market, false),             // 4. lending market
            AccountMeta::new_readonly(lending_market_authority, false),   // 5. lending market authority
            AccountMeta::new_readonly(obligation_owner, true),            // 6. obligation owner (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 7. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 8. token program
        ],
        data: LendingInstruction::BorrowObligationLiquidity { liquidity_amount }.pack(),
    }
}

#[allow(clippy::too_many_arguments)]
pub fn repay_obligation_liquidity(
    program_id: Pubkey,
    liquidity_amount: u64,
    source_liquidity: Pubkey,
    destination_liquidity: Pubkey,
    repay_reserve: Pubkey,
    obligation: Pubkey,
    lending_market: Pubkey,
    user_transfer_authority: Pubkey,
) -> Instruction {
    Instruction {
        program_id,
        accounts: vec![
            AccountMeta::new(source_liquidity, false),                    // 0. source liquidity
            AccountMeta::new(destination_liquidity, false),               // 1. reserve liquidity supply
            AccountMeta::new(repay_reserve, false),                       // 2. repay reserve
            AccountMeta::new(obligation, false),                          // 3. obligation
            AccountMeta::new_readonly(lending_market, false),             // 4. lending market
            AccountMeta::new_readonly(user_transfer_authority, true),     // 5. transfer authority (signer)
            AccountMeta::new_readonly(sysvar::clock::id(), false),        // 6. clock
            AccountMeta::new_readonly(spl_token::id(), false),            // 7. token program
        ],
        data: LendingInstruction::RepayObligationLiquidity { liquidity_amount }.pack(),
    }
}

/// SPL Token `Approve`: lets `delegate` move up to `amount` out of `source`.
pub fn approve(source: Pubkey, delegate: Pubkey, owner: Pubkey, amount: u64) -> Instruction {
    Instruction {
        program_id: spl_token::id(),
        accounts: vec![
            AccountMeta::new(source, false),            // 0. source token account
            AccountMeta::new_readonly(delegate, false), // 1. delegate
            AccountMeta::new_readonly(owner, true),     // 2. owner (signer)
        ],
        data: TokenInstruction::Approve { amount }.pack(),
    }
}

/// SPL Token `Revoke`: clears any delegate on `source`.
pub fn revoke(source: Pubkey, owner: Pubkey) -> Instruction {
    Instruction {
        program_id: spl_token::id(),
        accounts: vec![
            AccountMeta::new(source, false),        // 0. source token account
            AccountMeta::new_readonly(owner, true), // 1. owner (signer)
        ],
        data: TokenInstruction::Revoke.pack(),
    }
}

pub fn create_associated_token_account(payer: Pubkey, wallet: Pubkey, mint: Pubkey) -> Instruction {
    spl_associated_token_account::instruction::create_associated_token_account(
        &payer,
        &wallet,
        &mint,
        &spl_token::id(),
    )
}

/// Allocates the owner's obligation account at its seeded address, owned by
/// the lending program. Must be followed by `init_obligation`.
pub fn create_obligation_account(
    program_id: Pubkey,
    owner: Pubkey,
    obligation: Pubkey,
    lamports: u64,
) -> Instruction {
    system_instruction::create_account_with_seed(
        &owner,
        &obligation,
        &owner,
        OBLIGATION_SEED,
        lamports,
        OBLIGATION_LEN as u64,
        &program_id,
    )
}

/// Rent-exempt balance for an obligation account under default rent.
pub fn obligation_rent_exempt_lamports() -> u64 {
    Rent::default().minimum_balance(OBLIGATION_LEN)
}
