mod common;

use common::{BorrowFixture, DepositFixture, ObligationFixture, ReserveFixture};
use lending_client::lending::accounts::{derive_lending_market_authority, derive_obligation_address, get_associated_token_address};
use lending_client::lending::flows::{
    borrow, lend, refresh_instructions, repay, withdraw, ExistingAccounts, MarketAccounts, ReserveAccounts,
    UserAccounts,
};
use lending_client::lending::instructions::LendingInstruction;
use lending_client::lending::{decode_obligation, decode_reserve};
use lending_client::error::Error;
use lending_client::lending::types::{Obligation, Reserve, SLOTS_PER_YEAR};
use solana_sdk::clock::MAX_PROCESSING_AGE;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

const RENT: u64 = 7_000_000;
/// Slot the reserve fixtures were last refreshed at.
const FIXTURE_SLOT: u64 = 42;

struct Setup {
    market: MarketAccounts,
    reserve: Reserve,
    reserve_accounts: ReserveAccounts,
    user: UserAccounts,
}

fn setup(fixture: ReserveFixture) -> Setup {
    let program_id = Pubkey::new_unique();
    let lending_market = Pubkey::new_unique();
    let market = MarketAccounts {
        program_id,
        lending_market,
        lending_market_authority: derive_lending_market_authority(&lending_market, &program_id).unwrap(),
    };
    let reserve = decode_reserve(&fixture.encode()).unwrap();
    let reserve_accounts = ReserveAccounts::new(Pubkey::new_unique(), &reserve);
    let owner = Pubkey::new_unique();
    let user = UserAccounts {
        owner,
        obligation: derive_obligation_address(&owner, &program_id).unwrap(),
    };
    Setup { market, reserve, reserve_accounts, user }
}

/// Short label per instruction: lending tag, or the program for anything else.
fn shape(instructions: &[Instruction], lending_program: &Pubkey) -> Vec<String> {
    instructions
        .iter()
        .map(|ix| {
            if ix.program_id == *lending_program {
                LendingInstruction::unpack(&ix.data).unwrap().name().to_string()
            } else if ix.program_id == spl_token::id() {
                match ix.data[0] {
                    4 => "Approve".to_string(),
                    5 => "Revoke".to_string(),
                    other => format!("Token{}", other),
                }
            } else if ix.program_id == spl_associated_token_account::id() {
                "CreateAta".to_string()
            } else if ix.program_id == system_program::id() {
                "CreateAccountWithSeed".to_string()
            } else {
                ix.program_id.to_string()
            }
        })
        .collect()
}

#[test]
fn test_lend_with_everything_present() {
    let s = setup(ReserveFixture::default());
    let authority = Pubkey::new_unique();
    let existing = ExistingAccounts { liquidity_ata: true, collateral_ata: true, obligation: true };
    let flow = lend(&s.market, &s.reserve_accounts, &s.reserve, &s.user, existing, authority, 1_000, RENT, FIXTURE_SLOT)
        .unwrap();

    assert_eq!(
        shape(&flow.instructions, &s.market.program_id),
        vec![
            "RefreshReserve",
            "Approve",
            "DepositReserveLiquidity",
            "Revoke",
            "RefreshReserve",
            "Approve",
            "DepositObligationCollateral",
            "Revoke"
        ]
    );
    assert_eq!(flow.transfer_authority, Some(authority));
    assert_eq!(flow.signers(s.user.owner), vec![s.user.owner, authority]);

    let source = get_associated_token_address(&s.user.owner, &s.reserve_accounts.liquidity_mint);
    let collateral = get_associated_token_address(&s.user.owner, &s.reserve_accounts.collateral_mint);
    for refresh in [&flow.instructions[0], &flow.instructions[4]] {
        assert_eq!(refresh.accounts[0].pubkey, s.reserve_accounts.reserve);
        assert_eq!(refresh.accounts[1].pubkey, s.reserve_accounts.oracle);
    }
    assert_eq!(flow.instructions[1].accounts[0].pubkey, source);
    assert_eq!(flow.instructions[2].accounts[1].pubkey, collateral);
    assert_eq!(flow.instructions[5].accounts[0].pubkey, collateral);
    assert_eq!(flow.instructions[6].accounts[0].pubkey, collateral);
    assert_eq!(flow.instructions[6].accounts[1].pubkey, s.reserve_accounts.collateral_supply);
    assert_eq!(flow.instructions[6].accounts[3].pubkey, s.user.obligation);
}

#[test]
fn test_lend_creates_missing_accounts_first() {
    let s = setup(ReserveFixture::default());
    let flow = lend(
        &s.market,
        &s.reserve_accounts,
        &s.reserve,
        &s.user,
        ExistingAccounts::default(),
        Pubkey::new_unique(),
        1_000,
        RENT,
        FIXTURE_SLOT,
    )
    .unwrap();

    let shape = shape(&flow.instructions, &s.market.program_id);
    assert_eq!(
        &shape[..5],
        &["CreateAta", "CreateAta", "CreateAccountWithSeed", "InitObligation", "RefreshReserve"]
    );
    assert_eq!(shape.len(), 12);
    assert_eq!(flow.instructions[3].accounts[0].pubkey, s.user.obligation);
}

#[test]
fn test_lend_sizes_collateral_by_exchange_rate() {
    // A flat zero-rate curve accrues nothing, leaving the rate at 3 cTokens per unit.
    let s = setup(ReserveFixture {
        available_amount: 900,
        collateral_mint_total_supply: 3_000,
        optimal_borrow_rate: 0,
        max_borrow_rate: 0,
        ..ReserveFixture::default()
    });
    let existing = ExistingAccounts { liquidity_ata: true, collateral_ata: true, obligation: true };
    let flow = lend(&s.market, &s.reserve_accounts, &s.reserve, &s.user, existing, Pubkey::new_unique(), 100, RENT, FIXTURE_SLOT)
        .unwrap();

    assert_eq!(
        LendingInstruction::unpack(&flow.instructions[2].data).unwrap(),
        LendingInstruction::DepositReserveLiquidity { liquidity_amount: 100 }
    );
    assert_eq!(
        LendingInstruction::unpack(&flow.instructions[6].data).unwrap(),
        LendingInstruction::DepositObligationCollateral { collateral_amount: 300 }
    );
}

#[test]
fn test_lend_collateral_accounts_for_pending_interest() {
    // Supply 1000 cTokens over 900 available + 100 borrowed: 1:1 before the
    // refresh, but a year of 1% interest lands at refresh time.
    let s = setup(ReserveFixture {
        collateral_mint_total_supply: 1_000,
        ..ReserveFixture::default()
    });
    assert_eq!(s.reserve.liquidity_to_collateral(1_000).unwrap(), 1_000);

    let current_slot = FIXTURE_SLOT + SLOTS_PER_YEAR;
    let existing = ExistingAccounts { liquidity_ata: true, collateral_ata: true, obligation: true };
    let flow = lend(&s.market, &s.reserve_accounts, &s.reserve, &s.user, existing, Pubkey::new_unique(), 1_000, RENT, current_slot)
        .unwrap();

    let LendingInstruction::DepositObligationCollateral { collateral_amount } =
        LendingInstruction::unpack(&flow.instructions[6].data).unwrap()
    else {
        panic!("expected DepositObligationCollateral");
    };

    let mut refreshed_now = s.reserve.clone();
    refreshed_now.accrue_interest(current_slot).unwrap();
    let minted_now = refreshed_now.liquidity_to_collateral(1_000).unwrap();

    let mut refreshed_late = s.reserve.clone();
    refreshed_late.accrue_interest(current_slot + MAX_PROCESSING_AGE as u64).unwrap();
    let minted_late = refreshed_late.liquidity_to_collateral(1_000).unwrap();

    assert!(collateral_amount < 1_000);
    assert!(collateral_amount <= minted_now);
    assert_eq!(collateral_amount, minted_late);
}

#[test]
fn test_withdraw_pulls_from_collateral_supply() {
    let s = setup(ReserveFixture::default());
    let existing = ExistingAccounts { obligation: true, ..ExistingAccounts::default() };
    let flow = withdraw(&s.market, &s.reserve_accounts, &s.user, existing, Pubkey::new_unique(), 50, RENT);

    assert_eq!(
        shape(&flow.instructions, &s.market.program_id),
        vec!["RefreshReserve", "WithdrawObligationCollateral", "Approve", "RedeemReserveCollateral", "Revoke"]
    );
    assert_eq!(flow.instructions[0].accounts[0].pubkey, s.reserve_accounts.reserve);
    let withdraw_ix = &flow.instructions[1];
    assert_eq!(withdraw_ix.accounts[0].pubkey, s.reserve_accounts.collateral_supply);
    assert_ne!(withdraw_ix.accounts[0].pubkey, s.reserve_accounts.liquidity_supply);
    assert_eq!(withdraw_ix.accounts[6].pubkey, s.user.owner);
}

#[test]
fn test_withdraw_opens_obligation_when_missing() {
    let s = setup(ReserveFixture::default());
    let flow = withdraw(
        &s.market,
        &s.reserve_accounts,
        &s.user,
        ExistingAccounts::default(),
        Pubkey::new_unique(),
        50,
        RENT,
    );
    let shape = shape(&flow.instructions, &s.market.program_id);
    assert_eq!(&shape[..2], &["CreateAccountWithSeed", "InitObligation"]);
    assert_eq!(shape.len(), 7);
}

#[test]
fn test_borrow_needs_no_transfer_authority() {
    let s = setup(ReserveFixture::default());
    let flow = borrow(&s.market, &s.reserve_accounts, &s.user, ExistingAccounts::default(), 10);
    assert_eq!(
        shape(&flow.instructions, &s.market.program_id),
        vec!["CreateAta", "RefreshReserve", "BorrowObligationLiquidity"]
    );
    assert_eq!(flow.transfer_authority, None);
    assert_eq!(flow.signers(s.user.owner), vec![s.user.owner]);
    assert_eq!(
        flow.instructions[2].accounts[1].pubkey,
        get_associated_token_address(&s.user.owner, &s.reserve_accounts.liquidity_mint)
    );
}

#[test]
fn test_borrowing_a_new_asset_refreshes_its_reserve() {
    // The obligation only holds SOL; borrowing from another reserve must still
    // refresh that reserve in the same batch.
    let s = setup(ReserveFixture::default());
    let sol = Pubkey::new_unique();
    let obligation = decode_obligation(
        &ObligationFixture {
            deposits: vec![DepositFixture { reserve: sol, amount: 1, market_value: 0 }],
            ..ObligationFixture::default()
        }
        .encode(),
    )
    .unwrap();
    let sol_oracle = Pubkey::new_unique();

    let existing = ExistingAccounts { liquidity_ata: true, ..ExistingAccounts::default() };
    let mut ixs = refresh_instructions(&s.market, s.user.obligation, &obligation, |r| {
        (*r == sol).then_some(sol_oracle)
    })
    .unwrap();
    ixs.extend(borrow(&s.market, &s.reserve_accounts, &s.user, existing, 10).instructions);

    assert_eq!(
        shape(&ixs, &s.market.program_id),
        vec!["RefreshReserve", "RefreshObligation", "RefreshReserve", "BorrowObligationLiquidity"]
    );
    let refreshed: Vec<Pubkey> = ixs
        .iter()
        .filter(|ix| LendingInstruction::unpack(&ix.data).ok() == Some(LendingInstruction::RefreshReserve))
        .map(|ix| ix.accounts[0].pubkey)
        .collect();
    assert_eq!(refreshed, vec![sol, s.reserve_accounts.reserve]);
    assert_eq!(ixs[2].accounts[1].pubkey, s.reserve_accounts.oracle);
}

#[test]
fn test_repay_is_bracketed_by_approve_and_revoke() {
    let s = setup(ReserveFixture::default());
    let existing = ExistingAccounts { liquidity_ata: true, ..ExistingAccounts::default() };
    let authority = Pubkey::new_unique();
    let flow = repay(&s.market, &s.reserve_accounts, &s.user, existing, authority, 10);
    assert_eq!(
        shape(&flow.instructions, &s.market.program_id),
        vec!["RefreshReserve", "Approve", "RepayObligationLiquidity", "Revoke"]
    );
    assert_eq!(flow.instructions[0].accounts[0].pubkey, s.reserve_accounts.reserve);
    assert_eq!(flow.instructions[1].accounts[1].pubkey, authority);
    assert_eq!(flow.instructions[2].accounts[1].pubkey, s.reserve_accounts.liquidity_supply);
}

fn sol_usdc_obligation(sol: Pubkey, usdc: Pubkey) -> Obligation {
    decode_obligation(
        &ObligationFixture {
            deposits: vec![
                DepositFixture { reserve: sol, amount: 1, market_value: 0 },
                DepositFixture { reserve: usdc, amount: 1, market_value: 0 },
            ],
            borrows: vec![BorrowFixture {
                reserve: sol,
                cumulative_borrow_rate_wads: 0,
                borrowed_amount_wads: 0,
                market_value: 0,
            }],
            ..ObligationFixture::default()
        }
        .encode(),
    )
    .unwrap()
}

#[test]
fn test_refresh_instructions_cover_each_reserve_once() {
    let s = setup(ReserveFixture::default());
    let (sol, usdc) = (Pubkey::new_unique(), Pubkey::new_unique());
    let obligation = sol_usdc_obligation(sol, usdc);
    let oracle = Pubkey::new_unique();

    let ixs = refresh_instructions(&s.market, s.user.obligation, &obligation, |r| {
        (*r == sol || *r == usdc).then_some(oracle)
    })
    .unwrap();

    assert_eq!(
        shape(&ixs, &s.market.program_id),
        vec!["RefreshReserve", "RefreshReserve", "RefreshObligation"]
    );
    assert_eq!(ixs[0].accounts[0].pubkey, sol);
    assert_eq!(ixs[1].accounts[0].pubkey, usdc);
    let listed: Vec<Pubkey> = ixs[2].accounts[2..].iter().map(|m| m.pubkey).collect();
    assert_eq!(listed, vec![sol, usdc, sol]);
}

#[test]
fn test_refresh_instructions_reject_reserve_without_oracle() {
    let s = setup(ReserveFixture::default());
    let (sol, unknown) = (Pubkey::new_unique(), Pubkey::new_unique());
    let obligation = sol_usdc_obligation(sol, unknown);
    let oracle = Pubkey::new_unique();

    let err = refresh_instructions(&s.market, s.user.obligation, &obligation, |r| (*r == sol).then_some(oracle))
        .unwrap_err();
    assert!(matches!(err, Error::MissingOracle(reserve) if reserve == unknown), "{}", err);
}
