use crate::core::error::{Error, Result};
use solana_sdk::pubkey::Pubkey;

/// Seed for the per-owner obligation account.
pub const OBLIGATION_SEED: &str = "obligation";

/// The obligation account is created with `create_account_with_seed`, so its
/// address is `sha256(owner || "obligation" || program_id)`.
pub fn derive_obligation_address(owner: &Pubkey, program_id: &Pubkey) -> Result<Pubkey> {
    Pubkey::create_with_seed(owner, OBLIGATION_SEED, program_id)
        .map_err(|e| Error::Address(format!("Failed to derive obligation address: {}", e)))
}

pub fn derive_lending_market_authority(lending_market: &Pubkey, program_id: &Pubkey) -> Result<Pubkey> {
    let seeds = &[lending_market.as_ref()];

    Pubkey::try_find_program_address(seeds, program_id)
        .map(|(pubkey, _)| pubkey)
        .ok_or_else(|| Error::Address("Failed to derive lending market authority".to_string()))
}

pub fn get_associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}
