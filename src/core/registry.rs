//! Well-known program ids, used to label instructions when printing a batch.
//!
//! The lending program id itself comes from the market config.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

pub struct ProgramIds;

impl ProgramIds {
    /// SPL token-lending (mainnet/devnet deployment)
    pub const TOKEN_LENDING: &'static str = "LendZqTs7gn5CTSJU1jWKhKuVpjJGom45nnwPb2AMTi";

    pub const TOKEN: &'static str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

    pub const ASSOCIATED_TOKEN: &'static str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";

    pub const SYSTEM: &'static str = "11111111111111111111111111111111";

    /// Human-readable name for a program id, used when describing instructions.
    pub fn label(program_id: &Pubkey) -> Option<&'static str> {
        [
            (Self::TOKEN_LENDING, "token-lending"),
            (Self::TOKEN, "spl-token"),
            (Self::ASSOCIATED_TOKEN, "associated-token"),
            (Self::SYSTEM, "system"),
        ]
        .into_iter()
        .find(|(addr, _)| Pubkey::from_str(addr).ok().as_ref() == Some(program_id))
        .map(|(_, name)| name)
    }
}
