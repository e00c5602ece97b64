//! SPL token-lending client core: account layouts, rate model and
//! instruction encoding. Nothing in here performs I/O.

pub mod accounts;
pub mod flows;
pub mod instructions;
pub mod rates;
pub mod types;

use crate::core::error::DecodeError;
use types::{Obligation, Reserve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Reserve,
    Obligation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Reserve(Reserve),
    Obligation(Obligation),
}

pub fn decode(bytes: &[u8], kind: AccountKind) -> Result<Record, DecodeError> {
    match kind {
        AccountKind::Reserve => Reserve::from_account_data(bytes).map(Record::Reserve),
        AccountKind::Obligation => Obligation::from_account_data(bytes).map(Record::Obligation),
    }
}

pub fn decode_reserve(bytes: &[u8]) -> Result<Reserve, DecodeError> {
    Reserve::from_account_data(bytes)
}

pub fn decode_obligation(bytes: &[u8]) -> Result<Obligation, DecodeError> {
    Obligation::from_account_data(bytes)
}
