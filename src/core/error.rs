use thiserror::Error;

/// Failure to turn raw bytes into a typed record or instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("buffer too long: expected {expected} bytes, got {actual}")]
    BufferTooLong { expected: usize, actual: usize },

    #[error("unknown discriminant {value} for {field}")]
    UnknownDiscriminant { field: &'static str, value: u8 },

    #[error("invalid entry count: {deposits} deposits + {borrows} borrows exceeds {max}")]
    InvalidEntryCount { deposits: usize, borrows: usize, max: usize },

    #[error("unknown instruction tag {0}")]
    UnknownInstruction(u8),

    #[error("invalid instruction data for tag {tag}: {reason}")]
    InvalidInstructionData { tag: u8, reason: &'static str },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Address derivation error: {0}")]
    Address(String),

    #[error("No oracle known for reserve {0}")]
    MissingOracle(solana_sdk::pubkey::Pubkey),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] ArithmeticError),
}

pub type Result<T> = std::result::Result<T, Error>;
