use crate::Amount;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient balance for {address}: has {balance}, needs {amount}")]
    InsufficientBalance {
        address: String,
        balance: Amount,
        amount: Amount,
    },
    #[error("nonce search gave up after {attempts} attempts at difficulty {difficulty}")]
    NonceSearchExhausted { attempts: u64, difficulty: u32 },
    #[error("block rejected: {0}")]
    InvalidBlock(#[from] BlockRejection),
}

/// Why an externally sealed block was refused by [`crate::Ledger::add_block`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockRejection {
    #[error("stored hash does not match block content")]
    HashMismatch,
    #[error("previous hash does not match the chain tip")]
    BrokenLink,
    #[error("hash has {found} leading zero digits, {required} required")]
    InsufficientWork { required: u32, found: u32 },
    #[error("transfer from {address} exceeds its balance")]
    Overdraft { address: String },
}

/// First integrity fault found while walking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainFault {
    #[error("block {index} hash does not match its content")]
    HashMismatch { index: usize },
    #[error("block {index} does not link to its predecessor")]
    BrokenLink { index: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("difficulty {difficulty} exceeds the {max} hex digits of a hash")]
    DifficultyTooHigh { difficulty: u32, max: u32 },
    #[error("{field} must be a non-negative number")]
    NegativeAmount { field: &'static str },
    #[error("{field} must be greater than zero")]
    ZeroDivisor { field: &'static str },
}
