pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod registry;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LedgerConfig, RewardPolicy};
pub use error::{BlockRejection, ChainFault, ConfigError, LedgerError};
pub use ledger::{Ledger, SharedLedger};
pub use registry::{RewardRegistry, Shopkeeper};

pub type Hash = [u8; 32];
pub type Amount = f64;

/// Previous-hash sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: Hash = [0u8; 32];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// Value moved between two accounts; admitted only against the sender's balance.
    Transfer {
        from: String,
        to: String,
        amount: Amount,
        timestamp: u64,
    },
    /// Value minted by the protocol (mining and loyalty rewards).
    Issuance {
        to: String,
        amount: Amount,
        timestamp: u64,
    },
}

impl Transaction {
    pub fn transfer(
        from: impl Into<String>,
        to: impl Into<String>,
        amount: Amount,
        timestamp: u64,
    ) -> Self {
        Transaction::Transfer {
            from: from.into(),
            to: to.into(),
            amount,
            timestamp,
        }
    }

    pub fn issuance(to: impl Into<String>, amount: Amount, timestamp: u64) -> Self {
        Transaction::Issuance {
            to: to.into(),
            amount,
            timestamp,
        }
    }

    /// Debited account, `None` for issuance.
    pub fn sender(&self) -> Option<&str> {
        match self {
            Transaction::Transfer { from, .. } => Some(from.as_str()),
            Transaction::Issuance { .. } => None,
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Transaction::Transfer { to, .. } | Transaction::Issuance { to, .. } => to.as_str(),
        }
    }

    pub fn amount(&self) -> Amount {
        match self {
            Transaction::Transfer { amount, .. } | Transaction::Issuance { amount, .. } => *amount,
        }
    }

    pub fn timestamp(&self) -> u64 {
        match self {
            Transaction::Transfer { timestamp, .. } | Transaction::Issuance { timestamp, .. } => {
                *timestamp
            }
        }
    }

    pub fn is_issuance(&self) -> bool {
        matches!(self, Transaction::Issuance { .. })
    }

    pub fn touches(&self, address: &str) -> bool {
        self.sender() == Some(address) || self.recipient() == address
    }

    /// Signed effect of this transaction on `address`. A self-transfer nets to zero.
    pub fn balance_delta(&self, address: &str) -> Amount {
        let mut delta = 0.0;
        if self.sender() == Some(address) {
            delta -= self.amount();
        }
        if self.recipient() == address {
            delta += self.amount();
        }
        delta
    }

    /// Stable encoding fed into the block hash: a variant tag followed by
    /// length-prefixed strings and little-endian numbers.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(64);
        match self {
            Transaction::Transfer {
                from,
                to,
                amount,
                timestamp,
            } => {
                bytes.push(0);
                push_str(&mut bytes, from);
                push_str(&mut bytes, to);
                bytes.extend_from_slice(&amount.to_le_bytes());
                bytes.extend_from_slice(&timestamp.to_le_bytes());
            }
            Transaction::Issuance {
                to,
                amount,
                timestamp,
            } => {
                bytes.push(1);
                push_str(&mut bytes, to);
                bytes.extend_from_slice(&amount.to_le_bytes());
                bytes.extend_from_slice(&timestamp.to_le_bytes());
            }
        }
        bytes
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.sender().unwrap_or(constants::NETWORK_ADDRESS);
        write!(f, "{} -> {}: {}", from, self.recipient(), self.amount())
    }
}

fn push_str(bytes: &mut Vec<u8>, s: &str) {
    bytes.extend_from_slice(&(s.len() as u64).to_le_bytes());
    bytes.extend_from_slice(s.as_bytes());
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: Hash,
    pub nonce: u64,
    pub hash: Hash,
}

impl Block {
    /// New unsealed block with nonce 0 and its hash computed from the current fields.
    pub fn new(timestamp: u64, transactions: Vec<Transaction>, previous_hash: Hash) -> Self {
        let mut block = Self {
            timestamp,
            transactions,
            previous_hash,
            nonce: 0,
            hash: [0u8; 32],
        };
        block.hash = block.calculate_hash();
        block
    }

    /// A zero-transaction block linked to the all-zero sentinel.
    pub fn genesis(timestamp: u64) -> Self {
        Self::new(timestamp, vec![], GENESIS_PREVIOUS_HASH)
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(8 + 8 + self.transactions.len() * 64 + 32 + 8);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&(self.transactions.len() as u64).to_le_bytes());
        for tx in &self.transactions {
            bytes.extend_from_slice(&tx.hash_bytes());
        }
        bytes.extend_from_slice(&self.previous_hash);
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    pub fn calculate_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.hash_bytes());
        hasher.finalize().into()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::count_leading_zero_digits(&self.hash) >= difficulty
    }

    /// Seal the block: bump the nonce until the hash has `difficulty` leading
    /// zero hex digits. Unbounded; returns only on success.
    pub fn mine_block(&mut self, difficulty: u32) {
        while !self.meets_difficulty(difficulty) {
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
        }
    }

    /// Same search as [`Block::mine_block`], giving up after `max_attempts`
    /// rehashes. Returns the number of rehashes spent.
    pub fn try_mine_block(
        &mut self,
        difficulty: u32,
        max_attempts: u64,
    ) -> Result<u64, LedgerError> {
        let mut attempts = 0u64;
        while !self.meets_difficulty(difficulty) {
            if attempts >= max_attempts {
                return Err(LedgerError::NonceSearchExhausted {
                    attempts,
                    difficulty,
                });
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.calculate_hash();
            attempts += 1;
        }
        Ok(attempts)
    }

    pub fn issued_amount(&self) -> Amount {
        self.transactions
            .iter()
            .filter(|tx| tx.is_issuance())
            .map(Transaction::amount)
            .sum()
    }
}

pub mod pow {
    use super::Hash;

    pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
        let mut total = 0u32;
        for b in hash {
            if *b == 0 {
                total += 8;
            } else {
                total += b.leading_zeros();
                break;
            }
        }
        total
    }

    /// Leading zero digits of the hash's hex form, i.e. whole zero nibbles.
    pub fn count_leading_zero_digits(hash: &Hash) -> u32 {
        count_leading_zero_bits(hash) / 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_txs() -> Vec<Transaction> {
        vec![
            Transaction::transfer("Alice", "Bob", 10.0, 1_600_000_000),
            Transaction::issuance("Charlie", 5.0, 1_600_000_100),
        ]
    }

    #[test]
    fn leading_zero_bits_examples() {
        let mut h = [0u8; 32];
        assert_eq!(pow::count_leading_zero_bits(&h), 256);
        h[0] = 0x0F; // 00001111
        assert_eq!(pow::count_leading_zero_bits(&h), 4);
        h = [0u8; 32];
        h[1] = 0x80; // 00000000 10000000
        assert_eq!(pow::count_leading_zero_bits(&h), 8);
        h[1] = 0x40; // 01000000
        assert_eq!(pow::count_leading_zero_bits(&h), 9);
    }

    #[test]
    fn leading_zero_digits_follow_hex_form() {
        let mut h = [0xFFu8; 32];
        h[0] = 0x00;
        h[1] = 0x0A;
        assert!(hex::encode(h).starts_with("000a"));
        assert_eq!(pow::count_leading_zero_digits(&h), 3);
        h[1] = 0x10;
        assert_eq!(pow::count_leading_zero_digits(&h), 2);
        assert_eq!(pow::count_leading_zero_digits(&[0u8; 32]), 64);
    }

    #[test]
    fn new_block_hash_matches_content() {
        let block = Block::new(1_600_000_200, sample_txs(), [7u8; 32]);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis(1_600_000_000);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.nonce, 0);
    }

    #[test]
    fn block_hash_consistency() {
        let block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        assert_eq!(block.calculate_hash(), block.calculate_hash());
        assert_eq!(block.hash_hex().len(), constants::HASH_HEX_SIZE);
    }

    #[test]
    fn block_hash_changes_with_each_field() {
        let block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        let base = block.calculate_hash();

        let mut b = block.clone();
        b.nonce += 1;
        assert_ne!(b.calculate_hash(), base);

        let mut b = block.clone();
        b.timestamp += 1;
        assert_ne!(b.calculate_hash(), base);

        let mut b = block.clone();
        b.previous_hash[31] = 1;
        assert_ne!(b.calculate_hash(), base);

        let mut b = block.clone();
        b.transactions.reverse();
        assert_ne!(b.calculate_hash(), base);

        let mut b = block;
        b.transactions[0] = Transaction::transfer("Alice", "Bob", 11.0, 1_600_000_000);
        assert_ne!(b.calculate_hash(), base);
    }

    #[test]
    fn transfer_and_issuance_encode_differently() {
        let transfer = Transaction::transfer("network", "Bob", 10.0, 1);
        let issuance = Transaction::issuance("Bob", 10.0, 1);
        assert_ne!(transfer.hash_bytes(), issuance.hash_bytes());
    }

    #[test]
    fn string_boundaries_are_unambiguous() {
        let a = Transaction::transfer("ab", "c", 1.0, 1);
        let b = Transaction::transfer("a", "bc", 1.0, 1);
        assert_ne!(a.hash_bytes(), b.hash_bytes());
    }

    #[test]
    fn mine_block_reaches_difficulty() {
        let mut block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        block.mine_block(2);
        assert!(block.hash_hex().starts_with("00"));
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn mine_block_at_zero_difficulty_keeps_nonce() {
        let mut block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        let before = block.hash;
        block.mine_block(0);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, before);
    }

    #[test]
    fn try_mine_block_gives_up() {
        let mut block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        let err = block.try_mine_block(64, 10).unwrap_err();
        assert_eq!(
            err,
            LedgerError::NonceSearchExhausted {
                attempts: 10,
                difficulty: 64
            }
        );
        assert_eq!(block.nonce, 10);
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn try_mine_block_counts_attempts() {
        let mut block = Block::new(1_600_000_200, sample_txs(), [0u8; 32]);
        let attempts = block.try_mine_block(1, u64::MAX).unwrap();
        assert_eq!(attempts, block.nonce);
        assert!(block.meets_difficulty(1));
    }

    #[test]
    fn balance_delta_examples() {
        let tx = Transaction::transfer("Alice", "Bob", 10.0, 1);
        assert_eq!(tx.balance_delta("Alice"), -10.0);
        assert_eq!(tx.balance_delta("Bob"), 10.0);
        assert_eq!(tx.balance_delta("Eve"), 0.0);

        let own = Transaction::transfer("Alice", "Alice", 10.0, 1);
        assert_eq!(own.balance_delta("Alice"), 0.0);

        let reward = Transaction::issuance("Bob", 200.0, 1);
        assert_eq!(reward.sender(), None);
        assert_eq!(reward.balance_delta("Bob"), 200.0);
        assert_eq!(reward.to_string(), "network -> Bob: 200");
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::transfer("Alice", "Bob", 10.0, 1_600_000_000);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json =
            r#"{"kind":"transfer","from":"Alice","to":"Bob","amount":10.0,"timestamp":1600000000}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn issued_amount_sums_issuance_only() {
        let block = Block::new(1, sample_txs(), [0u8; 32]);
        assert_eq!(block.issued_amount(), 5.0);
    }
}
