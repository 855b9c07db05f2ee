use crate::Amount;

pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

pub const DEFAULT_DIFFICULTY: u32 = 2;
pub const BASE_MINING_REWARD: Amount = 100.0;
pub const BOOSTED_MINING_REWARD: Amount = 200.0;
pub const MINIMUM_CIRCULATION: Amount = 1_000_000.0;

pub const SECONDS_PER_DAY: u64 = 86_400;
pub const MIN_TRANSACTIONS_FOR_REWARD: u32 = 10;
pub const REWARD_COOLDOWN_SECS: u64 = SECONDS_PER_DAY;
pub const LOYALTY_BASE_REWARD: Amount = 50.0;
pub const LONGEVITY_PERIOD_SECS: u64 = SECONDS_PER_DAY * 30;
pub const MAX_LONGEVITY_BONUS: f64 = 2.0;
pub const VOLUME_BONUS_DIVISOR: f64 = 100.0;
pub const MAX_VOLUME_BONUS: f64 = 1.5;

/// Display name of the sender of protocol-issued transactions.
pub const NETWORK_ADDRESS: &str = "network";
