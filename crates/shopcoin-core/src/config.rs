use crate::constants::*;
use crate::error::ConfigError;
use crate::Amount;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level configuration file: `{ "ledger": {..}, "rewards": {..} }`.
/// Missing sections and fields fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub rewards: RewardPolicy,
}

impl Config {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate()?;
        self.rewards.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits a sealed block hash must carry.
    pub difficulty: u32,
    pub base_mining_reward: Amount,
    /// Paid instead of the base reward while supply is below `minimum_circulation`.
    pub boosted_mining_reward: Amount,
    pub minimum_circulation: Amount,
    /// Upper bound on nonce attempts per sealed block; `None` searches forever.
    pub max_nonce_attempts: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            base_mining_reward: BASE_MINING_REWARD,
            boosted_mining_reward: BOOSTED_MINING_REWARD,
            minimum_circulation: MINIMUM_CIRCULATION,
            max_nonce_attempts: None,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let max = HASH_HEX_SIZE as u32;
        if self.difficulty > max {
            return Err(ConfigError::DifficultyTooHigh {
                difficulty: self.difficulty,
                max,
            });
        }
        non_negative("base_mining_reward", self.base_mining_reward)?;
        non_negative("boosted_mining_reward", self.boosted_mining_reward)?;
        non_negative("minimum_circulation", self.minimum_circulation)
    }
}

/// Loyalty reward rules applied by [`crate::RewardRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    pub min_transactions: u32,
    pub cooldown_secs: u64,
    pub base_reward: Amount,
    pub longevity_period_secs: u64,
    pub max_longevity_bonus: f64,
    pub volume_divisor: f64,
    pub max_volume_bonus: f64,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            min_transactions: MIN_TRANSACTIONS_FOR_REWARD,
            cooldown_secs: REWARD_COOLDOWN_SECS,
            base_reward: LOYALTY_BASE_REWARD,
            longevity_period_secs: LONGEVITY_PERIOD_SECS,
            max_longevity_bonus: MAX_LONGEVITY_BONUS,
            volume_divisor: VOLUME_BONUS_DIVISOR,
            max_volume_bonus: MAX_VOLUME_BONUS,
        }
    }
}

impl RewardPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.longevity_period_secs == 0 {
            return Err(ConfigError::ZeroDivisor {
                field: "longevity_period_secs",
            });
        }
        if !(self.volume_divisor > 0.0) {
            return Err(ConfigError::ZeroDivisor {
                field: "volume_divisor",
            });
        }
        non_negative("base_reward", self.base_reward)?;
        non_negative("max_longevity_bonus", self.max_longevity_bonus)?;
        non_negative("max_volume_bonus", self.max_volume_bonus)
    }

    /// `base * (1 + longevity + volume)`, each bonus capped by the policy.
    pub fn reward_amount(&self, since_registration: u64, transaction_count: u32) -> Amount {
        let longevity = (since_registration as f64 / self.longevity_period_secs as f64)
            .min(self.max_longevity_bonus);
        let volume = (transaction_count as f64 / self.volume_divisor).min(self.max_volume_bonus);
        self.base_reward + self.base_reward * longevity + self.base_reward * volume
    }

    pub fn is_eligible(&self, transaction_count: u32, since_last_reward: u64) -> bool {
        transaction_count >= self.min_transactions && since_last_reward >= self.cooldown_secs
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeAmount { field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.ledger.difficulty, 2);
        assert_eq!(config.ledger.base_mining_reward, 100.0);
        assert_eq!(config.ledger.boosted_mining_reward, 200.0);
        assert_eq!(config.ledger.minimum_circulation, 1_000_000.0);
        assert_eq!(config.ledger.max_nonce_attempts, None);
        assert_eq!(config.rewards.min_transactions, 10);
        assert_eq!(config.rewards.cooldown_secs, 86_400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config =
            Config::from_json_str(r#"{"ledger":{"difficulty":1},"rewards":{"min_transactions":3}}"#)
                .unwrap();
        assert_eq!(config.ledger.difficulty, 1);
        assert_eq!(config.ledger.base_mining_reward, 100.0);
        assert_eq!(config.rewards.min_transactions, 3);
        assert_eq!(config.rewards.base_reward, 50.0);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_json_str(r#"{"ledger":{"difficulty":65}}"#),
            Err(ConfigError::DifficultyTooHigh { difficulty: 65, max: 64 })
        ));
        assert!(matches!(
            Config::from_json_str(r#"{"ledger":{"base_mining_reward":-1}}"#),
            Err(ConfigError::NegativeAmount { field: "base_mining_reward" })
        ));
        assert!(matches!(
            Config::from_json_str(r#"{"rewards":{"longevity_period_secs":0}}"#),
            Err(ConfigError::ZeroDivisor { .. })
        ));
        assert!(matches!(
            Config::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"ledger":{{"minimum_circulation":500}}}}"#).unwrap();
        let config = Config::from_path(file.path()).unwrap();
        assert_eq!(config.ledger.minimum_circulation, 500.0);

        let missing = Config::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn reward_formula_bounds() {
        let policy = RewardPolicy::default();
        assert!(approx(policy.reward_amount(0, 0), 50.0));
        assert!(approx(policy.reward_amount(0, 10), 55.0));
        assert!(approx(policy.reward_amount(LONGEVITY_PERIOD_SECS, 0), 100.0));
        // both bonuses capped
        assert!(approx(policy.reward_amount(u64::MAX / 2, u32::MAX), 225.0));
    }

    #[test]
    fn eligibility_needs_volume_and_cooldown() {
        let policy = RewardPolicy::default();
        assert!(policy.is_eligible(10, 86_400));
        assert!(!policy.is_eligible(9, 86_400));
        assert!(!policy.is_eligible(10, 86_399));
    }
}
