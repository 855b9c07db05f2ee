use crate::clock::Clock;
use crate::config::RewardPolicy;
use crate::error::ConfigError;
use crate::ledger::SharedLedger;
use crate::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shopkeeper {
    pub name: String,
    pub business_type: String,
    pub registration_date: u64,
    /// 0 until the first loyalty reward is granted.
    pub last_reward_time: u64,
    /// Transactions observed since the last reward.
    pub transaction_count: u32,
}

/// Tracks registered shops and feeds loyalty rewards into the ledger's pool.
///
/// The registry never touches the chain; rewards are queued as issuance and
/// only become balance once someone mines.
#[derive(Debug)]
pub struct RewardRegistry {
    ledger: SharedLedger,
    shopkeepers: HashMap<String, Shopkeeper>,
    policy: RewardPolicy,
    clock: Arc<dyn Clock>,
}

impl RewardRegistry {
    pub fn new(ledger: SharedLedger) -> Self {
        Self::build(ledger, RewardPolicy::default())
    }

    pub fn with_policy(ledger: SharedLedger, policy: RewardPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self::build(ledger, policy))
    }

    fn build(ledger: SharedLedger, policy: RewardPolicy) -> Self {
        let clock = ledger.read().clock().clone();
        Self {
            ledger,
            shopkeepers: HashMap::new(),
            policy,
            clock,
        }
    }

    pub fn ledger(&self) -> &SharedLedger {
        &self.ledger
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    /// Insert or overwrite. Re-registering an address wipes its counters and
    /// restarts its longevity.
    pub fn register_shopkeeper(&mut self, address: &str, name: &str, business_type: &str) {
        let shopkeeper = Shopkeeper {
            name: name.to_string(),
            business_type: business_type.to_string(),
            registration_date: self.clock.now(),
            last_reward_time: 0,
            transaction_count: 0,
        };
        if self.shopkeepers.insert(address.to_string(), shopkeeper).is_some() {
            warn!(address, "shopkeeper re-registered, history reset");
        } else {
            info!(address, name, business_type, "shopkeeper registered");
        }
    }

    pub fn shopkeeper(&self, address: &str) -> Option<&Shopkeeper> {
        self.shopkeepers.get(address)
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.shopkeepers.contains_key(address)
    }

    pub fn shopkeeper_count(&self) -> usize {
        self.shopkeepers.len()
    }

    /// Count one transaction for `address` and grant a reward if it became
    /// eligible. Unknown addresses are ignored.
    pub fn process_transaction(&mut self, address: &str) -> Option<Transaction> {
        let shopkeeper = self.shopkeepers.get_mut(address)?;
        shopkeeper.transaction_count += 1;
        debug!(address, count = shopkeeper.transaction_count, "shop transaction observed");

        let now = self.clock.now();
        let since_last_reward = now.saturating_sub(shopkeeper.last_reward_time);
        if !self
            .policy
            .is_eligible(shopkeeper.transaction_count, since_last_reward)
        {
            return None;
        }

        let amount = self.policy.reward_amount(
            now.saturating_sub(shopkeeper.registration_date),
            shopkeeper.transaction_count,
        );
        let tx = self.ledger.write().enqueue_issuance(address, amount);
        info!(
            address,
            amount,
            count = shopkeeper.transaction_count,
            "loyalty reward granted"
        );

        shopkeeper.last_reward_time = now;
        shopkeeper.transaction_count = 0;
        Some(tx)
    }
}
