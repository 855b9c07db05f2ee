use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{BlockRejection, ChainFault, ConfigError, LedgerError};
use crate::{pow, Amount, Block, Transaction};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handle shared between the ledger's owner and collaborators such as the
/// reward registry. Mining holds the write lock across append and pool clear.
pub type SharedLedger = Arc<RwLock<Ledger>>;

/// Append-only chain plus the pool of transactions waiting for the next block.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending_transactions: Vec<Transaction>,
    config: LedgerConfig,
    mining_reward: Amount,
    total_supply: Amount,
    clock: Arc<dyn Clock>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Default policy on the system clock.
    pub fn new() -> Self {
        Self::build(LedgerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let genesis = Block::genesis(clock.now());
        Self {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            mining_reward: config.base_mining_reward,
            total_supply: 0.0,
            config,
            clock,
        }
    }

    pub fn into_shared(self) -> SharedLedger {
        Arc::new(RwLock::new(self))
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn difficulty(&self) -> u32 {
        self.config.difficulty
    }

    /// Reward paid by the most recent mine (base reward before any mining).
    pub fn mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn total_supply(&self) -> Amount {
        self.total_supply
    }

    pub fn minimum_circulation(&self) -> Amount {
        self.config.minimum_circulation
    }

    pub fn get_latest_block(&self) -> &Block {
        // never empty: genesis is pushed on construction
        &self.chain[self.chain.len() - 1]
    }

    /// Reward the next call to [`Ledger::mine_pending_transactions`] will pay.
    pub fn current_mining_reward(&self) -> Amount {
        if self.total_supply < self.config.minimum_circulation {
            self.config.boosted_mining_reward
        } else {
            self.config.base_mining_reward
        }
    }

    /// Queue a transfer if the sender's replayed balance covers `amount`.
    ///
    /// Only the chain is consulted: transfers already waiting in the pool are
    /// not subtracted, so two pending spends can together overdraw an account.
    pub fn add_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let balance = self.get_balance(sender);
        if balance < amount {
            debug!(sender, recipient, amount, balance, "transaction rejected");
            return Err(LedgerError::InsufficientBalance {
                address: sender.to_string(),
                balance,
                amount,
            });
        }
        let tx = Transaction::transfer(sender, recipient, amount, self.clock.now());
        debug!(%tx, "transaction queued");
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Queue protocol-issued value without any balance check. Supply only
    /// grows once the transaction is mined.
    pub(crate) fn enqueue_issuance(&mut self, recipient: &str, amount: Amount) -> Transaction {
        let tx = Transaction::issuance(recipient, amount, self.clock.now());
        debug!(%tx, "issuance queued");
        self.pending_transactions.push(tx.clone());
        tx
    }

    /// Replays every block; no cached running balances.
    pub fn get_balance(&self, address: &str) -> Amount {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .map(|tx| tx.balance_delta(address))
            .sum()
    }

    pub fn get_transaction_count(&self, address: &str) -> usize {
        self.chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .filter(|tx| tx.touches(address))
            .count()
    }

    /// Replayed balance of every address that appears on the chain.
    pub fn balances(&self) -> BTreeMap<String, Amount> {
        let mut balances = BTreeMap::new();
        for tx in self.chain.iter().flat_map(|block| block.transactions.iter()) {
            if let Some(from) = tx.sender() {
                *balances.entry(from.to_string()).or_insert(0.0) -= tx.amount();
            }
            *balances.entry(tx.recipient().to_string()).or_insert(0.0) += tx.amount();
        }
        balances
    }

    /// Sum of every issuance on the chain; tracks `total_supply`.
    pub fn issued_supply(&self) -> Amount {
        self.chain.iter().map(Block::issued_amount).sum()
    }

    /// Issuance queued in the pool and not yet counted in `total_supply`.
    pub fn pending_issuance(&self) -> Amount {
        self.pending_transactions
            .iter()
            .filter(|tx| tx.is_issuance())
            .map(Transaction::amount)
            .sum()
    }

    /// Seal the pool plus a reward for `miner_address` into a new block.
    ///
    /// With `max_nonce_attempts` unset this cannot fail. When the bounded
    /// search gives up, chain, pool and supply are left untouched.
    pub fn mine_pending_transactions(
        &mut self,
        miner_address: &str,
    ) -> Result<&Block, LedgerError> {
        let reward = self.current_mining_reward();
        let now = self.clock.now();

        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::issuance(miner_address, reward, now));
        let mut block = Block::new(now, transactions, self.get_latest_block().hash);

        let difficulty = self.config.difficulty;
        match self.config.max_nonce_attempts {
            Some(max_attempts) => {
                if let Err(err) = block.try_mine_block(difficulty, max_attempts) {
                    warn!(%err, miner = miner_address, "mining abandoned");
                    return Err(err);
                }
            }
            None => block.mine_block(difficulty),
        }

        info!(
            index = self.chain.len(),
            nonce = block.nonce,
            hash = %block.hash_hex(),
            txs = block.transactions.len(),
            reward,
            miner = miner_address,
            "mined block"
        );

        self.mining_reward = reward;
        // loyalty issuance waiting in the pool is minted together with the reward
        self.total_supply += block.issued_amount();
        self.chain.push(block);
        self.pending_transactions.clear();
        Ok(self.get_latest_block())
    }

    /// Walk adjacent pairs and report the first content or link fault.
    /// Proof of work of historical blocks is not re-checked.
    pub fn validate_chain(&self) -> Result<(), ChainFault> {
        check_links(&self.chain)
    }

    pub fn is_chain_valid(&self) -> bool {
        self.validate_chain().is_ok()
    }

    /// Whether a foreign chain shares our genesis and is internally consistent.
    pub fn is_valid_chain(&self, candidate: &[Block]) -> bool {
        match candidate.first() {
            Some(genesis) if *genesis == self.chain[0] => check_links(candidate).is_ok(),
            _ => false,
        }
    }

    /// Checks a block sealed elsewhere against the current tip.
    pub fn validate_block(&self, block: &Block) -> Result<(), BlockRejection> {
        if block.hash != block.calculate_hash() {
            return Err(BlockRejection::HashMismatch);
        }
        if block.previous_hash != self.get_latest_block().hash {
            return Err(BlockRejection::BrokenLink);
        }
        let found = pow::count_leading_zero_digits(&block.hash);
        if found < self.config.difficulty {
            return Err(BlockRejection::InsufficientWork {
                required: self.config.difficulty,
                found,
            });
        }
        for tx in &block.transactions {
            if let Some(from) = tx.sender() {
                if self.get_balance(from) < tx.amount() {
                    return Err(BlockRejection::Overdraft {
                        address: from.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Append a block sealed elsewhere; its issuance counts toward supply.
    pub fn add_block(&mut self, block: Block) -> Result<(), LedgerError> {
        if let Err(reason) = self.validate_block(&block) {
            warn!(%reason, hash = %block.hash_hex(), "block rejected");
            return Err(reason.into());
        }
        self.total_supply += block.issued_amount();
        info!(index = self.chain.len(), hash = %block.hash_hex(), "block appended");
        self.chain.push(block);
        Ok(())
    }
}

fn check_links(chain: &[Block]) -> Result<(), ChainFault> {
    for (index, pair) in chain.windows(2).enumerate().map(|(i, w)| (i + 1, w)) {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.hash != current.calculate_hash() {
            return Err(ChainFault::HashMismatch { index });
        }
        if current.previous_hash != previous.hash {
            return Err(ChainFault::BrokenLink { index });
        }
    }
    Ok(())
}
