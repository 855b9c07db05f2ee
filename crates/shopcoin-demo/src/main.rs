use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use shopcoin_core::{Config, Ledger, RewardRegistry, SystemClock};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "shopcoin-demo")]
#[command(about = "Drive a ShopCoin ledger through a shop purchase scenario")]
struct Args {
    /// JSON config file with `ledger` and `rewards` sections
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the proof-of-work difficulty (leading zero hex digits)
    #[arg(long)]
    difficulty: Option<u32>,

    /// Shop address to register
    #[arg(long, default_value = "shop1")]
    shop: String,

    /// Customer address paying the shop
    #[arg(long, default_value = "customer1")]
    customer: String,

    /// Miner address collecting block rewards
    #[arg(long, default_value = "miner1")]
    miner: String,

    /// Number of purchases routed through the shop
    #[arg(long, default_value_t = 15)]
    purchases: u32,

    /// Amount of each purchase
    #[arg(long, default_value_t = 10.0)]
    purchase_amount: f64,
}

#[derive(Serialize)]
struct Summary {
    blocks: usize,
    chain_valid: bool,
    total_supply: f64,
    tip_hash: String,
    balances: BTreeMap<String, f64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(difficulty) = args.difficulty {
        config.ledger.difficulty = difficulty;
    }

    let ledger = Ledger::with_config(config.ledger, Arc::new(SystemClock))?.into_shared();
    let mut registry = RewardRegistry::with_policy(ledger.clone(), config.rewards)?;
    info!("initializing ShopCoin ledger");

    registry.register_shopkeeper(&args.shop, "John's Store", "Retail");

    // fund the customer so purchases clear admission
    ledger.write().mine_pending_transactions(&args.customer)?;

    for _ in 0..args.purchases {
        let admitted = ledger
            .write()
            .add_transaction(&args.customer, &args.shop, args.purchase_amount);
        match admitted {
            Ok(()) => {
                if let Some(reward) = registry.process_transaction(&args.shop) {
                    info!(%reward, "loyalty reward queued");
                }
            }
            Err(err) => warn!(%err, "purchase refused"),
        }
    }

    ledger.write().mine_pending_transactions(&args.miner)?;

    let guard = ledger.read();
    let summary = Summary {
        blocks: guard.chain().len(),
        chain_valid: guard.is_chain_valid(),
        total_supply: guard.total_supply(),
        tip_hash: hex::encode(guard.get_latest_block().hash),
        balances: guard.balances(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
