#![allow(dead_code)]

use shopcoin_core::{Ledger, LedgerConfig, ManualClock};
use std::sync::Arc;

pub const T0: u64 = 1_700_000_000;

pub fn manual_ledger(config: LedgerConfig) -> (ManualClock, Ledger) {
    let clock = ManualClock::new(T0);
    let ledger =
        Ledger::with_config(config, Arc::new(clock.clone())).expect("valid ledger config");
    (clock, ledger)
}

pub fn fast_config(minimum_circulation: f64) -> LedgerConfig {
    LedgerConfig {
        difficulty: 1,
        minimum_circulation,
        ..LedgerConfig::default()
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

pub fn sum_of_balances(ledger: &Ledger) -> f64 {
    ledger.balances().values().sum()
}
