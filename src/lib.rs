pub mod coinswitch;
pub mod core;
pub mod engine;

pub use coinswitch::{CoinSwitchRestClient, StreamClient, StreamConfig};
pub use core::{config::ExchangeConfig, errors::ExchangeError, types::*};
pub use engine::{SmaCrossover, Strategy, TradingEngine};
