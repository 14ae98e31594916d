use crate::core::types::{MarketSnapshot, OrderSide, TradeSignal};
use rust_decimal::Decimal;

/// Base trait for trading strategies
pub trait Strategy: Send + Sync {
    /// Decide on a trade from the latest market data, `None` to stay flat
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradeSignal>;

    fn name(&self) -> &str;

    /// Closes needed before `evaluate` can return anything
    fn min_closes_required(&self) -> usize;
}

/// Simple moving average crossover over candle closes.
///
/// BUY while the short average is above the long one, SELL while it is below,
/// nothing when they are equal or there is not enough history.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    short_window: usize,
    long_window: usize,
    quantity: Decimal,
}

impl SmaCrossover {
    pub const DEFAULT_SHORT_WINDOW: usize = 10;
    pub const DEFAULT_LONG_WINDOW: usize = 50;

    pub fn new(short_window: usize, long_window: usize, quantity: Decimal) -> Self {
        Self {
            short_window: short_window.max(1),
            long_window: long_window.max(1),
            quantity,
        }
    }

    pub fn with_quantity(quantity: Decimal) -> Self {
        Self::new(Self::DEFAULT_SHORT_WINDOW, Self::DEFAULT_LONG_WINDOW, quantity)
    }

    /// Mean of the last `window` values
    fn sma(closes: &[Decimal], window: usize) -> Option<Decimal> {
        if closes.len() < window {
            return None;
        }
        let sum: Decimal = closes[closes.len() - window..].iter().sum();
        Some(sum / Decimal::from(window))
    }
}

impl Strategy for SmaCrossover {
    fn evaluate(&self, snapshot: &MarketSnapshot) -> Option<TradeSignal> {
        let short = Self::sma(&snapshot.closes, self.short_window)?;
        let long = Self::sma(&snapshot.closes, self.long_window)?;

        let side = match short.cmp(&long) {
            std::cmp::Ordering::Greater => OrderSide::Buy,
            std::cmp::Ordering::Less => OrderSide::Sell,
            std::cmp::Ordering::Equal => return None,
        };

        Some(TradeSignal {
            side,
            symbol: snapshot.symbol.clone(),
            quantity: self.quantity,
        })
    }

    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn min_closes_required(&self) -> usize {
        self.short_window.max(self.long_window)
    }
}
