pub mod strategy;

use crate::coinswitch::events;
use crate::coinswitch::rest::CoinSwitchRestClient;
use crate::coinswitch::stream::{StopHandle, StreamClient, StreamConfig};
use crate::coinswitch::types::CreateOrderRequest;
use crate::core::config::ConfigError;
use crate::core::errors::ExchangeError;
use crate::core::kernel::{ReqwestRest, RestClient};
use crate::core::types::{ApiResponse, MarketSnapshot, OrderSide, Subscription, TradeSignal};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

pub use strategy::{SmaCrossover, Strategy};

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    /// Candle width in minutes
    pub interval_minutes: u32,
    /// Log signals instead of placing orders
    pub dry_run: bool,
    /// Closes kept for the strategy
    pub history_capacity: usize,
    pub signal_buffer: usize,
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval_minutes: 1,
            dry_run: false,
            history_capacity: 200,
            signal_buffer: 32,
        }
    }

    pub fn with_interval(mut self, interval_minutes: u32) -> Self {
        self.interval_minutes = interval_minutes;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity.max(1);
        self
    }

    /// Candle subscription for the configured symbol and interval
    pub fn candle_subscription(&self) -> Subscription {
        Subscription::new(
            events::CANDLESTICK,
            events::candle_pair(&self.symbol, self.interval_minutes),
        )
    }
}

/// One candle update: open time when the payload carries it, and the close
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleClose {
    pub open_time: Option<i64>,
    pub close: Decimal,
}

fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok(),
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        _ => None,
    }
}

/// Extract the close from a candlestick payload (`c` or `close`)
pub fn candle_close(payload: &Value) -> Option<CandleClose> {
    let close = ["c", "close"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(decimal_from))?;
    let open_time = ["t", "start_time", "open_time"].iter().find_map(|key| {
        payload.get(*key).and_then(|v| match v {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    });
    Some(CandleClose { open_time, close })
}

/// Rolling close buffer feeding the strategy; runs inside the stream handler
pub struct SignalGenerator {
    strategy: Box<dyn Strategy>,
    symbol: String,
    closes: VecDeque<Decimal>,
    capacity: usize,
    last_open_time: Option<i64>,
    last_side: Option<OrderSide>,
}

impl SignalGenerator {
    pub fn new(strategy: Box<dyn Strategy>, symbol: String, capacity: usize) -> Self {
        let capacity = capacity.max(strategy.min_closes_required()).max(1);
        Self {
            strategy,
            symbol,
            closes: VecDeque::with_capacity(capacity),
            capacity,
            last_open_time: None,
            last_side: None,
        }
    }

    pub fn closes(&self) -> usize {
        self.closes.len()
    }

    /// Record a candle update. An update for the candle already at the back
    /// replaces its close instead of appending.
    pub fn record(&mut self, candle: CandleClose) {
        let same_candle = candle.open_time.is_some() && candle.open_time == self.last_open_time;
        if same_candle {
            if let Some(last) = self.closes.back_mut() {
                *last = candle.close;
                return;
            }
        }

        if self.closes.len() == self.capacity {
            self.closes.pop_front();
        }
        self.closes.push_back(candle.close);
        self.last_open_time = candle.open_time;
    }

    /// Evaluate the strategy; only a change of direction produces a signal
    pub fn evaluate(&mut self) -> Option<TradeSignal> {
        let snapshot = MarketSnapshot {
            symbol: self.symbol.clone(),
            closes: self.closes.iter().copied().collect(),
        };
        let signal = self.strategy.evaluate(&snapshot)?;
        if self.last_side == Some(signal.side) {
            return None;
        }
        self.last_side = Some(signal.side);
        Some(signal)
    }

    /// Stream handler body: candle events update the buffer and may signal
    pub fn on_event(&mut self, event: &str, payload: &Value) -> Option<TradeSignal> {
        if event != events::CANDLESTICK {
            debug!(event, "Ignoring event");
            return None;
        }

        let updates: Vec<CandleClose> = match payload {
            Value::Array(items) => items.iter().filter_map(candle_close).collect(),
            other => candle_close(other).into_iter().collect(),
        };
        if updates.is_empty() {
            warn!(%payload, "Candle payload without a close");
            return None;
        }

        for update in updates {
            self.record(update);
        }
        self.evaluate()
    }
}

/// Places orders for incoming signals until the channel closes
#[instrument(skip_all, fields(dry_run = dry_run))]
pub async fn execute_signals<R: RestClient>(
    rest: Arc<CoinSwitchRestClient<R>>,
    mut signals: mpsc::Receiver<TradeSignal>,
    dry_run: bool,
) {
    while let Some(signal) = signals.recv().await {
        if dry_run {
            info!(side = %signal.side, symbol = %signal.symbol, quantity = %signal.quantity, "Dry run, order not placed");
            continue;
        }

        let order = CreateOrderRequest::market(signal.symbol.clone(), signal.side, signal.quantity);
        match rest.create_order(&order).await {
            Ok(ApiResponse::Data(response)) => {
                info!(side = %signal.side, symbol = %signal.symbol, %response, "Order placed");
            }
            Ok(ApiResponse::RateLimited { body }) => {
                warn!(side = %signal.side, symbol = %signal.symbol, %body, "Order rejected, rate limited");
            }
            Err(e) => error!(side = %signal.side, symbol = %signal.symbol, error = %e, "Order failed"),
        }
    }
    debug!("Signal channel closed");
}

/// Wires the candle stream, the strategy and order placement together
pub struct TradingEngine<R: RestClient = ReqwestRest> {
    rest: Arc<CoinSwitchRestClient<R>>,
    stream: StreamClient<R>,
    config: EngineConfig,
    strategy: Mutex<Option<Box<dyn Strategy>>>,
}

impl<R: RestClient + 'static> TradingEngine<R> {
    pub fn builder(rest: Arc<CoinSwitchRestClient<R>>) -> TradingEngineBuilder<R> {
        TradingEngineBuilder::new(rest)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stream(&self) -> &StreamClient<R> {
        &self.stream
    }

    pub async fn balance(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest.get_wallet_balance().await
    }

    pub async fn positions(&self) -> Result<ApiResponse, ExchangeError> {
        self.rest.get_positions(None).await
    }

    pub fn stop(&self) {
        info!("Stopping trading engine");
        self.stream.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stream.stop_handle()
    }

    /// Stream candles and trade on signals until stopped. Runs once.
    #[instrument(skip(self), fields(symbol = %self.config.symbol, interval = self.config.interval_minutes))]
    pub async fn run(&self) -> Result<(), ExchangeError> {
        let strategy = self
            .strategy
            .lock()
            .map_err(|_| {
                ConfigError::InvalidConfiguration("Strategy lock poisoned".to_string())
            })?
            .take()
            .ok_or_else(|| {
                ConfigError::InvalidConfiguration("Engine already started".to_string())
            })?;

        info!(strategy = strategy.name(), dry_run = self.config.dry_run, "Starting trading engine");

        let (sig_tx, sig_rx) = mpsc::channel(self.config.signal_buffer.max(1));
        let executor = tokio::spawn(execute_signals(
            self.rest.clone(),
            sig_rx,
            self.config.dry_run,
        ));

        let mut generator = SignalGenerator::new(
            strategy,
            self.config.symbol.clone(),
            self.config.history_capacity,
        );
        let subscriptions = [self.config.candle_subscription()];

        let result = self
            .stream
            .run(
                |event, payload| {
                    if let Some(signal) = generator.on_event(event, payload) {
                        info!(side = %signal.side, symbol = %signal.symbol, "Strategy signal");
                        if let Err(e) = sig_tx.try_send(signal) {
                            warn!(error = %e, "Dropping signal");
                        }
                    }
                },
                &subscriptions,
            )
            .await;

        drop(sig_tx);
        if let Err(e) = executor.await {
            error!(error = %e, "Order executor task failed");
        }
        info!("Trading engine stopped");
        result
    }
}

/// Builder for [`TradingEngine`]; a strategy is mandatory
pub struct TradingEngineBuilder<R: RestClient> {
    rest: Arc<CoinSwitchRestClient<R>>,
    stream_config: StreamConfig,
    config: EngineConfig,
    strategy: Option<Box<dyn Strategy>>,
}

impl<R: RestClient + 'static> TradingEngineBuilder<R> {
    pub fn new(rest: Arc<CoinSwitchRestClient<R>>) -> Self {
        Self {
            rest,
            stream_config: StreamConfig::default(),
            config: EngineConfig::new("BTCUSDT"),
            strategy: None,
        }
    }

    pub fn with_strategy(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn with_boxed_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }

    pub fn build(self) -> Result<TradingEngine<R>, ConfigError> {
        let strategy = self.strategy.ok_or(ConfigError::MissingStrategy)?;
        Ok(TradingEngine {
            rest: self.rest,
            stream: StreamClient::without_listen_key(self.stream_config),
            config: self.config,
            strategy: Mutex::new(Some(strategy)),
        })
    }
}
