use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use coinswitch_futures::coinswitch::{build_rest_client, StreamConfig, STREAM_BASE_URL};
use coinswitch_futures::core::config::{ConfigError, ExchangeConfig, SigningScheme};
use coinswitch_futures::engine::{EngineConfig, SmaCrossover, Strategy, TradingEngine};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const ENV_PREFIX: &str = "COINSWITCH";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyKind {
    /// Short/long simple moving average crossover (10/50)
    SmaCrossover,
}

#[derive(Parser, Debug)]
#[command(name = "coinswitch-bot", about = "CoinSwitch PRO futures trading bot")]
struct Args {
    /// API key, overrides COINSWITCH_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// API secret, overrides COINSWITCH_API_SECRET
    #[arg(long)]
    api_secret: Option<String>,

    /// Signing scheme: ed25519 or hmac
    #[arg(long)]
    scheme: Option<SigningScheme>,

    #[arg(long, default_value = "BTCUSDT")]
    symbol: String,

    /// Candle interval in minutes
    #[arg(long, default_value_t = 1)]
    interval: u32,

    /// Order quantity per signal
    #[arg(long, default_value = "0.001")]
    quantity: Decimal,

    #[arg(long, value_enum, default_value_t = StrategyKind::SmaCrossover)]
    strategy: StrategyKind,

    /// Log signals without placing orders
    #[arg(long)]
    dry_run: bool,

    /// Tracing filter, e.g. `debug` or `coinswitch_futures=trace`
    #[arg(long)]
    log_level: Option<String>,
}

fn setup_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn env_config() -> Result<Option<ExchangeConfig>> {
    #[cfg(feature = "env-file")]
    let loaded = ExchangeConfig::from_env_file(ENV_PREFIX);
    #[cfg(not(feature = "env-file"))]
    let loaded = ExchangeConfig::from_env(ENV_PREFIX);

    match loaded {
        Ok(config) => Ok(Some(config)),
        Err(ConfigError::MissingEnvironmentVariable(_)) => Ok(None),
        Err(e) => Err(e).context("Invalid CoinSwitch environment configuration"),
    }
}

/// Flags win over environment values; the config is built once from the merge
fn load_config(args: &Args) -> Result<ExchangeConfig> {
    let env = env_config()?;

    let api_key = args
        .api_key
        .clone()
        .or_else(|| env.as_ref().map(|c| c.api_key().to_string()))
        .context("Missing API key: pass --api-key or set COINSWITCH_API_KEY")?;
    let api_secret = args
        .api_secret
        .clone()
        .or_else(|| env.as_ref().map(|c| c.secret_key().to_string()))
        .context("Missing API secret: pass --api-secret or set COINSWITCH_API_SECRET")?;

    let mut config = ExchangeConfig::new(api_key, api_secret);
    if let Some(env) = &env {
        config = config.scheme(env.scheme);
        if let Some(base_url) = &env.base_url {
            config = config.base_url(base_url.clone());
        }
        if let Some(stream_url) = &env.stream_url {
            config = config.stream_url(stream_url.clone());
        }
    }
    if let Some(scheme) = args.scheme {
        config = config.scheme(scheme);
    }

    Ok(config)
}

fn strategy_for(args: &Args) -> Box<dyn Strategy> {
    match args.strategy {
        StrategyKind::SmaCrossover => Box::new(SmaCrossover::with_quantity(args.quantity)),
    }
}

/// Console front end. Ctrl-C and end of input behave like `stop`.
async fn console(engine: Arc<TradingEngine>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Enter command: ");
        std::io::stdout().flush().context("Failed to flush stdout")?;

        let command = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                "stop".to_string()
            }
            line = lines.next_line() => line
                .context("Failed to read stdin")?
                .unwrap_or_else(|| "stop".to_string()),
        };

        match command.trim() {
            "" => {}
            "balance" => match engine.balance().await {
                Ok(balance) => println!("Balance: {}", balance),
                Err(e) => println!("Could not fetch balance: {}", e),
            },
            "positions" => match engine.positions().await {
                Ok(positions) => println!("Positions: {}", positions),
                Err(e) => println!("Could not fetch positions: {}", e),
            },
            "stop" => {
                engine.stop();
                break;
            }
            _ => println!("Unknown command"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.log_level.as_deref());

    let config = load_config(&args)?;
    info!(scheme = %config.scheme, symbol = %args.symbol, interval = args.interval, dry_run = args.dry_run, "Starting coinswitch-bot");

    let rest = Arc::new(build_rest_client(&config).context("Failed to build REST client")?);
    let stream_config = StreamConfig::new(
        config
            .stream_url
            .clone()
            .unwrap_or_else(|| STREAM_BASE_URL.to_string()),
    );
    let engine_config = EngineConfig::new(args.symbol.clone())
        .with_interval(args.interval)
        .with_dry_run(args.dry_run);

    let engine = Arc::new(
        TradingEngine::builder(rest)
            .with_boxed_strategy(strategy_for(&args))
            .with_config(engine_config)
            .with_stream_config(stream_config)
            .build()
            .context("Failed to build trading engine")?,
    );

    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    console(engine).await?;

    runner
        .await
        .context("Engine task panicked")?
        .context("Engine stopped with an error")?;
    info!("Shutdown complete");
    Ok(())
}
