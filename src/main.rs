use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use trailbot::cache::{MarketCache, RedisCache};
use trailbot::exchange::{BinanceClient, ExchangeClient};
use trailbot::lock::CacheLockManager;
use trailbot::notify::{AlertSink, LogNotifier, SlackNotifier};
use trailbot::scheduler::run_every;
use trailbot::settings::{AppConfig, ConfigurationProvider, FileConfiguration};
use trailbot::{IndicatorProducer, Services, SymbolOutcome, Trader};

/// Trailing-stop trading bot
#[derive(Parser)]
#[command(name = "trailbot", about = "Trailing-stop trading decision engine")]
struct Cli {
    /// Settings file, layered under TRAILBOT__* environment variables
    #[arg(long, global = true, default_value = "Settings.toml")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the indicator and decision loops until ctrl-c (default)
    Run,
    /// Run one decision cycle and exit
    Decide,
    /// Refresh indicator data once and exit
    Indicators {
        /// Only this symbol instead of every configured one
        symbol: Option<String>,
    },
}

// ============================================================================
// Wiring
// ============================================================================

struct App {
    config: AppConfig,
    services: Services,
    alerts: Arc<dyn AlertSink>,
    locks: Arc<CacheLockManager>,
}

impl App {
    async fn build(config_path: &str) -> anyhow::Result<Self> {
        let config = AppConfig::load(config_path)
            .with_context(|| format!("loading configuration from {}", config_path))?;

        let exchange: Arc<dyn ExchangeClient> =
            Arc::new(BinanceClient::new(&config.exchange).context("building exchange client")?);
        let cache: Arc<dyn MarketCache> = Arc::new(
            RedisCache::new(&config.cache.redis_url)
                .await
                .context("connecting to Redis")?,
        );
        let configuration: Arc<dyn ConfigurationProvider> =
            Arc::new(FileConfiguration::new(config_path));

        let alerts: Arc<dyn AlertSink> = match &config.alerts.slack_webhook_url {
            Some(url) if !url.is_empty() => Arc::new(SlackNotifier::new(url.clone())),
            _ => {
                tracing::warn!("No Slack webhook configured, alerts go to the log only");
                Arc::new(LogNotifier)
            }
        };

        let locks = Arc::new(CacheLockManager::new(
            cache.clone(),
            Duration::from_secs(config.cache.lock_ttl_secs),
        ));

        Ok(Self {
            config,
            services: Services {
                exchange,
                cache,
                configuration,
            },
            alerts,
            locks,
        })
    }

    fn trader(&self) -> Trader {
        Trader::new(self.services.clone(), self.locks.clone(), self.alerts.clone())
    }

    fn producer(&self) -> IndicatorProducer {
        IndicatorProducer::new(
            self.services.exchange.clone(),
            self.services.cache.clone(),
            self.services.configuration.clone(),
            self.alerts.clone(),
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let app = App::build(&cli.config).await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(app).await,
        Command::Decide => {
            let summary = app.trader().execute_decision_cycle().await;
            for report in &summary.symbols {
                match &report.outcome {
                    SymbolOutcome::Completed(ctx) => {
                        tracing::info!("  ✓ {} → {}", report.symbol, ctx.action)
                    }
                    SymbolOutcome::Failed { retryable, message } => {
                        tracing::warn!("  ✗ {} (retryable: {}): {}", report.symbol, retryable, message)
                    }
                }
            }
            Ok(())
        }
        Command::Indicators { symbol } => {
            let producer = app.producer();
            match symbol {
                Some(symbol) => {
                    producer.execute_indicator_cycle(&symbol).await;
                }
                None => {
                    producer.execute_indicator_cycles().await;
                }
            }
            Ok(())
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trailbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ============================================================================
// Loops
// ============================================================================

async fn run(app: App) -> anyhow::Result<()> {
    let schedule = app.config.schedule.clone();

    tracing::info!("🚀 trailbot starting");
    tracing::info!("  Symbols: {}", app.config.trading.symbols.join(", "));
    tracing::info!("  Decision: every {}s", schedule.decision_interval_secs);
    tracing::info!("  Indicators: every {}s", schedule.indicator_interval_secs);

    let indicator_period = Duration::from_secs(schedule.indicator_interval_secs.max(1));
    let decision_period = Duration::from_secs(schedule.decision_interval_secs.max(1));

    // Loops only stop between cycles, never inside one
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let producer = app.producer();
    let shutdown = shutdown_rx.clone();
    let producer_task = tokio::spawn(async move {
        let producer = &producer;
        // Symbol list re-read every tick
        run_every(indicator_period, shutdown, move || async move {
            producer.execute_indicator_cycles().await;
        })
        .await;
    });

    let trader = app.trader();
    let shutdown = shutdown_rx;
    let decision_task = tokio::spawn(async move {
        let trader = &trader;
        run_every(decision_period, shutdown, move || async move {
            trader.execute_decision_cycle().await;
        })
        .await;
    });

    tracing::info!("✅ Loops spawned, press Ctrl+C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("listening for Ctrl+C")?;
    tracing::info!("⚠️  Received Ctrl+C, finishing running cycles...");

    // Receivers may already be gone if a loop panicked
    let _ = shutdown_tx.send(true);

    for (name, task) in [("indicator", producer_task), ("decision", decision_task)] {
        if let Err(e) = task.await {
            tracing::error!("{} loop ended abnormally: {}", name, e);
        }
    }

    tracing::info!("👋 trailbot stopped");
    Ok(())
}
