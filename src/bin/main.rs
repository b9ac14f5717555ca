// Main entry point for the volatility breakout day trader

use anyhow::Result;
use std::fs::OpenOptions;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use volatility_breakout_trader::api::KisApi;
use volatility_breakout_trader::config::{AppConfig, CliConfig, Mode};
use volatility_breakout_trader::paper::PaperBroker;
use volatility_breakout_trader::{
    init_history_file, log_trading_event, Broker, MarketClock, Notifier, StopReason, TradingController,
    WebhookNotifier,
};

async fn run_controller<B: Broker>(
    broker: B,
    notifier: WebhookNotifier,
    config: &AppConfig,
    clock: &MarketClock,
) -> Result<StopReason> {
    let mut controller = TradingController::new(
        broker,
        notifier,
        &config.trading,
        config.schedule,
        config.polling,
    );
    controller.run(clock).await
}

/// Top-level supervisor: report the first error; the caller exits
async fn report_failure(notifier: &WebhookNotifier, err: anyhow::Error) {
    error!("❌ {:#}", err);
    log_trading_event(&format!("ERROR | {:#}", err));
    notifier.send(&format!("[ERROR] {:#}", err)).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (tracing to stderr, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse CLI arguments
    let cli = <CliConfig as clap::Parser>::parse();
    let config = match cli.resolve() {
        Ok(c) => c,
        Err(e) => {
            error!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }

    // Open the journal for append and initialize the global writer
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.history_file)?;
    init_history_file(log_file);

    println!("🚀 Starting Volatility Breakout Day Trader");
    println!("📝 Journal      : {}", config.history_file.display());
    println!("Mode          : {:?}", config.mode);
    println!("API base      : {}", config.url_base);
    println!("Watchlist     : {}", config.trading.watchlist.join(", "));
    println!("Max positions : {}", config.trading.max_positions);
    log_trading_event(&format!(
        "BOT START | mode={:?} | url_base={} | watchlist={:?} | max_positions={} | buy_fraction={} | k={}",
        config.mode,
        config.url_base,
        config.trading.watchlist,
        config.trading.max_positions,
        config.trading.buy_fraction,
        config.trading.breakout_k
    ));

    let clock = MarketClock::new(config.utc_offset);
    let notifier = match WebhookNotifier::new(config.webhook_url.clone(), config.utc_offset, config.polling.request_timeout) {
        Ok(n) => n,
        Err(e) => {
            warn!("⚠️  Webhook client unavailable ({}), notifications go to the log only", e);
            WebhookNotifier::disabled(config.utc_offset)
        }
    };
    if config.webhook_url.is_none() {
        info!("No Discord webhook configured; notifications are logged only");
    }

    // One session per run, issued before the loop starts
    let mut api = match KisApi::new(config.url_base.clone(), config.credentials.clone(), config.polling.request_timeout) {
        Ok(api) => api,
        Err(e) => {
            report_failure(&notifier, e).await;
            std::process::exit(1);
        }
    };
    if let Err(e) = api.authenticate().await {
        report_failure(&notifier, e.context("Authentication failed")).await;
        std::process::exit(1);
    }

    let result = match config.mode {
        Mode::Live => {
            warn!("⚠️  LIVE mode: orders are sent to the broker");
            run_controller(api, notifier.clone(), &config, &clock).await
        }
        Mode::Paper => {
            info!("🎮 PAPER mode: real quotes, simulated fills (cash {})", config.paper_cash);
            let paper = PaperBroker::new(api, config.paper_cash);
            run_controller(paper, notifier.clone(), &config, &clock).await
        }
    };

    match result {
        Ok(reason) => {
            info!("✅ Stopped: {:?}", reason);
            log_trading_event(&format!("BOT STOP | {:?}", reason));
            Ok(())
        }
        Err(e) => {
            report_failure(&notifier, e).await;
            std::process::exit(1);
        }
    }
}
