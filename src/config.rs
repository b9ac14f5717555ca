// Configuration: CLI flags layered over config.json over environment variables

use anyhow::{anyhow, Context, Result};
use chrono::{FixedOffset, NaiveTime};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::schedule::TradingSchedule;

pub const DEFAULT_URL_BASE: &str = "https://openapi.koreainvestment.com:9443";
pub const DEFAULT_WATCHLIST: [&str; 4] = ["005930", "035720", "000660", "069500"];

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Paper, // Real quotes, simulated fills
    Live,  // Real orders
}

/// App credentials and the account orders are booked against
#[derive(Clone)]
pub struct Credentials {
    pub app_key: String,
    pub app_secret: String,
    /// First 8 digits of the account number (CANO)
    pub account_no: String,
    /// Account product code (ACNT_PRDT_CD), usually "01"
    pub account_product_code: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("app_key", &"***")
            .field("app_secret", &"***")
            .field("account_no", &self.account_no)
            .field("account_product_code", &self.account_product_code)
            .finish()
    }
}

/// What to buy and how much
#[derive(Debug, Clone)]
pub struct TradingConfig {
    pub watchlist: Vec<String>,
    pub max_positions: usize,
    pub buy_fraction: Decimal,
    pub breakout_k: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            max_positions: 3,
            buy_fraction: dec!(0.33),
            breakout_k: dec!(0.5),
        }
    }
}

/// Fixed sleeps that keep us under the broker's request rate
#[derive(Debug, Clone, Copy)]
pub struct PollingConfig {
    /// Between loop iterations
    pub loop_interval: Duration,
    /// Between watchlist instruments
    pub scan_interval: Duration,
    /// Between lines of a multi-line report
    pub notify_interval: Duration,
    /// After a liquidation pass
    pub settle_delay: Duration,
    /// After the half-hourly balance report
    pub report_pause: Duration,
    /// HTTP request timeout
    pub request_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            loop_interval: Duration::from_secs(1),
            scan_interval: Duration::from_secs(1),
            notify_interval: Duration::from_millis(100),
            settle_delay: Duration::from_secs(1),
            report_pause: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl PollingConfig {
    /// No sleeping at all; for driving the controller in tests
    pub fn immediate() -> Self {
        Self {
            loop_interval: Duration::ZERO,
            scan_interval: Duration::ZERO,
            notify_interval: Duration::ZERO,
            settle_delay: Duration::ZERO,
            report_pause: Duration::ZERO,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Fully resolved configuration, built once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mode: Mode,
    pub url_base: String,
    pub credentials: Credentials,
    pub webhook_url: Option<String>,
    pub trading: TradingConfig,
    pub schedule: TradingSchedule,
    pub polling: PollingConfig,
    pub utc_offset: FixedOffset,
    pub paper_cash: Decimal,
    pub history_file: PathBuf,
}

/// CLI Configuration
#[derive(Parser, Debug)]
#[command(name = "breakout-trader")]
#[command(about = "Volatility-breakout day trader for a domestic stock brokerage API")]
pub struct CliConfig {
    /// Configuration file path (JSON format)
    #[arg(long, default_value = "config.json")]
    pub config: PathBuf,

    /// Send real orders (default is paper trading)
    #[arg(long)]
    pub live: bool,

    /// App key (or KIS_APP_KEY)
    #[arg(long)]
    pub app_key: Option<String>,

    /// App secret (or KIS_APP_SECRET)
    #[arg(long)]
    pub app_secret: Option<String>,

    /// Account number, first 8 digits (or KIS_ACCOUNT_NO)
    #[arg(long)]
    pub account_no: Option<String>,

    /// Account product code (or KIS_ACCOUNT_PRODUCT_CODE)
    #[arg(long)]
    pub account_product_code: Option<String>,

    /// API base URL
    #[arg(long)]
    pub url_base: Option<String>,

    /// Discord webhook URL (or DISCORD_WEBHOOK_URL)
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Comma separated instrument codes to scan
    #[arg(long, value_delimiter = ',')]
    pub watchlist: Option<Vec<String>>,

    /// Maximum names bought per day
    #[arg(long)]
    pub max_positions: Option<usize>,

    /// Fraction of starting cash allocated per name (e.g. 0.33)
    #[arg(long)]
    pub buy_fraction: Option<f64>,

    /// Breakout multiplier on the previous day's range
    #[arg(long)]
    pub breakout_k: Option<f64>,

    /// Loop interval in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Starting cash for paper trading
    #[arg(long)]
    pub paper_cash: Option<f64>,

    /// Trading journal file
    #[arg(long, default_value = "history.log")]
    pub history_file: PathBuf,
}

/// JSON configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonConfig {
    pub kis: Option<KisConfigJson>,
    pub notify: Option<NotifyJson>,
    pub trading: Option<TradingConfigJson>,
    pub schedule: Option<ScheduleJson>,
    pub polling: Option<PollingJson>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KisConfigJson {
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub account_no: Option<String>,
    pub account_product_code: Option<String>,
    pub url_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyJson {
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfigJson {
    pub watchlist: Option<Vec<String>>,
    pub max_positions: Option<usize>,
    pub buy_fraction: Option<f64>,
    pub breakout_k: Option<f64>,
    pub paper_cash: Option<f64>,
    /// Hours east of UTC for the exchange clock (9 for KST)
    pub utc_offset_hours: Option<i32>,
}

/// Boundaries as "HH:MM"
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleJson {
    pub market_open: Option<String>,
    pub buy_start: Option<String>,
    pub sell_start: Option<String>,
    pub exit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingJson {
    pub loop_interval_ms: Option<u64>,
    pub scan_interval_ms: Option<u64>,
    pub notify_interval_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
    pub report_pause_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_hhmm(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .with_context(|| format!("schedule.{} must be HH:MM, got {:?}", field, value))
}

fn to_decimal(field: &str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|e| anyhow!("{} is not a valid number ({}): {}", field, value, e))
}

impl CliConfig {
    /// Load configuration from JSON file; a missing file means "no overrides"
    pub fn load_json_config(&self) -> Result<JsonConfig> {
        let config_path = &self.config;

        if !config_path.exists() {
            return Ok(JsonConfig::default());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    /// Get execution mode
    pub fn mode(&self) -> Mode {
        if self.live {
            Mode::Live
        } else {
            Mode::Paper
        }
    }

    /// Resolve every setting: CLI first, then config.json, then environment, then default
    pub fn resolve(&self) -> Result<AppConfig> {
        let json = self.load_json_config()?;
        let kis = json.kis.as_ref();
        let trading_json = json.trading.as_ref();

        let pick = |cli: &Option<String>, file: Option<&String>, env: &str| -> Option<String> {
            cli.clone().or_else(|| file.cloned()).or_else(|| env_var(env))
        };

        let credentials = Credentials {
            app_key: pick(&self.app_key, kis.and_then(|k| k.app_key.as_ref()), "KIS_APP_KEY").unwrap_or_default(),
            app_secret: pick(&self.app_secret, kis.and_then(|k| k.app_secret.as_ref()), "KIS_APP_SECRET")
                .unwrap_or_default(),
            account_no: pick(&self.account_no, kis.and_then(|k| k.account_no.as_ref()), "KIS_ACCOUNT_NO")
                .unwrap_or_default(),
            account_product_code: pick(
                &self.account_product_code,
                kis.and_then(|k| k.account_product_code.as_ref()),
                "KIS_ACCOUNT_PRODUCT_CODE",
            )
            .unwrap_or_else(|| "01".to_string()),
        };

        let url_base = self
            .url_base
            .clone()
            .or_else(|| kis.and_then(|k| k.url_base.clone()))
            .unwrap_or_else(|| DEFAULT_URL_BASE.to_string());

        let webhook_url = pick(
            &self.webhook_url,
            json.notify.as_ref().and_then(|n| n.discord_webhook_url.as_ref()),
            "DISCORD_WEBHOOK_URL",
        );

        let mut trading = TradingConfig::default();
        if let Some(watchlist) = self.watchlist.clone().or_else(|| trading_json.and_then(|t| t.watchlist.clone())) {
            trading.watchlist = watchlist
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
        }
        if let Some(max) = self.max_positions.or_else(|| trading_json.and_then(|t| t.max_positions)) {
            trading.max_positions = max;
        }
        if let Some(fraction) = self.buy_fraction.or_else(|| trading_json.and_then(|t| t.buy_fraction)) {
            trading.buy_fraction = to_decimal("buy_fraction", fraction)?;
        }
        if let Some(k) = self.breakout_k.or_else(|| trading_json.and_then(|t| t.breakout_k)) {
            trading.breakout_k = to_decimal("breakout_k", k)?;
        }

        let paper_cash = match self.paper_cash.or_else(|| trading_json.and_then(|t| t.paper_cash)) {
            Some(cash) => to_decimal("paper_cash", cash)?,
            None => dec!(10000000),
        };

        let offset_hours = trading_json.and_then(|t| t.utc_offset_hours).unwrap_or(9);
        let utc_offset = FixedOffset::east_opt(offset_hours * 3600)
            .ok_or_else(|| anyhow!("utc_offset_hours out of range: {}", offset_hours))?;

        let mut schedule = TradingSchedule::default();
        if let Some(s) = json.schedule.as_ref() {
            if let Some(v) = &s.market_open {
                schedule.market_open = parse_hhmm("market_open", v)?;
            }
            if let Some(v) = &s.buy_start {
                schedule.buy_start = parse_hhmm("buy_start", v)?;
            }
            if let Some(v) = &s.sell_start {
                schedule.sell_start = parse_hhmm("sell_start", v)?;
            }
            if let Some(v) = &s.exit {
                schedule.exit = parse_hhmm("exit", v)?;
            }
        }

        let mut polling = PollingConfig::default();
        if let Some(p) = json.polling.as_ref() {
            let ms = Duration::from_millis;
            polling.loop_interval = p.loop_interval_ms.map(ms).unwrap_or(polling.loop_interval);
            polling.scan_interval = p.scan_interval_ms.map(ms).unwrap_or(polling.scan_interval);
            polling.notify_interval = p.notify_interval_ms.map(ms).unwrap_or(polling.notify_interval);
            polling.settle_delay = p.settle_delay_ms.map(ms).unwrap_or(polling.settle_delay);
            polling.report_pause = p.report_pause_ms.map(ms).unwrap_or(polling.report_pause);
            polling.request_timeout = p.request_timeout_ms.map(ms).unwrap_or(polling.request_timeout);
        }
        if let Some(ms) = self.poll_interval_ms {
            polling.loop_interval = Duration::from_millis(ms);
        }

        Ok(AppConfig {
            mode: self.mode(),
            url_base,
            credentials,
            webhook_url,
            trading,
            schedule,
            polling,
            utc_offset,
            paper_cash,
            history_file: self.history_file.clone(),
        })
    }
}

impl AppConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.credentials.app_key.is_empty() || self.credentials.app_secret.is_empty() {
            return Err("App key and secret are required. Set KIS_APP_KEY/KIS_APP_SECRET, config.json kis.*, or --app-key/--app-secret".to_string());
        }
        if self.mode == Mode::Live && self.credentials.account_no.is_empty() {
            return Err("Account number required for live trading. Set KIS_ACCOUNT_NO or --account-no".to_string());
        }
        if self.trading.watchlist.is_empty() {
            return Err("Watchlist is empty".to_string());
        }
        if self.trading.max_positions == 0 {
            return Err("max_positions must be at least 1".to_string());
        }
        if self.trading.buy_fraction <= Decimal::ZERO || self.trading.buy_fraction > Decimal::ONE {
            return Err(format!("buy_fraction must be in (0, 1], got {}", self.trading.buy_fraction));
        }
        if self.trading.breakout_k < Decimal::ZERO {
            return Err(format!("breakout_k must not be negative, got {}", self.trading.breakout_k));
        }
        self.schedule.validate()
    }
}
