// Volatility Breakout Day Trader Library
// Trading-day controller, brokerage client, paper broker and notifier

pub mod api;
pub mod broker;
pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod models;
pub mod notifier;
pub mod paper;
pub mod schedule;
pub mod strategy;
pub mod types;

// Re-export commonly used types
pub use broker::Broker;
pub use config::{AppConfig, CliConfig, Mode};
pub use controller::{StopReason, Tick, TradingController};
pub use notifier::{Notifier, WebhookNotifier};
pub use schedule::{Clock, DayPhase, MarketClock, TradingSchedule};
pub use types::*;

// Global trading journal
use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, OnceLock};

static HISTORY_FILE: OnceLock<Mutex<File>> = OnceLock::new();

/// Initialize the global journal writer (called by main.rs)
pub fn init_history_file(file: File) {
    // Ignore error if already initialized; this crate only has one main
    let _ = HISTORY_FILE.set(Mutex::new(file));
}

/// Append raw text to the journal. A no-op until `init_history_file` runs.
pub fn log_to_history(message: &str) {
    if let Some(file_mutex) = HISTORY_FILE.get() {
        if let Ok(mut file) = file_mutex.lock() {
            let _ = write!(file, "{}", message);
            let _ = file.flush();
        }
    }
}

/// Log a structured trading event to the journal with a UTC timestamp
pub fn log_trading_event(event: &str) {
    use chrono::Utc;
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    log_to_history(&format!("[{}] {}\n", timestamp, event));
}
