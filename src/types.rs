// Core types used throughout the trading system

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Authentication credential for one trading day.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
}

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn label(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Today's open together with the previous session's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRange {
    pub open: Decimal,
    pub prev_high: Decimal,
    pub prev_low: Decimal,
}

impl DailyRange {
    pub fn prev_spread(&self) -> Decimal {
        self.prev_high - self.prev_low
    }
}

/// One line of the holdings report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holding {
    pub code: String,
    pub name: String,
    pub quantity: u64,
}

/// Aggregate valuation figures reported alongside the holdings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Valuation {
    pub securities_value: Decimal,
    pub profit_loss: Decimal,
    pub total_value: Decimal,
}

/// Result of a balance query: non-zero holdings plus valuation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountBalance {
    pub holdings: Vec<Holding>,
    pub valuation: Valuation,
}

impl AccountBalance {
    /// Instrument code -> held quantity, zero quantities dropped
    pub fn quantities(&self) -> BTreeMap<String, u64> {
        self.holdings
            .iter()
            .filter(|h| h.quantity > 0)
            .map(|h| (h.code.clone(), h.quantity))
            .collect()
    }
}

/// What the broker said about a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    Accepted { order_no: Option<String>, message: String },
    Rejected { code: String, message: String },
}

impl OrderOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OrderOutcome::Accepted { .. })
    }
}

impl fmt::Display for OrderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderOutcome::Accepted { order_no, message } => {
                write!(f, "order_no={} | {}", order_no.as_deref().unwrap_or("-"), message)
            }
            OrderOutcome::Rejected { code, message } => write!(f, "rt_cd={} | {}", code, message),
        }
    }
}

/// Trade journal entry
#[derive(Debug, Clone, Serialize)]
pub struct TradeLog {
    pub ts: String,
    pub side: OrderSide,
    pub code: String,
    pub quantity: u64,
    pub reference_price: Option<Decimal>,
    pub accepted: bool,
}
