#![allow(dead_code)]

use anyhow::{bail, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use volatility_breakout_trader::config::{PollingConfig, TradingConfig};
use volatility_breakout_trader::{
    AccountBalance, Broker, Clock, DailyRange, Holding, Notifier, OrderOutcome, OrderSide, TradingController,
    TradingSchedule, Valuation,
};

/// 2024-11-25 is a Monday
pub fn monday(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day(25, h, m, s)
}

pub fn day(d: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 11, d).unwrap().and_hms_opt(h, m, s).unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub code: String,
    pub quantity: u64,
    pub side: OrderSide,
}

/// Scripted brokerage: fixed quotes, in-memory holdings, every call recorded
#[derive(Default)]
pub struct FakeBroker {
    pub cash: Decimal,
    pub prices: HashMap<String, Decimal>,
    pub ranges: HashMap<String, DailyRange>,
    pub reject: HashSet<String>,
    pub fail_range_for: HashSet<String>,
    pub holdings: Mutex<BTreeMap<String, u64>>,
    pub orders: Mutex<Vec<SubmittedOrder>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBroker {
    pub fn new(cash: Decimal) -> Self {
        Self { cash, ..Self::default() }
    }

    /// Quote `code` at `price` with a breakout target of `target`
    pub fn quote(mut self, code: &str, price: Decimal, target: Decimal) -> Self {
        // open = target, zero previous range => target price == open
        self.prices.insert(code.to_string(), price);
        self.ranges
            .insert(code.to_string(), DailyRange { open: target, prev_high: Decimal::ZERO, prev_low: Decimal::ZERO });
        self
    }

    pub fn holding(self, code: &str, quantity: u64) -> Self {
        self.holdings.lock().unwrap().insert(code.to_string(), quantity);
        self
    }

    pub fn rejecting(mut self, code: &str) -> Self {
        self.reject.insert(code.to_string());
        self
    }

    pub fn failing_range(mut self, code: &str) -> Self {
        self.fail_range_for.insert(code.to_string());
        self
    }

    pub fn orders(&self) -> Vec<SubmittedOrder> {
        self.orders.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn held(&self, code: &str) -> u64 {
        self.holdings.lock().unwrap().get(code).copied().unwrap_or(0)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Broker for FakeBroker {
    async fn get_current_price(&self, code: &str) -> Result<Decimal> {
        self.record(format!("price:{}", code));
        match self.prices.get(code) {
            Some(p) => Ok(*p),
            None => bail!("no quote for {}", code),
        }
    }

    async fn get_daily_range(&self, code: &str) -> Result<DailyRange> {
        self.record(format!("range:{}", code));
        if self.fail_range_for.contains(code) {
            bail!("daily price request for {} timed out", code);
        }
        match self.ranges.get(code) {
            Some(r) => Ok(*r),
            None => bail!("no daily range for {}", code),
        }
    }

    async fn get_orderable_cash(&self) -> Result<Decimal> {
        self.record("cash".to_string());
        Ok(self.cash)
    }

    async fn get_balance(&self) -> Result<AccountBalance> {
        self.record("balance".to_string());
        let holdings = self
            .holdings
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(code, q)| Holding { code: code.clone(), name: format!("NAME-{}", code), quantity: *q })
            .collect();
        Ok(AccountBalance { holdings, valuation: Valuation::default() })
    }

    async fn submit_order(&self, code: &str, quantity: u64, side: OrderSide) -> Result<OrderOutcome> {
        self.record(format!("order:{}:{}:{}", side, code, quantity));
        self.orders.lock().unwrap().push(SubmittedOrder { code: code.to_string(), quantity, side });
        if self.reject.contains(code) {
            return Ok(OrderOutcome::Rejected { code: "1".into(), message: "rejected by test".into() });
        }
        let mut holdings = self.holdings.lock().unwrap();
        let held = holdings.entry(code.to_string()).or_insert(0);
        match side {
            OrderSide::Buy => *held += quantity,
            OrderSide::Sell => *held = held.saturating_sub(quantity),
        }
        Ok(OrderOutcome::Accepted { order_no: Some("0000000001".into()), message: "ok".into() })
    }
}

/// Keeps every message for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

/// Replays a fixed list of instants, then stays on the last one
pub struct ScriptedClock {
    times: Vec<NaiveDateTime>,
    next: Cell<usize>,
}

impl ScriptedClock {
    pub fn new(times: Vec<NaiveDateTime>) -> Self {
        Self { times, next: Cell::new(0) }
    }
}

impl Clock for ScriptedClock {
    fn now(&self) -> NaiveDateTime {
        let i = self.next.get().min(self.times.len() - 1);
        self.next.set(i + 1);
        self.times[i]
    }
}

pub fn trading(watchlist: &[&str], max_positions: usize) -> TradingConfig {
    TradingConfig {
        watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
        max_positions,
        ..TradingConfig::default()
    }
}

pub fn controller(
    broker: FakeBroker,
    watchlist: &[&str],
    max_positions: usize,
) -> TradingController<FakeBroker, RecordingNotifier> {
    TradingController::new(
        broker,
        RecordingNotifier::default(),
        &trading(watchlist, max_positions),
        TradingSchedule::default(),
        PollingConfig::immediate(),
    )
}
