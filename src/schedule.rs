// Trading-day phases derived from the market wall clock

use chrono::{Datelike, FixedOffset, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::Serialize;

/// Where the wall clock sits within the trading day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DayPhase {
    /// Saturday or Sunday: nothing trades
    Weekend,
    /// Midnight until market open
    PreOpen,
    /// Market open until the buy window: sell whatever is left over
    Cleanup,
    /// Breakout scanning and buying
    BuyWindow,
    /// End-of-day liquidation
    Liquidate,
    /// Past the exit time
    Exit,
}

/// The two windows in which a full liquidation may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LiquidationWindow {
    Cleanup,
    Close,
}

/// Daily boundaries. Each phase covers `[start, next_start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingSchedule {
    pub market_open: NaiveTime,
    pub buy_start: NaiveTime,
    pub sell_start: NaiveTime,
    pub exit: NaiveTime,
}

impl Default for TradingSchedule {
    fn default() -> Self {
        Self {
            market_open: hm(9, 0),
            buy_start: hm(9, 5),
            sell_start: hm(15, 15),
            exit: hm(15, 20),
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl TradingSchedule {
    pub fn phase_at(&self, now: NaiveDateTime) -> DayPhase {
        if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return DayPhase::Weekend;
        }
        let t = now.time();
        if t < self.market_open {
            DayPhase::PreOpen
        } else if t < self.buy_start {
            DayPhase::Cleanup
        } else if t < self.sell_start {
            DayPhase::BuyWindow
        } else if t < self.exit {
            DayPhase::Liquidate
        } else {
            DayPhase::Exit
        }
    }

    /// Boundaries must be strictly increasing
    pub fn validate(&self) -> Result<(), String> {
        let ordered = self.market_open < self.buy_start
            && self.buy_start < self.sell_start
            && self.sell_start < self.exit;
        if !ordered {
            return Err(format!(
                "schedule boundaries must increase: open={} buy_start={} sell_start={} exit={}",
                self.market_open, self.buy_start, self.sell_start, self.exit
            ));
        }
        Ok(())
    }
}

/// Source of "now" in market-local time
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock shifted into the exchange's fixed UTC offset
#[derive(Debug, Clone, Copy)]
pub struct MarketClock {
    offset: FixedOffset,
}

impl MarketClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for MarketClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.offset).naive_local()
    }
}
