// Trading-day controller: one polling loop driving the daily phase machine
//
// PRE_OPEN idle -> CLEANUP sell leftovers -> BUY_WINDOW breakout buys
// -> LIQUIDATE sell everything -> EXIT stop. Weekends stop immediately.

use crate::broker::Broker;
use crate::config::{PollingConfig, TradingConfig};
use crate::ledger::{BoughtSet, LiquidationGuard, PositionLedger};
use crate::notifier::Notifier;
use crate::schedule::{Clock, DayPhase, LiquidationWindow, TradingSchedule};
use crate::strategy::{BreakoutPolicy, SizingPolicy};
use crate::types::{AccountBalance, OrderOutcome, OrderSide, TradeLog};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rust_decimal::Decimal;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Minute of each hour at which the balance report is sent during the buy window
const REPORT_MINUTE: u32 = 30;
/// Seconds after `REPORT_MINUTE` during which the report may still fire
const REPORT_GRACE_SECS: u32 = 5;

/// Why the loop stopped on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Weekend,
    MarketClosed,
}

/// Result of a single loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue(DayPhase),
    Stop(StopReason),
}

pub struct TradingController<B, N> {
    broker: B,
    notifier: N,
    schedule: TradingSchedule,
    polling: PollingConfig,
    watchlist: Vec<String>,
    breakout: BreakoutPolicy,
    sizing: SizingPolicy,
    ledger: PositionLedger,
    bought: BoughtSet,
    liquidations: LiquidationGuard,
    /// Cash allocated to each purchase, fixed at startup
    buy_amount: Decimal,
    /// (date, hour) of the last half-hourly report
    last_report: Option<(NaiveDate, u32)>,
    started: bool,
}

impl<B: Broker, N: Notifier> TradingController<B, N> {
    pub fn new(
        broker: B,
        notifier: N,
        trading: &TradingConfig,
        schedule: TradingSchedule,
        polling: PollingConfig,
    ) -> Self {
        Self {
            broker,
            notifier,
            schedule,
            polling,
            watchlist: trading.watchlist.clone(),
            breakout: BreakoutPolicy::new(trading.breakout_k),
            sizing: SizingPolicy::new(trading.buy_fraction),
            ledger: PositionLedger::default(),
            bought: BoughtSet::new(trading.max_positions),
            liquidations: LiquidationGuard::default(),
            buy_amount: Decimal::ZERO,
            last_report: None,
            started: false,
        }
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn bought(&self) -> &BoughtSet {
        &self.bought
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn buy_amount(&self) -> Decimal {
        self.buy_amount
    }

    /// Fetch starting cash and holdings, fix the per-name allocation and
    /// count already-held names against today's limit.
    pub async fn start(&mut self) -> Result<()> {
        let total_cash = self
            .broker
            .get_orderable_cash()
            .await
            .context("Failed to fetch orderable cash")?;
        self.notifier.send(&format!("Orderable cash: {} KRW", total_cash)).await;

        let balance = self.report_balance().await?;
        for holding in &balance.holdings {
            self.bought.insert(&holding.code);
        }
        self.buy_amount = self.sizing.allocation(total_cash);
        self.started = true;

        info!(
            "🚀 Controller started | cash={} | per-name allocation={} | max_positions={} | watchlist={:?}",
            total_cash,
            self.buy_amount,
            self.bought.capacity(),
            self.watchlist
        );
        crate::log_trading_event(&format!(
            "START | cash={} | buy_amount={} | held={:?}",
            total_cash,
            self.buy_amount,
            self.bought.names()
        ));
        self.notifier.send("=== Domestic stock auto-trader starting ===").await;
        Ok(())
    }

    /// Run until the schedule says stop. Any error ends the run.
    pub async fn run<C: Clock>(&mut self, clock: &C) -> Result<StopReason> {
        if !self.started {
            self.start().await?;
        }
        loop {
            match self.tick(clock.now()).await? {
                Tick::Stop(reason) => return Ok(reason),
                Tick::Continue(_) => sleep(self.polling.loop_interval).await,
            }
        }
    }

    /// One pass of the loop at wall-clock time `now`
    pub async fn tick(&mut self, now: NaiveDateTime) -> Result<Tick> {
        let phase = self.schedule.phase_at(now);
        let today = now.date();
        match phase {
            DayPhase::Weekend => {
                self.notifier.send("Weekend, shutting down.").await;
                return Ok(Tick::Stop(StopReason::Weekend));
            }
            DayPhase::PreOpen => {}
            DayPhase::Cleanup => {
                self.liquidate(today, LiquidationWindow::Cleanup).await?;
            }
            DayPhase::BuyWindow => {
                self.scan_watchlist().await?;
                self.maybe_report(now).await?;
            }
            DayPhase::Liquidate => {
                self.liquidate(today, LiquidationWindow::Close).await?;
            }
            DayPhase::Exit => {
                self.notifier.send("Market closed, shutting down.").await;
                crate::log_trading_event("STOP | market closed");
                return Ok(Tick::Stop(StopReason::MarketClosed));
            }
        }
        Ok(Tick::Continue(phase))
    }

    /// Sell every held quantity, at most once per window per day.
    /// Returns how many sell orders were sent.
    pub async fn liquidate(&mut self, today: NaiveDate, window: LiquidationWindow) -> Result<usize> {
        if self.liquidations.is_done(today, window) {
            return Ok(0);
        }

        let balance = self.broker.get_balance().await.context("Failed to refresh holdings")?;
        self.ledger.replace(&balance);
        let positions: Vec<(String, u64)> = self.ledger.iter().map(|(c, q)| (c.clone(), *q)).collect();

        info!("🧹 Liquidating {} position(s) ({:?} window)", positions.len(), window);
        let mut sent = 0;
        for (code, quantity) in positions {
            if quantity == 0 {
                continue;
            }
            self.place(&code, quantity, OrderSide::Sell, None).await?;
            sent += 1;
        }

        self.liquidations.mark_done(today, window);
        self.bought.clear();
        self.report_balance().await?;
        sleep(self.polling.settle_delay).await;
        Ok(sent)
    }

    /// Walk the watchlist once, buying breakouts until the day's limit is hit
    pub async fn scan_watchlist(&mut self) -> Result<()> {
        let watchlist = self.watchlist.clone();
        for code in &watchlist {
            if self.bought.is_full() {
                debug!("Bought set full ({}), stopping scan", self.bought.len());
                break;
            }
            if self.bought.contains(code) {
                continue;
            }
            self.evaluate(code).await?;
            sleep(self.polling.scan_interval).await;
        }
        Ok(())
    }

    /// Check one instrument against its breakout target and buy on a signal.
    /// Returns true when a buy was accepted.
    pub async fn evaluate(&mut self, code: &str) -> Result<bool> {
        let range = self
            .broker
            .get_daily_range(code)
            .await
            .with_context(|| format!("Failed to fetch daily range for {}", code))?;
        let target_price = self.breakout.target_price(&range);
        let current_price = self
            .broker
            .get_current_price(code)
            .await
            .with_context(|| format!("Failed to fetch current price for {}", code))?;

        if !self.breakout.is_breakout(current_price, target_price) {
            debug!("{} below target ({} <= {})", code, current_price, target_price);
            return Ok(false);
        }

        let quantity = self.sizing.order_quantity(self.buy_amount, current_price);
        if quantity == 0 {
            debug!("{} breakout but allocation {} buys nothing at {}", code, self.buy_amount, current_price);
            return Ok(false);
        }

        self.notifier
            .send(&format!(
                "{} target reached ({} < {}), buying {} share(s).",
                code, target_price, current_price, quantity
            ))
            .await;

        let outcome = self.place(code, quantity, OrderSide::Buy, Some(current_price)).await?;
        if !outcome.is_accepted() {
            return Ok(false);
        }
        self.bought.insert(code);
        self.report_balance().await?;
        Ok(true)
    }

    async fn place(
        &mut self,
        code: &str,
        quantity: u64,
        side: OrderSide,
        reference_price: Option<Decimal>,
    ) -> Result<OrderOutcome> {
        let outcome = self
            .broker
            .submit_order(code, quantity, side)
            .await
            .with_context(|| format!("{} order for {} x{} failed", side, code, quantity))?;

        let label = match (side, outcome.is_accepted()) {
            (OrderSide::Buy, true) => "[BUY OK]",
            (OrderSide::Buy, false) => "[BUY FAILED]",
            (OrderSide::Sell, true) => "[SELL OK]",
            (OrderSide::Sell, false) => "[SELL FAILED]",
        };
        let msg = format!("{} {} x{} | {}", label, code, quantity, outcome);
        if outcome.is_accepted() {
            info!("{}", msg);
        } else {
            warn!("{}", msg);
        }
        self.notifier.send(&msg).await;

        let entry = TradeLog {
            ts: chrono::Utc::now().to_rfc3339(),
            side,
            code: code.to_string(),
            quantity,
            reference_price,
            accepted: outcome.is_accepted(),
        };
        if let Ok(json) = serde_json::to_string(&entry) {
            crate::log_trading_event(&format!("ORDER | {}", json));
        }
        Ok(outcome)
    }

    /// Half-hourly report, once per hour, inside the first seconds of minute 30
    async fn maybe_report(&mut self, now: NaiveDateTime) -> Result<()> {
        if now.minute() != REPORT_MINUTE || now.second() > REPORT_GRACE_SECS {
            return Ok(());
        }
        let slot = (now.date(), now.hour());
        if self.last_report == Some(slot) {
            return Ok(());
        }
        self.last_report = Some(slot);
        self.report_balance().await?;
        sleep(self.polling.report_pause).await;
        Ok(())
    }

    /// Refresh the ledger and send the holdings report line by line
    pub async fn report_balance(&mut self) -> Result<AccountBalance> {
        let balance = self.broker.get_balance().await.context("Failed to fetch balance")?;
        self.ledger.replace(&balance);

        let pause = self.polling.notify_interval;
        self.notifier.send("==== Holdings ====").await;
        for holding in &balance.holdings {
            self.notifier
                .send(&format!("{}({}): {} share(s)", holding.name, holding.code, holding.quantity))
                .await;
            sleep(pause).await;
        }
        let v = &balance.valuation;
        for line in [
            format!("Securities value: {} KRW", v.securities_value),
            format!("Total P&L: {} KRW", v.profit_loss),
            format!("Total value: {} KRW", v.total_value),
        ] {
            self.notifier.send(&line).await;
            sleep(pause).await;
        }
        self.notifier.send("==================").await;
        Ok(balance)
    }
}
