// Account and market-data seam between the controller and a brokerage

use anyhow::Result;
use rust_decimal::Decimal;

use crate::types::{AccountBalance, DailyRange, OrderOutcome, OrderSide};

/// Everything the trading-day controller needs from a brokerage.
///
/// Implemented by the live REST client and by the paper broker.
#[allow(async_fn_in_trait)]
pub trait Broker {
    /// Last traded price
    async fn get_current_price(&self, code: &str) -> Result<Decimal>;

    /// Today's open with the previous session's high and low
    async fn get_daily_range(&self, code: &str) -> Result<DailyRange>;

    /// Cash available for new orders
    async fn get_orderable_cash(&self) -> Result<Decimal>;

    /// Holdings with a non-zero quantity, plus valuation totals
    async fn get_balance(&self) -> Result<AccountBalance>;

    /// Submit a market order. A rejection is `Ok(OrderOutcome::Rejected)`;
    /// `Err` is reserved for transport and protocol failures.
    async fn submit_order(&self, code: &str, quantity: u64, side: OrderSide) -> Result<OrderOutcome>;
}
