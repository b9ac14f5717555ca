// Paper trading - real quotes, simulated fills, no orders leave the process

use crate::broker::Broker;
use crate::models::OrderRequest;
use crate::types::{AccountBalance, DailyRange, Holding, OrderOutcome, OrderSide, Valuation};
use anyhow::Result;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::info;

const PAPER_ACCOUNT: &str = "PAPER000";
const PAPER_PRODUCT: &str = "01";

#[derive(Debug, Clone, Default)]
struct PaperPosition {
    quantity: u64,
    cost: Decimal,
    last_price: Decimal,
}

/// A simulated execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaperFill {
    pub order_no: String,
    pub code: String,
    pub side: OrderSide,
    pub quantity: u64,
    pub price: Decimal,
    /// SHA-256 of the order body, standing in for the broker's hashkey
    pub body_hash: String,
}

#[derive(Debug, Default)]
struct PaperBook {
    cash: Decimal,
    positions: BTreeMap<String, PaperPosition>,
    fills: Vec<PaperFill>,
}

/// Wraps a market-data source and books market orders in memory at the
/// current quote.
pub struct PaperBroker<M> {
    market: M,
    book: Mutex<PaperBook>,
}

impl<M: Broker> PaperBroker<M> {
    pub fn new(market: M, starting_cash: Decimal) -> Self {
        Self {
            market,
            book: Mutex::new(PaperBook { cash: starting_cash, ..PaperBook::default() }),
        }
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.book.lock().await.fills.clone()
    }

    pub async fn cash(&self) -> Decimal {
        self.book.lock().await.cash
    }
}

/// Hex SHA-256 of an order body
pub fn body_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

impl<M: Broker> Broker for PaperBroker<M> {
    async fn get_current_price(&self, code: &str) -> Result<Decimal> {
        self.market.get_current_price(code).await
    }

    async fn get_daily_range(&self, code: &str) -> Result<DailyRange> {
        self.market.get_daily_range(code).await
    }

    async fn get_orderable_cash(&self) -> Result<Decimal> {
        Ok(self.book.lock().await.cash)
    }

    async fn get_balance(&self) -> Result<AccountBalance> {
        let book = self.book.lock().await;
        let mut holdings = Vec::new();
        let mut securities_value = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        for (code, position) in book.positions.iter().filter(|(_, p)| p.quantity > 0) {
            holdings.push(Holding { code: code.clone(), name: code.clone(), quantity: position.quantity });
            securities_value += position.last_price * Decimal::from(position.quantity);
            cost += position.cost;
        }
        Ok(AccountBalance {
            holdings,
            valuation: Valuation {
                securities_value,
                profit_loss: securities_value - cost,
                total_value: book.cash + securities_value,
            },
        })
    }

    async fn submit_order(&self, code: &str, quantity: u64, side: OrderSide) -> Result<OrderOutcome> {
        if quantity == 0 {
            return Err(crate::error::ApiError::InvalidQuantity(quantity).into());
        }
        let price = self.market.get_current_price(code).await?;
        let body = serde_json::to_string(&OrderRequest::market(PAPER_ACCOUNT, PAPER_PRODUCT, code, quantity))?;
        let notional = price * Decimal::from(quantity);

        let mut book = self.book.lock().await;
        match side {
            OrderSide::Buy => {
                if notional > book.cash {
                    return Ok(OrderOutcome::Rejected {
                        code: "1".to_string(),
                        message: format!("insufficient orderable cash: need {} have {}", notional, book.cash),
                    });
                }
                book.cash -= notional;
                let position = book.positions.entry(code.to_string()).or_default();
                position.quantity += quantity;
                position.cost += notional;
                position.last_price = price;
            }
            OrderSide::Sell => {
                let held = book.positions.get(code).map(|p| p.quantity).unwrap_or(0);
                if held < quantity {
                    return Ok(OrderOutcome::Rejected {
                        code: "1".to_string(),
                        message: format!("sell quantity {} exceeds holding {}", quantity, held),
                    });
                }
                book.cash += notional;
                if let Some(position) = book.positions.get_mut(code) {
                    // reduce cost basis proportionally
                    let remaining = position.quantity - quantity;
                    position.cost = if remaining == 0 {
                        Decimal::ZERO
                    } else {
                        position.cost * Decimal::from(remaining) / Decimal::from(position.quantity)
                    };
                    position.quantity = remaining;
                    position.last_price = price;
                }
                book.positions.retain(|_, p| p.quantity > 0);
            }
        }

        let order_no = format!("{:010}", book.fills.len() + 1);
        let fill = PaperFill {
            order_no: order_no.clone(),
            code: code.to_string(),
            side,
            quantity,
            price,
            body_hash: body_hash(&body),
        };
        info!("📝 [PAPER] {} {} x{} @ {} (hash {})", side, code, quantity, price, &fill.body_hash[..12]);
        book.fills.push(fill);

        Ok(OrderOutcome::Accepted {
            order_no: Some(order_no),
            message: format!("paper fill {} x{} @ {}", code, quantity, price),
        })
    }
}
