// Volatility breakout entry and equal-slot position sizing

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::DailyRange;

/// Entry threshold: today's open plus `k` times yesterday's range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakoutPolicy {
    pub k: Decimal,
}

impl Default for BreakoutPolicy {
    fn default() -> Self {
        Self { k: dec!(0.5) }
    }
}

impl BreakoutPolicy {
    pub fn new(k: Decimal) -> Self {
        Self { k }
    }

    pub fn target_price(&self, range: &DailyRange) -> Decimal {
        range.open + range.prev_spread() * self.k
    }

    /// Strictly above the target counts as a breakout
    pub fn is_breakout(&self, current_price: Decimal, target_price: Decimal) -> bool {
        current_price > target_price
    }
}

/// Fixed fraction of starting cash per instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingPolicy {
    pub fraction: Decimal,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self { fraction: dec!(0.33) }
    }
}

impl SizingPolicy {
    pub fn new(fraction: Decimal) -> Self {
        Self { fraction }
    }

    pub fn allocation(&self, total_cash: Decimal) -> Decimal {
        total_cash * self.fraction
    }

    /// Whole shares affordable with `allocation` at `price`
    pub fn order_quantity(&self, allocation: Decimal, price: Decimal) -> u64 {
        if price <= Decimal::ZERO || allocation <= Decimal::ZERO {
            return 0;
        }
        (allocation / price).floor().to_u64().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_adds_half_of_previous_range() {
        let range = DailyRange { open: dec!(100), prev_high: dec!(110), prev_low: dec!(90) };
        assert_eq!(BreakoutPolicy::default().target_price(&range), dec!(110.0));
    }

    #[test]
    fn breakout_requires_strictly_higher_price() {
        let policy = BreakoutPolicy::default();
        assert!(!policy.is_breakout(dec!(110), dec!(110.0)));
        assert!(policy.is_breakout(dec!(111), dec!(110.0)));
    }

    #[test]
    fn quantity_floors_allocation_over_price() {
        let sizing = SizingPolicy::default();
        assert_eq!(sizing.order_quantity(dec!(330000), dec!(70000)), 4);
        assert_eq!(sizing.order_quantity(dec!(69999), dec!(70000)), 0);
        assert_eq!(sizing.order_quantity(dec!(330000), Decimal::ZERO), 0);
    }

    #[test]
    fn allocation_is_fraction_of_cash() {
        assert_eq!(SizingPolicy::default().allocation(dec!(1000000)), dec!(330000.00));
    }
}
