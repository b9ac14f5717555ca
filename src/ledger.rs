// In-memory position ledger, bought set and liquidation guard

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::schedule::LiquidationWindow;
use crate::types::AccountBalance;

/// Cached instrument -> quantity view of the account. Stale between refreshes.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: BTreeMap<String, u64>,
}

impl PositionLedger {
    pub fn replace(&mut self, balance: &AccountBalance) {
        self.positions = balance.quantities();
    }

    pub fn quantity(&self, code: &str) -> u64 {
        self.positions.get(code).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.positions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Names bought today, never more than `capacity`
#[derive(Debug, Clone)]
pub struct BoughtSet {
    names: Vec<String>,
    capacity: usize,
}

impl BoughtSet {
    pub fn new(capacity: usize) -> Self {
        Self { names: Vec::with_capacity(capacity), capacity }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.names.iter().any(|n| n == code)
    }

    pub fn is_full(&self) -> bool {
        self.names.len() >= self.capacity
    }

    /// Returns false when the name is already present or the set is full
    pub fn insert(&mut self, code: &str) -> bool {
        if self.contains(code) || self.is_full() {
            return false;
        }
        self.names.push(code.to_string());
        true
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Records which liquidation windows already ran, keyed by calendar date
#[derive(Debug, Clone, Default)]
pub struct LiquidationGuard {
    done: BTreeSet<(NaiveDate, LiquidationWindow)>,
}

impl LiquidationGuard {
    pub fn is_done(&self, date: NaiveDate, window: LiquidationWindow) -> bool {
        self.done.contains(&(date, window))
    }

    pub fn mark_done(&mut self, date: NaiveDate, window: LiquidationWindow) {
        // earlier days can never match again
        self.done.retain(|(d, _)| *d >= date);
        self.done.insert((date, window));
    }
}
