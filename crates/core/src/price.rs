//! Price history kept on each template.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::money::Money;
use crate::template::{PriceSnapshot, RecurringTemplate};

impl RecurringTemplate {
    /// Appends a snapshot. History is kept in insertion order; callers record in date order.
    pub fn record_price(&mut self, amount: Money, date: NaiveDate) {
        self.price_history.push(PriceSnapshot { date, amount });
    }

    /// Change from the first to the latest recorded price, in percent.
    pub fn price_increase_percentage(&self) -> Option<f64> {
        let first = self.price_history.first()?;
        let latest = self.price_history.last()?;
        if self.price_history.len() < 2 || first.amount.is_zero() {
            return None;
        }
        let change = (latest.amount - first.amount).ratio(first.amount)?;
        (change * Decimal::ONE_HUNDRED).to_f64()
    }

    pub fn has_price_increase(&self) -> bool {
        self.price_increase_percentage().is_some_and(|pct| pct > 0.0)
    }

    /// Sets a new amount, recording a snapshot only when it actually changed.
    /// Returns whether anything changed.
    pub fn update_amount(&mut self, amount: Money, date: NaiveDate) -> bool {
        if amount == self.amount {
            return false;
        }
        if self.price_history.is_empty() {
            self.record_price(self.amount, self.start_date);
        }
        self.amount = amount;
        self.record_price(amount, date);
        true
    }
}
