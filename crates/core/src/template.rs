use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::{AccountId, CategoryId};
use crate::frequency::Frequency;
use crate::money::Money;
use crate::transaction::{Transaction, TransactionId, TransactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub date: NaiveDate,
    pub amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationState {
    Active,
    Paused,
    /// Active with a due date on or before today.
    Overdue,
}

/// A declared recurring bill, subscription or income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: Option<TemplateId>,
    pub name: String,
    pub amount: Money,
    pub kind: TransactionKind,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub next_due_date: NaiveDate,
    pub last_processed_date: Option<NaiveDate>,
    pub is_active: bool,
    /// Paid automatically; the notification layer skips overdue alerts for these.
    pub is_auto_pay: bool,
    pub is_variable_amount: bool,
    pub price_history: Vec<PriceSnapshot>,
    pub category_id: Option<CategoryId>,
    pub account_id: Option<AccountId>,
    pub notes: Option<String>,
    /// Transactions materialized from this template, oldest first.
    pub generated: Vec<TransactionId>,
}

impl RecurringTemplate {
    pub fn new(
        name: &str,
        amount: Money,
        kind: TransactionKind,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        RecurringTemplate {
            id: None,
            name: name.to_string(),
            amount,
            kind,
            frequency,
            start_date,
            end_date: None,
            next_due_date: start_date,
            last_processed_date: None,
            is_active: true,
            is_auto_pay: false,
            is_variable_amount: false,
            price_history: Vec::new(),
            category_id: None,
            account_id: None,
            notes: None,
            generated: Vec::new(),
        }
    }

    pub fn is_due(&self, now: NaiveDate) -> bool {
        self.is_active && self.next_due_date <= now
    }

    pub fn state(&self, now: NaiveDate) -> ObligationState {
        if !self.is_active {
            ObligationState::Paused
        } else if self.next_due_date <= now {
            ObligationState::Overdue
        } else {
            ObligationState::Active
        }
    }

    /// Negative when overdue.
    pub fn days_until_due(&self, now: NaiveDate) -> i64 {
        (self.next_due_date - now).num_days()
    }

    pub fn monthly_equivalent(&self) -> Money {
        self.frequency.monthly_equivalent(self.amount)
    }

    /// Builds the concrete occurrence due on `date`, linked back to this template.
    pub fn materialize(&self, date: NaiveDate) -> Transaction {
        Transaction {
            id: None,
            amount: self.amount,
            date,
            kind: self.kind,
            payee: self.name.clone(),
            notes: self.notes.clone(),
            category_id: self.category_id,
            account_id: self.account_id,
            template_id: self.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn netflix() -> RecurringTemplate {
        let mut t = RecurringTemplate::new(
            "Netflix",
            Money::from_cents(1799),
            TransactionKind::Expense,
            Frequency::Monthly,
            date(2025, 6, 1),
        );
        t.id = Some(TemplateId(7));
        t.next_due_date = date(2026, 1, 1);
        t.notes = Some("[Streaming]".to_string());
        t.category_id = Some(CategoryId(3));
        t
    }

    #[test]
    fn new_template_is_due_on_start() {
        let t = RecurringTemplate::new(
            "Rent",
            Money::from_cents(150_000),
            TransactionKind::Expense,
            Frequency::Monthly,
            date(2026, 1, 1),
        );
        assert_eq!(t.next_due_date, t.start_date);
        assert!(t.is_active);
        assert!(t.generated.is_empty());
    }

    #[test]
    fn state_transitions() {
        let mut t = netflix();
        assert_eq!(t.state(date(2025, 12, 31)), ObligationState::Active);
        assert_eq!(t.state(date(2026, 1, 1)), ObligationState::Overdue);
        assert_eq!(t.state(date(2026, 1, 5)), ObligationState::Overdue);
        t.is_active = false;
        assert_eq!(t.state(date(2026, 1, 5)), ObligationState::Paused);
        assert!(!t.is_due(date(2026, 1, 5)));
    }

    #[test]
    fn days_until_due_goes_negative_when_overdue() {
        let t = netflix();
        assert_eq!(t.days_until_due(date(2025, 12, 25)), 7);
        assert_eq!(t.days_until_due(date(2026, 1, 3)), -2);
    }

    #[test]
    fn materialize_copies_template_fields() {
        let t = netflix();
        let tx = t.materialize(date(2026, 1, 1));
        assert_eq!(tx.amount, Money::from_cents(1799));
        assert_eq!(tx.payee, "Netflix");
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.notes.as_deref(), Some("[Streaming]"));
        assert_eq!(tx.category_id, Some(CategoryId(3)));
        assert_eq!(tx.template_id, Some(TemplateId(7)));
        assert_eq!(tx.id, None);
    }
}
