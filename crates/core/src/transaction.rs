use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::category::{AccountId, CategoryId};
use crate::money::Money;
use crate::template::TemplateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Income => write!(f, "income"),
            TransactionKind::Expense => write!(f, "expense"),
            TransactionKind::Transfer => write!(f, "transfer"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            "transfer" => Ok(TransactionKind::Transfer),
            other => Err(format!("Unknown transaction kind: '{other}'")),
        }
    }
}

/// A historical money movement. The amount is unsigned; direction comes from `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<TransactionId>,
    pub amount: Money,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub payee: String,
    /// Free text that may embed bracketed tags, e.g. `"[Utilities] paid online"`.
    pub notes: Option<String>,
    pub category_id: Option<CategoryId>,
    pub account_id: Option<AccountId>,
    /// Set when the transaction was materialized from a recurring template.
    pub template_id: Option<TemplateId>,
}

impl Transaction {
    pub fn new(payee: &str, amount: Money, date: NaiveDate, kind: TransactionKind) -> Self {
        Transaction {
            id: None,
            amount,
            date,
            kind,
            payee: payee.to_string(),
            notes: None,
            category_id: None,
            account_id: None,
            template_id: None,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.template_id.is_some()
    }

    pub fn payee_matches(&self, payee: &str) -> bool {
        self.payee.to_lowercase() == payee.to_lowercase()
    }
}
