use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque account reference; carried through but never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetCategory {
    pub id: Option<CategoryId>,
    pub name: String,
    /// Monthly budget; zero means "no budget set".
    pub budget_amount: Money,
    pub is_active: bool,
}

impl BudgetCategory {
    pub fn new(name: &str, budget_amount: Money) -> Self {
        BudgetCategory {
            id: None,
            name: name.to_string(),
            budget_amount,
            is_active: true,
        }
    }
}
