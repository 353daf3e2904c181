//! Next-month income and per-category spend projection.
//!
//! History is bucketed by calendar month over the lookback window. Income and
//! each category's spend are projected with an exponentially weighted average
//! favouring recent months; category projections are then blended with the
//! monthly-equivalent of the category's active recurring templates and floored
//! at that committed amount.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::category::{BudgetCategory, CategoryId};
use crate::config::ForecastConfig;
use crate::money::Money;
use crate::period::{DateRange, MonthKey};
use crate::template::RecurringTemplate;
use crate::transaction::{Transaction, TransactionKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryForecast {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub budget_amount: Money,
    /// EWMA of the category's monthly spend.
    pub historical_prediction: Money,
    /// Monthly-equivalent of the category's active recurring templates.
    pub recurring_amount: Money,
    pub predicted_spend: Money,
    pub trend: Trend,
    /// Predicted spend as a percentage of budget; 0 when no budget is set.
    pub utilization: f64,
    pub is_likely_over_budget: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub as_of: NaiveDate,
    pub month_count: usize,
    pub confidence: ConfidenceTier,
    pub predicted_income: Money,
    /// Highest predicted budget utilization first.
    pub categories: Vec<CategoryForecast>,
    pub predicted_expenses: Money,
    pub predicted_net: Money,
    pub predicted_savings_rate: f64,
}

impl ForecastSummary {
    pub fn over_budget(&self) -> impl Iterator<Item = &CategoryForecast> {
        self.categories.iter().filter(|c| c.is_likely_over_budget)
    }
}

/// Exponentially weighted average of `values` (oldest first): the i-th of N
/// values weighs `alpha^(N-1-i)`.
pub fn ewma(values: &[Money], alpha: Decimal) -> Money {
    match values {
        [] => Money::zero(),
        [only] => *only,
        _ => {
            let mut weight = Decimal::ONE;
            let mut weighted = Decimal::ZERO;
            let mut total_weight = Decimal::ZERO;
            for value in values.iter().rev() {
                weighted += value.as_decimal() * weight;
                total_weight += weight;
                weight *= alpha;
            }
            weighted
                .checked_div(total_weight)
                .map(Money::from_decimal)
                .unwrap_or_default()
        }
    }
}

#[derive(Debug, Default)]
struct MonthTotals {
    income: Money,
    expenses: HashMap<CategoryId, Money>,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    /// History window the forecast reads, ending at `now`.
    pub fn window(&self, now: NaiveDate) -> DateRange {
        DateRange::trailing_months(now, self.config.lookback_months)
    }

    /// Read-only projection from a snapshot of history, categories and templates.
    /// Transactions outside the lookback window ending at `now` are ignored.
    pub fn forecast(
        &self,
        transactions: &[Transaction],
        categories: &[BudgetCategory],
        templates: &[RecurringTemplate],
        now: NaiveDate,
    ) -> ForecastSummary {
        let window = self.window(now);
        let months = bucket_by_month(transactions, window);
        let month_count = months.len();

        let income_series: Vec<Money> = months.values().map(|m| m.income).collect();
        let predicted_income = ewma(&income_series, self.config.alpha);

        let mut forecasts: Vec<CategoryForecast> = categories
            .iter()
            .filter(|c| c.is_active)
            .map(|category| self.forecast_category(category, &months, templates))
            .collect();
        forecasts.sort_by(|a, b| {
            b.utilization
                .total_cmp(&a.utilization)
                .then_with(|| a.name.cmp(&b.name))
        });

        let predicted_expenses: Money = forecasts.iter().map(|c| c.predicted_spend).sum();
        let predicted_net = predicted_income - predicted_expenses;
        let predicted_savings_rate = percent(predicted_net, predicted_income).unwrap_or(0.0);

        debug!(
            month_count,
            categories = forecasts.len(),
            income = %predicted_income,
            expenses = %predicted_expenses,
            "forecast computed"
        );

        ForecastSummary {
            as_of: now,
            month_count,
            confidence: self.confidence(month_count),
            predicted_income,
            categories: forecasts,
            predicted_expenses,
            predicted_net,
            predicted_savings_rate,
        }
    }

    fn confidence(&self, month_count: usize) -> ConfidenceTier {
        if month_count >= self.config.high_confidence_months {
            ConfidenceTier::High
        } else if month_count >= self.config.medium_confidence_months {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }

    fn forecast_category(
        &self,
        category: &BudgetCategory,
        months: &BTreeMap<MonthKey, MonthTotals>,
        templates: &[RecurringTemplate],
    ) -> CategoryForecast {
        let series: Vec<Money> = months
            .values()
            .map(|m| {
                category
                    .id
                    .and_then(|id| m.expenses.get(&id).copied())
                    .unwrap_or_default()
            })
            .collect();

        let historical_prediction = ewma(&series, self.config.alpha);
        let recurring_amount: Money = templates
            .iter()
            .filter(|t| {
                t.is_active
                    && t.kind == TransactionKind::Expense
                    && t.category_id.is_some()
                    && t.category_id == category.id
            })
            .map(RecurringTemplate::monthly_equivalent)
            .sum();
        let predicted_spend = self.blend(historical_prediction, recurring_amount);

        let budget = category.budget_amount;
        CategoryForecast {
            category_id: category.id,
            name: category.name.clone(),
            budget_amount: budget,
            historical_prediction,
            recurring_amount,
            predicted_spend,
            trend: self.trend(&series),
            utilization: percent(predicted_spend, budget).unwrap_or(0.0),
            is_likely_over_budget: budget.is_positive() && predicted_spend > budget,
        }
    }

    /// Never projects below the committed recurring amount.
    fn blend(&self, historical: Money, recurring: Money) -> Money {
        if !recurring.is_positive() {
            return historical;
        }
        let w = self.config.recurring_weight;
        let blended = Money::from_decimal(
            historical.as_decimal() * (Decimal::ONE - w) + recurring.as_decimal() * w,
        );
        blended.max(recurring)
    }

    /// Compares the oldest and newest of the last three non-empty months.
    fn trend(&self, series: &[Money]) -> Trend {
        let non_empty: Vec<Money> = series.iter().copied().filter(|m| !m.is_zero()).collect();
        let [.., first, _, last] = non_empty.as_slice() else {
            return Trend::Insufficient;
        };
        if !first.is_positive() {
            return Trend::Stable;
        }
        let change = percent(*last - *first, *first).unwrap_or(0.0);
        let threshold = self.config.trend_threshold_percent;
        if change > threshold {
            Trend::Increasing
        } else if change < -threshold {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

fn bucket_by_month(transactions: &[Transaction], window: DateRange) -> BTreeMap<MonthKey, MonthTotals> {
    let mut months: BTreeMap<MonthKey, MonthTotals> = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| window.contains(tx.date)) {
        match tx.kind {
            TransactionKind::Income => {
                let month = months.entry(MonthKey::of(tx.date)).or_default();
                month.income = month.income + tx.amount;
            }
            TransactionKind::Expense => {
                let month = months.entry(MonthKey::of(tx.date)).or_default();
                if let Some(category) = tx.category_id {
                    let spent = month.expenses.entry(category).or_default();
                    *spent = *spent + tx.amount;
                }
            }
            TransactionKind::Transfer => {}
        }
    }
    months
}

/// `part / whole * 100` for display; `None` when `whole` is not positive.
fn percent(part: Money, whole: Money) -> Option<f64> {
    if !whole.is_positive() {
        return None;
    }
    part.ratio(whole)
        .and_then(|r| (r * Decimal::ONE_HUNDRED).to_f64())
}
