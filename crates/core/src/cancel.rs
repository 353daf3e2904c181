//! "Should I cancel this?" scoring for active expense templates.
//!
//! Every template starts at 100 and loses points for a large share of
//! recurring spend, a price increase, going unused, and having a variable
//! amount. Only templates that fall below the suggestion threshold with at
//! least one explained reason are reported.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::CancellationConfig;
use crate::money::Money;
use crate::period::DateRange;
use crate::template::{RecurringTemplate, TemplateId};
use crate::transaction::{Transaction, TransactionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationSuggestion {
    pub template_id: Option<TemplateId>,
    pub name: String,
    /// 0-100; lower means a stronger case for cancelling.
    pub score: u32,
    pub reasons: Vec<String>,
    pub monthly_cost: Money,
    /// Fraction of total active monthly recurring spend, in percent.
    pub cost_share: f64,
}

#[derive(Debug, Clone, Default)]
pub struct CancellationScorer {
    config: CancellationConfig,
}

impl CancellationScorer {
    pub fn new(config: CancellationConfig) -> Self {
        Self { config }
    }

    /// Scores active expense templates. `history` is used to look up each
    /// template's materialized transactions by their parent-template reference.
    pub fn score(
        &self,
        templates: &[RecurringTemplate],
        history: &[Transaction],
        now: NaiveDate,
    ) -> Vec<CancellationSuggestion> {
        let active: Vec<&RecurringTemplate> = templates
            .iter()
            .filter(|t| t.is_active && t.kind == TransactionKind::Expense)
            .collect();
        let total_monthly: Money = active.iter().map(|t| t.monthly_equivalent()).sum();

        let mut by_template: HashMap<TemplateId, Vec<NaiveDate>> = HashMap::new();
        for tx in history {
            if let Some(id) = tx.template_id {
                by_template.entry(id).or_default().push(tx.date);
            }
        }
        let recent = DateRange::trailing_months(now, self.config.unused_months);

        let mut suggestions: Vec<CancellationSuggestion> = active
            .into_iter()
            .filter_map(|t| {
                let dates = t.id.and_then(|id| by_template.get(&id)).map(Vec::as_slice).unwrap_or(&[]);
                self.score_template(t, total_monthly, dates, recent)
            })
            .collect();
        suggestions.sort_by(|a, b| a.score.cmp(&b.score).then_with(|| a.name.cmp(&b.name)));
        suggestions
    }

    fn score_template(
        &self,
        template: &RecurringTemplate,
        total_monthly: Money,
        generated_dates: &[NaiveDate],
        recent: DateRange,
    ) -> Option<CancellationSuggestion> {
        let c = &self.config;
        let mut penalty: u32 = 0;
        let mut reasons = Vec::new();

        let monthly_cost = template.monthly_equivalent();
        let share = monthly_cost.ratio(total_monthly).unwrap_or(Decimal::ZERO);
        let cost_share = (share * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0);
        if share > c.high_cost_share {
            penalty = penalty.saturating_add(c.high_cost_penalty);
            reasons.push(format!("High cost: {cost_share:.0}% of recurring spend"));
        } else if share > c.elevated_cost_share {
            penalty = penalty.saturating_add(c.elevated_cost_penalty);
        }

        if let Some(pct) = template.price_increase_percentage().filter(|pct| *pct > 0.0) {
            penalty = penalty.saturating_add(c.price_increase_penalty);
            reasons.push(format!("Price up {pct:.1}% since first recorded"));
        }

        let ever_used = !generated_dates.is_empty() || !template.generated.is_empty();
        let used_recently = generated_dates.iter().any(|d| recent.contains(*d));
        if ever_used && !used_recently {
            penalty = penalty.saturating_add(c.unused_penalty);
            reasons.push(format!("No transactions in last {} months", c.unused_months));
        }

        if template.is_variable_amount {
            penalty = penalty.saturating_add(c.variable_penalty);
        }

        let score = 100u32.saturating_sub(penalty);
        debug!(template = %template.name, score, reasons = reasons.len(), "cancellation score");

        (score < c.suggestion_threshold && !reasons.is_empty()).then(|| CancellationSuggestion {
            template_id: template.id,
            name: template.name.clone(),
            score,
            reasons,
            monthly_cost,
            cost_share,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::Frequency;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sub(id: i64, name: &str, cents: i64) -> RecurringTemplate {
        let mut t = RecurringTemplate::new(
            name,
            Money::from_cents(cents),
            TransactionKind::Expense,
            Frequency::Monthly,
            date(2025, 1, 1),
        );
        t.id = Some(TemplateId(id));
        t
    }

    fn generated(template: i64, on: NaiveDate) -> Transaction {
        let mut tx = Transaction::new("x", Money::from_cents(100), on, TransactionKind::Expense);
        tx.template_id = Some(TemplateId(template));
        tx
    }

    fn with_price_rise(mut t: RecurringTemplate) -> RecurringTemplate {
        t.record_price(Money::from_cents(1000), date(2025, 1, 1));
        t.record_price(Money::from_cents(1200), date(2025, 6, 1));
        t
    }

    fn now() -> NaiveDate {
        date(2026, 6, 15)
    }

    fn scorer() -> CancellationScorer {
        CancellationScorer::default()
    }

    /// Cheap filler templates so the template under test has a small cost share.
    fn fillers() -> Vec<RecurringTemplate> {
        (100..110).map(|id| sub(id, &format!("Filler {id}"), 10_000)).collect()
    }

    #[test]
    fn high_cost_alone_is_not_enough() {
        let suggestions = scorer().score(&[sub(1, "Rent", 150_000)], &[], now());
        assert!(suggestions.is_empty());
    }

    #[test]
    fn high_cost_and_price_rise_is_suggested() {
        let rent = with_price_rise(sub(1, "Rent", 150_000));
        let suggestions = scorer().score(&[rent], &[], now());
        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.score, 65);
        assert_eq!(s.reasons.len(), 2);
        assert!(s.reasons[0].starts_with("High cost"));
        assert_eq!(s.reasons[1], "Price up 20.0% since first recorded");
        assert_eq!(s.cost_share, 100.0);
    }

    #[test]
    fn unused_subscription_with_price_rise() {
        let mut templates = fillers();
        let gym = with_price_rise(sub(1, "Gym", 1000));
        templates.push(gym);
        let history = vec![generated(1, date(2026, 1, 1))];

        let suggestions = scorer().score(&templates, &history, now());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "Gym");
        assert_eq!(suggestions[0].score, 60);
        assert_eq!(
            suggestions[0].reasons,
            vec![
                "Price up 20.0% since first recorded".to_string(),
                "No transactions in last 3 months".to_string(),
            ]
        );
    }

    #[test]
    fn recent_use_clears_unused_penalty() {
        let mut templates = fillers();
        templates.push(with_price_rise(sub(1, "Gym", 1000)));
        let history = vec![generated(1, date(2026, 1, 1)), generated(1, date(2026, 5, 1))];
        assert!(scorer().score(&templates, &history, now()).is_empty());
    }

    #[test]
    fn never_materialized_is_not_unused() {
        let mut templates = fillers();
        let mut fresh = sub(1, "New Service", 1000);
        fresh.is_variable_amount = true;
        templates.push(with_price_rise(fresh));
        // 100 - 15 - 5 = 80
        assert!(scorer().score(&templates, &[], now()).is_empty());
    }

    #[test]
    fn elevated_cost_has_no_reason_of_its_own() {
        // 20% share with four equal peers
        let templates: Vec<RecurringTemplate> = (1..=5).map(|id| sub(id, &format!("S{id}"), 1000)).collect();
        assert!(scorer().score(&templates, &[], now()).is_empty());
    }

    #[test]
    fn silent_penalties_never_produce_a_suggestion() {
        let config = CancellationConfig {
            variable_penalty: 60,
            ..CancellationConfig::default()
        };
        let mut templates = fillers();
        let mut t = sub(1, "Power", 1000);
        t.is_variable_amount = true;
        templates.push(t);
        assert!(CancellationScorer::new(config).score(&templates, &[], now()).is_empty());
    }

    #[test]
    fn score_is_floored_at_zero() {
        let config = CancellationConfig {
            price_increase_penalty: 90,
            unused_penalty: 90,
            ..CancellationConfig::default()
        };
        let mut t = with_price_rise(sub(1, "Magazine", 1000));
        t.generated = vec![crate::transaction::TransactionId(9)];
        let suggestions = CancellationScorer::new(config).score(&[t], &[], now());
        assert_eq!(suggestions[0].score, 0);
    }

    #[test]
    fn quarter_share_takes_the_elevated_penalty() {
        // Exactly 25%: -10, not -20. Then -15 for the price rise, -25 unused.
        let mut templates: Vec<RecurringTemplate> =
            (100..103).map(|id| sub(id, &format!("Filler {id}"), 1000)).collect();
        templates.push(with_price_rise(sub(1, "Gym", 1000)));
        let history = vec![generated(1, date(2026, 1, 1))];

        let suggestions = scorer().score(&templates, &history, now());
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "Gym");
        assert_eq!(suggestions[0].score, 50);
        assert_eq!(suggestions[0].cost_share, 25.0);
        assert!(suggestions[0].reasons.iter().all(|r| !r.starts_with("High cost")));
    }

    #[test]
    fn huge_penalties_saturate() {
        let config = CancellationConfig {
            price_increase_penalty: u32::MAX,
            unused_penalty: u32::MAX,
            variable_penalty: u32::MAX,
            ..CancellationConfig::default()
        };
        let mut t = with_price_rise(sub(1, "Magazine", 1000));
        t.is_variable_amount = true;
        t.generated = vec![crate::transaction::TransactionId(9)];
        let suggestions = CancellationScorer::new(config).score(&[t], &[], now());
        assert_eq!(suggestions[0].score, 0);
    }

    #[test]
    fn sorted_most_concerning_first() {
        let mut templates = fillers();
        templates.push(with_price_rise(sub(1, "Gym", 1000)));
        templates.push(with_price_rise(sub(2, "Magazine", 1000)));
        let history = vec![generated(1, date(2025, 12, 1)), generated(2, date(2026, 6, 1))];
        let mut unused_variable = with_price_rise(sub(3, "Cloud", 1000));
        unused_variable.is_variable_amount = true;
        templates.push(unused_variable);
        let history = [history, vec![generated(3, date(2025, 11, 1))]].concat();

        let suggestions = scorer().score(&templates, &history, now());
        let names: Vec<&str> = suggestions.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Cloud", "Gym"]);
        assert!(suggestions.iter().all(|s| s.score < 70 && !s.reasons.is_empty()));
    }

    #[test]
    fn income_and_paused_templates_are_not_scored() {
        let mut salary = with_price_rise(sub(1, "Salary", 500_000));
        salary.kind = TransactionKind::Income;
        let mut paused = with_price_rise(sub(2, "Old Gym", 150_000));
        paused.is_active = false;
        assert!(scorer().score(&[salary, paused], &[], now()).is_empty());
    }
}
