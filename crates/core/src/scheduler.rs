//! Due-date state machine for recurring templates.
//!
//! `generate_due` is a pure batch step: it never touches storage, it returns
//! one [`TemplateMutation`] per template that changed. Each mutation must be
//! committed as a unit (template update plus inserted transactions), and the
//! committer should check `expected_next_due` so two overlapping runs cannot
//! both advance the same template.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::EngineError;
use crate::money::Money;
use crate::template::{ObligationState, RecurringTemplate, TemplateId};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMutation {
    /// Template state after this run.
    pub template: RecurringTemplate,
    /// `next_due_date` the mutation was computed from.
    pub expected_next_due: NaiveDate,
    /// Materialized occurrences, oldest first, each linked to the template.
    /// The store appends their ids to `template.generated` on commit.
    pub transactions: Vec<Transaction>,
}

impl TemplateMutation {
    pub fn deactivated(&self) -> bool {
        !self.template.is_active
    }
}

#[derive(Debug, Default)]
pub struct ScheduleRun {
    pub mutations: Vec<TemplateMutation>,
    /// Templates left untouched: unsaved ones, and those whose next date could
    /// not be computed. They stay due and are retried on the next run.
    pub failures: Vec<EngineError>,
}

impl ScheduleRun {
    pub fn materialized(&self) -> impl Iterator<Item = &Transaction> {
        self.mutations.iter().flat_map(|m| m.transactions.iter())
    }

    pub fn materialized_count(&self) -> usize {
        self.mutations.iter().map(|m| m.transactions.len()).sum()
    }

    pub fn deactivated_count(&self) -> usize {
        self.mutations.iter().filter(|m| m.deactivated()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpcomingObligation {
    pub template_id: Option<TemplateId>,
    pub name: String,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
    pub state: ObligationState,
    pub is_auto_pay: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ObligationScheduler {
    config: SchedulerConfig,
}

impl ObligationScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Materializes every occurrence due on or before `now` for the active
    /// templates in `templates`; inactive and not-yet-due templates are ignored.
    /// Templates are processed by due date, then name.
    pub fn generate_due(&self, now: NaiveDate, templates: &[RecurringTemplate]) -> ScheduleRun {
        let mut due: Vec<&RecurringTemplate> = templates.iter().filter(|t| t.is_due(now)).collect();
        due.sort_by(|a, b| {
            a.next_due_date
                .cmp(&b.next_due_date)
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut run = ScheduleRun::default();
        for template in due {
            if template.id.is_none() {
                let err = EngineError::Input(format!(
                    "template '{}' has no id, occurrences would have no parent",
                    template.name
                ));
                warn!("Recurring template skipped: {err}");
                run.failures.push(err);
                continue;
            }
            let (mutation, failure) = self.process(template, now);
            if let Some(mutation) = mutation {
                run.mutations.push(mutation);
            }
            if let Some(err) = failure {
                warn!("Recurring template not advanced: {err}");
                run.failures.push(err);
            }
        }

        info!(
            templates = run.mutations.len(),
            materialized = run.materialized_count(),
            deactivated = run.deactivated_count(),
            failures = run.failures.len(),
            "Recurring run complete for {now}"
        );
        run
    }

    fn process(
        &self,
        template: &RecurringTemplate,
        now: NaiveDate,
    ) -> (Option<TemplateMutation>, Option<EngineError>) {
        let mut updated = template.clone();
        let mut transactions = Vec::new();
        let mut failure = None;

        while updated.is_due(now) && transactions.len() < self.config.max_catch_up {
            let due = updated.next_due_date;
            if updated.end_date.is_some_and(|end| due > end) {
                debug!(template = %updated.name, %due, "past end date, deactivating");
                updated.is_active = false;
                break;
            }

            let Some(next) = updated.frequency.advance(due) else {
                failure = Some(EngineError::CalendarArithmetic {
                    template: updated.id,
                    name: updated.name.clone(),
                    frequency: updated.frequency,
                    from: due,
                });
                break;
            };

            transactions.push(updated.materialize(due));
            updated.last_processed_date = Some(due);

            if updated.end_date.is_some_and(|end| next > end) {
                debug!(template = %updated.name, %next, "next occurrence past end date, deactivating");
                updated.is_active = false;
            } else {
                updated.next_due_date = next;
            }
        }

        if transactions.len() >= self.config.max_catch_up && updated.is_due(now) {
            warn!(
                template = %updated.name,
                limit = self.config.max_catch_up,
                "catch-up limit reached, remaining occurrences deferred to the next run"
            );
        }

        let mutation = (updated != *template).then(|| TemplateMutation {
            template: updated,
            expected_next_due: template.next_due_date,
            transactions,
        });
        (mutation, failure)
    }

    /// Active templates due within `within_days` of `now`, overdue ones included,
    /// soonest first.
    pub fn upcoming(
        &self,
        templates: &[RecurringTemplate],
        now: NaiveDate,
        within_days: u32,
    ) -> Vec<UpcomingObligation> {
        let horizon = now
            .checked_add_days(Days::new(u64::from(within_days)))
            .unwrap_or(NaiveDate::MAX);

        let mut upcoming: Vec<UpcomingObligation> = templates
            .iter()
            .filter(|t| t.is_active && t.next_due_date <= horizon)
            .map(|t| UpcomingObligation {
                template_id: t.id,
                name: t.name.clone(),
                amount: t.amount,
                due_date: t.next_due_date,
                days_until_due: t.days_until_due(now),
                state: t.state(now),
                is_auto_pay: t.is_auto_pay,
            })
            .collect();
        upcoming.sort_by(|a, b| a.due_date.cmp(&b.due_date).then_with(|| a.name.cmp(&b.name)));
        upcoming
    }
}
