//! Recurring-charge detection over unlinked transaction history.
//!
//! A payee becomes a candidate when it has at least `min_matches`
//! transactions that are not already materialized from a template, and no
//! active template carries the same name. Frequency and amount variability
//! are inferred from the matches; the caller decides whether to promote the
//! candidate to a [`RecurringTemplate`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::DetectionConfig;
use crate::frequency::{infer_frequency, Frequency};
use crate::money::Money;
use crate::tags::{format_tags, TagExtractor};
use crate::template::RecurringTemplate;
use crate::transaction::{Transaction, TransactionKind};
use crate::variability::analyze_amounts;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub payee: String,
    /// Matching transactions, oldest first.
    pub transactions: Vec<Transaction>,
    pub frequency: Frequency,
    pub kind: TransactionKind,
    /// Amount of the most recent match.
    pub suggested_amount: Money,
    pub average_amount: Money,
    pub is_variable_amount: bool,
    pub tags: Vec<String>,
    pub suggested_notes: Option<String>,
}

impl DetectionResult {
    pub fn has_bill_tags(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn last_seen(&self) -> Option<NaiveDate> {
        self.transactions.last().map(|tx| tx.date)
    }

    /// Builds an unsaved template from this candidate. The next due date is one
    /// period after the latest match; the observed amounts seed the price history.
    pub fn into_template(self) -> Option<RecurringTemplate> {
        let first = self.transactions.first()?;
        let last = self.transactions.last()?;
        let next_due = self.frequency.advance(last.date)?;

        let mut template = RecurringTemplate::new(
            &self.payee,
            self.suggested_amount,
            self.kind,
            self.frequency,
            first.date,
        );
        template.next_due_date = next_due;
        template.last_processed_date = Some(last.date);
        template.is_variable_amount = self.is_variable_amount;
        template.category_id = last.category_id;
        template.account_id = last.account_id;
        template.notes = self.suggested_notes;
        for tx in &self.transactions {
            template.record_price(tx.amount, tx.date);
        }
        Some(template)
    }
}

pub struct PatternDetector<E: TagExtractor> {
    config: DetectionConfig,
    extractor: E,
}

impl<E: TagExtractor> PatternDetector<E> {
    pub fn new(extractor: E) -> Self {
        Self::with_config(DetectionConfig::default(), extractor)
    }

    pub fn with_config(config: DetectionConfig, extractor: E) -> Self {
        Self { config, extractor }
    }

    /// Looks for a recurring pattern for one payee. `None` means "nothing to
    /// suggest": too few unlinked matches, or an active template already exists.
    pub fn detect(
        &self,
        payee: &str,
        transactions: &[Transaction],
        active_templates: &[RecurringTemplate],
    ) -> Option<DetectionResult> {
        let mut matches: Vec<&Transaction> = transactions
            .iter()
            .filter(|tx| !tx.is_linked() && tx.payee_matches(payee))
            .collect();
        if matches.len() < self.config.min_matches {
            return None;
        }

        let wanted = payee.to_lowercase();
        if active_templates
            .iter()
            .any(|t| t.is_active && t.name.to_lowercase() == wanted)
        {
            debug!(payee, "skipping detection, active template already exists");
            return None;
        }

        matches.sort_by_key(|tx| tx.date);
        let dates: Vec<NaiveDate> = matches.iter().map(|tx| tx.date).collect();
        let amounts: Vec<Money> = matches.iter().map(|tx| tx.amount).collect();

        let frequency = infer_frequency(&dates);
        let stats = analyze_amounts(&amounts, self.config.variability_threshold).ok()?;
        let latest = matches.last()?;

        let mut tags: Vec<String> = Vec::new();
        for tx in &matches {
            let Some(notes) = tx.notes.as_deref() else {
                continue;
            };
            for tag in self.extractor.extract(notes) {
                if !tags.contains(&tag) {
                    tags.push(tag);
                }
            }
        }
        let suggested_notes = (!tags.is_empty()).then(|| format_tags(&tags));

        debug!(
            payee,
            matches = matches.len(),
            %frequency,
            variable = stats.is_variable,
            "recurring pattern detected"
        );

        Some(DetectionResult {
            payee: payee.to_string(),
            frequency,
            kind: latest.kind,
            suggested_amount: latest.amount,
            average_amount: stats.mean,
            is_variable_amount: stats.is_variable,
            tags,
            suggested_notes,
            transactions: matches.into_iter().cloned().collect(),
        })
    }

    /// Runs [`detect`](Self::detect) for every distinct unlinked payee.
    /// Candidates are ordered by match count, most first, then by payee.
    pub fn scan(
        &self,
        transactions: &[Transaction],
        active_templates: &[RecurringTemplate],
    ) -> Vec<DetectionResult> {
        // Keyed by lowercased payee; the first spelling seen is reported.
        let mut payees: BTreeMap<String, &str> = BTreeMap::new();
        for tx in transactions.iter().filter(|tx| !tx.is_linked()) {
            payees
                .entry(tx.payee.to_lowercase())
                .or_insert(tx.payee.as_str());
        }

        let mut results: Vec<DetectionResult> = payees
            .values()
            .filter_map(|payee| self.detect(payee, transactions, active_templates))
            .collect();
        results.sort_by(|a, b| {
            b.transactions
                .len()
                .cmp(&a.transactions.len())
                .then_with(|| a.payee.cmp(&b.payee))
        });
        results
    }
}
