//! Batch entry points that connect the pure engines to the record store.

use chrono::NaiveDate;
use recur_core::{
    CancellationScorer, CancellationSuggestion, DetectionResult, EngineError, ForecastEngine,
    ForecastSummary, ObligationScheduler, PatternDetector, TagExtractor, TemplateId, Transaction,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{
    fetch_active_budget_categories, fetch_active_templates, fetch_due_templates,
    fetch_transactions, insert_template, persist, DbPool, TransactionFilter,
};
use crate::error::{Result, StoreError};

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub templates_updated: usize,
    /// Committed occurrences, with store-assigned ids.
    pub materialized: Vec<Transaction>,
    pub deactivated: usize,
    /// Templates the scheduler refused or could not advance.
    pub scheduler_failures: usize,
    /// Mutations rejected by the store, conflicts included.
    pub storage_failures: usize,
}

/// Materializes everything due on or before `now`. Each template is committed
/// on its own; a failed commit is logged and counted and the run continues.
pub async fn run_due(pool: &DbPool, scheduler: &ObligationScheduler, now: NaiveDate) -> Result<RunReport> {
    let templates = fetch_due_templates(pool, now).await?;
    let run = scheduler.generate_due(now, &templates);

    let mut report = RunReport {
        scheduler_failures: run.failures.len(),
        ..RunReport::default()
    };

    for mutation in run.mutations {
        match persist(pool, &mutation).await {
            Ok(ids) => {
                report.templates_updated += 1;
                if mutation.deactivated() {
                    report.deactivated += 1;
                }
                report.materialized.extend(mutation.transactions.into_iter().zip(ids).map(
                    |(mut tx, id)| {
                        tx.id = Some(id);
                        tx
                    },
                ));
            }
            Err(StoreError::Conflict(id)) => {
                warn!(template = %id, "Skipped template already advanced by another run");
                report.storage_failures += 1;
            }
            Err(e) => {
                warn!(template = %mutation.template.name, "Failed to commit recurring run: {e}");
                report.storage_failures += 1;
            }
        }
    }

    info!(
        updated = report.templates_updated,
        materialized = report.materialized.len(),
        deactivated = report.deactivated,
        scheduler_failures = report.scheduler_failures,
        storage_failures = report.storage_failures,
        "Committed recurring run for {now}"
    );
    Ok(report)
}

pub async fn run_forecast(pool: &DbPool, engine: &ForecastEngine, now: NaiveDate) -> Result<ForecastSummary> {
    let transactions = fetch_transactions(pool, &TransactionFilter::within(engine.window(now))).await?;
    let categories = fetch_active_budget_categories(pool).await?;
    let templates = fetch_active_templates(pool).await?;
    Ok(engine.forecast(&transactions, &categories, &templates, now))
}

pub async fn run_cancellation_scoring(
    pool: &DbPool,
    scorer: &CancellationScorer,
    now: NaiveDate,
) -> Result<Vec<CancellationSuggestion>> {
    let templates = fetch_active_templates(pool).await?;
    let history = fetch_transactions(pool, &TransactionFilter::linked()).await?;
    Ok(scorer.score(&templates, &history, now))
}

/// Scans unlinked history for recurring payees without an active template.
pub async fn run_detection<E: TagExtractor>(
    pool: &DbPool,
    detector: &PatternDetector<E>,
) -> Result<Vec<DetectionResult>> {
    let transactions = fetch_transactions(pool, &TransactionFilter::unlinked()).await?;
    let templates = fetch_active_templates(pool).await?;
    Ok(detector.scan(&transactions, &templates))
}

/// Saves a detected candidate as a new active template.
pub async fn promote(pool: &DbPool, candidate: DetectionResult) -> Result<TemplateId> {
    let payee = candidate.payee.clone();
    let template = candidate
        .into_template()
        .ok_or_else(|| EngineError::Input(format!("no schedule could be built for '{payee}'")))?;
    let id = insert_template(pool, &template).await?;
    info!(template = %id, payee, next_due = %template.next_due_date, "Promoted recurring candidate");
    Ok(id)
}
