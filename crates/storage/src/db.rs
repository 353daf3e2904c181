use chrono::NaiveDate;
use recur_core::{
    AccountId, BudgetCategory, CategoryId, DateRange, Frequency, Money, PriceSnapshot,
    RecurringTemplate, TemplateId, TemplateMutation, Transaction, TransactionId, TransactionKind,
};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, StoreError};

pub type DbPool = Pool<Sqlite>;

pub async fn create_db(path: &Path) -> Result<DbPool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA cache_size = -32000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            budget_amount TEXT NOT NULL DEFAULT '0',
            is_active INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,
            kind TEXT NOT NULL,
            frequency TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            next_due_date TEXT NOT NULL,
            last_processed_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_auto_pay INTEGER NOT NULL DEFAULT 0,
            is_variable_amount INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER,
            account_id INTEGER,
            notes TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            CHECK (next_due_date >= start_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            template_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            amount TEXT NOT NULL,
            FOREIGN KEY (template_id) REFERENCES templates(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount TEXT NOT NULL,
            date TEXT NOT NULL,
            kind TEXT NOT NULL,
            payee TEXT NOT NULL,
            notes TEXT,
            category_id INTEGER,
            account_id INTEGER,
            template_id INTEGER,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (template_id) REFERENCES templates(id) ON DELETE SET NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_template ON transactions(template_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date)")
        .execute(pool)
        .await?;

    Ok(())
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| StoreError::Corrupt(format!("invalid date '{s}': {e}")))
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

fn parse_money(s: &str) -> Result<Money> {
    Decimal::from_str(s)
        .map(Money::from_decimal)
        .map_err(|e| StoreError::Corrupt(format!("invalid amount '{s}': {e}")))
}

fn parse_kind(s: &str) -> Result<TransactionKind> {
    s.parse().map_err(StoreError::Corrupt)
}

fn parse_frequency(s: &str) -> Result<Frequency> {
    s.parse().map_err(StoreError::Corrupt)
}

fn money_text(m: Money) -> String {
    m.as_decimal().to_string()
}

const TEMPLATE_COLUMNS: &str = "id, name, amount, kind, frequency, start_date, end_date, \
     next_due_date, last_processed_date, is_active, is_auto_pay, is_variable_amount, \
     category_id, account_id, notes";

type TemplateRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
    i64,
    Option<i64>,
    Option<i64>,
    Option<String>,
);

fn template_from_row(r: TemplateRow) -> Result<RecurringTemplate> {
    Ok(RecurringTemplate {
        id: Some(TemplateId(r.0)),
        name: r.1,
        amount: parse_money(&r.2)?,
        kind: parse_kind(&r.3)?,
        frequency: parse_frequency(&r.4)?,
        start_date: parse_date(&r.5)?,
        end_date: parse_opt_date(r.6)?,
        next_due_date: parse_date(&r.7)?,
        last_processed_date: parse_opt_date(r.8)?,
        is_active: r.9 != 0,
        is_auto_pay: r.10 != 0,
        is_variable_amount: r.11 != 0,
        price_history: Vec::new(),
        category_id: r.12.map(CategoryId),
        account_id: r.13.map(AccountId),
        notes: r.14,
        generated: Vec::new(),
    })
}

const TRANSACTION_COLUMNS: &str =
    "id, amount, date, kind, payee, notes, category_id, account_id, template_id";

type TransactionRow = (
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
);

fn transaction_from_row(r: TransactionRow) -> Result<Transaction> {
    Ok(Transaction {
        id: Some(TransactionId(r.0)),
        amount: parse_money(&r.1)?,
        date: parse_date(&r.2)?,
        kind: parse_kind(&r.3)?,
        payee: r.4,
        notes: r.5,
        category_id: r.6.map(CategoryId),
        account_id: r.7.map(AccountId),
        template_id: r.8.map(TemplateId),
    })
}

// ── Categories ────────────────────────────────────────────────────────────────

pub async fn insert_category(pool: &DbPool, category: &BudgetCategory) -> Result<CategoryId> {
    let result = sqlx::query("INSERT INTO categories (name, budget_amount, is_active) VALUES (?, ?, ?)")
        .bind(&category.name)
        .bind(money_text(category.budget_amount))
        .bind(category.is_active as i64)
        .execute(pool)
        .await?;
    Ok(CategoryId(result.last_insert_rowid()))
}

pub async fn fetch_active_budget_categories(pool: &DbPool) -> Result<Vec<BudgetCategory>> {
    let rows = sqlx::query_as::<_, (i64, String, String, i64)>(
        "SELECT id, name, budget_amount, is_active FROM categories WHERE is_active = 1 ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| {
            Ok(BudgetCategory {
                id: Some(CategoryId(r.0)),
                name: r.1,
                budget_amount: parse_money(&r.2)?,
                is_active: r.3 != 0,
            })
        })
        .collect()
}

// ── Transactions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub range: Option<DateRange>,
    /// Case-insensitive exact payee match, Unicode-aware.
    pub payee: Option<String>,
    /// `Some(false)`: only transactions without a parent template;
    /// `Some(true)`: only materialized ones.
    pub linked: Option<bool>,
    pub template_id: Option<TemplateId>,
    pub kind: Option<TransactionKind>,
}

impl TransactionFilter {
    pub fn within(range: DateRange) -> Self {
        Self {
            range: Some(range),
            ..Self::default()
        }
    }

    pub fn unlinked() -> Self {
        Self {
            linked: Some(false),
            ..Self::default()
        }
    }

    pub fn linked() -> Self {
        Self {
            linked: Some(true),
            ..Self::default()
        }
    }
}

async fn insert_transaction_with<'e, E>(executor: E, tx: &Transaction) -> Result<TransactionId>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "INSERT INTO transactions (amount, date, kind, payee, notes, category_id, account_id, template_id) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(money_text(tx.amount))
    .bind(tx.date.to_string())
    .bind(tx.kind.to_string())
    .bind(tx.payee.clone())
    .bind(tx.notes.clone())
    .bind(tx.category_id.map(|c| c.0))
    .bind(tx.account_id.map(|a| a.0))
    .bind(tx.template_id.map(|t| t.0))
    .execute(executor)
    .await?;
    Ok(TransactionId(result.last_insert_rowid()))
}

pub async fn insert_transaction(pool: &DbPool, tx: &Transaction) -> Result<TransactionId> {
    insert_transaction_with(pool, tx).await
}

pub async fn fetch_transactions(pool: &DbPool, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE 1 = 1"));

    if let Some(range) = filter.range {
        qb.push(" AND date >= ").push_bind(range.start.to_string());
        qb.push(" AND date <= ").push_bind(range.end.to_string());
    }
    match filter.linked {
        Some(true) => {
            qb.push(" AND template_id IS NOT NULL");
        }
        Some(false) => {
            qb.push(" AND template_id IS NULL");
        }
        None => {}
    }
    if let Some(id) = filter.template_id {
        qb.push(" AND template_id = ").push_bind(id.0);
    }
    if let Some(kind) = filter.kind {
        qb.push(" AND kind = ").push_bind(kind.to_string());
    }
    qb.push(" ORDER BY date, id");

    let rows: Vec<TransactionRow> = qb.build_query_as().fetch_all(pool).await?;
    let mut transactions = rows
        .into_iter()
        .map(transaction_from_row)
        .collect::<Result<Vec<_>>>()?;

    // SQLite's lower() only folds ASCII, so payees are compared here.
    if let Some(payee) = &filter.payee {
        transactions.retain(|tx| tx.payee_matches(payee));
    }
    Ok(transactions)
}

// ── Templates ─────────────────────────────────────────────────────────────────

/// Saves a new template together with its price history.
pub async fn insert_template(pool: &DbPool, template: &RecurringTemplate) -> Result<TemplateId> {
    let mut db_tx = pool.begin().await?;

    let result = sqlx::query(
        "INSERT INTO templates (name, amount, kind, frequency, start_date, end_date, next_due_date, \
         last_processed_date, is_active, is_auto_pay, is_variable_amount, category_id, account_id, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&template.name)
    .bind(money_text(template.amount))
    .bind(template.kind.to_string())
    .bind(template.frequency.to_string())
    .bind(template.start_date.to_string())
    .bind(template.end_date.map(|d| d.to_string()))
    .bind(template.next_due_date.to_string())
    .bind(template.last_processed_date.map(|d| d.to_string()))
    .bind(template.is_active as i64)
    .bind(template.is_auto_pay as i64)
    .bind(template.is_variable_amount as i64)
    .bind(template.category_id.map(|c| c.0))
    .bind(template.account_id.map(|a| a.0))
    .bind(&template.notes)
    .execute(&mut *db_tx)
    .await?;
    let id = TemplateId(result.last_insert_rowid());

    for snapshot in &template.price_history {
        insert_price_with(&mut *db_tx, id, *snapshot).await?;
    }

    db_tx.commit().await?;
    Ok(id)
}

async fn insert_price_with<'e, E>(executor: E, template: TemplateId, snapshot: PriceSnapshot) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query("INSERT INTO price_history (template_id, date, amount) VALUES (?, ?, ?)")
        .bind(template.0)
        .bind(snapshot.date.to_string())
        .bind(money_text(snapshot.amount))
        .execute(executor)
        .await?;
    Ok(())
}

/// Appends a price snapshot to a saved template.
pub async fn record_price(pool: &DbPool, template: TemplateId, amount: Money, date: NaiveDate) -> Result<()> {
    insert_price_with(pool, template, PriceSnapshot { date, amount }).await
}

/// Changes a saved template's amount and records the price change in one
/// transaction, so later runs materialize at the new price. Returns `false`
/// when the amount is unchanged.
pub async fn update_template_amount(
    pool: &DbPool,
    id: TemplateId,
    amount: Money,
    date: NaiveDate,
) -> Result<bool> {
    let mut template = fetch_template(pool, id).await?.ok_or(StoreError::Missing(id))?;
    let previous = template.amount;
    let recorded = template.price_history.len();
    if !template.update_amount(amount, date) {
        return Ok(false);
    }

    let mut db_tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE templates SET amount = ? WHERE id = ? AND amount = ?")
        .bind(money_text(amount))
        .bind(id.0)
        .bind(money_text(previous))
        .execute(&mut *db_tx)
        .await?;
    if updated.rows_affected() == 0 {
        db_tx.rollback().await?;
        return Err(StoreError::Conflict(id));
    }

    for snapshot in &template.price_history[recorded..] {
        insert_price_with(&mut *db_tx, id, *snapshot).await?;
    }

    db_tx.commit().await?;
    Ok(true)
}

async fn hydrate(pool: &DbPool, row: TemplateRow) -> Result<RecurringTemplate> {
    let mut template = template_from_row(row)?;
    let Some(id) = template.id else {
        return Ok(template);
    };

    let prices = sqlx::query_as::<_, (String, String)>(
        "SELECT date, amount FROM price_history WHERE template_id = ? ORDER BY id",
    )
    .bind(id.0)
    .fetch_all(pool)
    .await?;
    for (date, amount) in prices {
        template.price_history.push(PriceSnapshot {
            date: parse_date(&date)?,
            amount: parse_money(&amount)?,
        });
    }

    let generated = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM transactions WHERE template_id = ? ORDER BY date, id",
    )
    .bind(id.0)
    .fetch_all(pool)
    .await?;
    template.generated = generated.into_iter().map(|(tx_id,)| TransactionId(tx_id)).collect();

    Ok(template)
}

async fn fetch_templates_where(pool: &DbPool, clause: &str, now: Option<NaiveDate>) -> Result<Vec<RecurringTemplate>> {
    let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE {clause} ORDER BY next_due_date, name");
    let mut query = sqlx::query_as::<_, TemplateRow>(&sql);
    if let Some(now) = now {
        query = query.bind(now.to_string());
    }
    let rows = query.fetch_all(pool).await?;

    let mut templates = Vec::with_capacity(rows.len());
    for row in rows {
        templates.push(hydrate(pool, row).await?);
    }
    Ok(templates)
}

pub async fn fetch_active_templates(pool: &DbPool) -> Result<Vec<RecurringTemplate>> {
    fetch_templates_where(pool, "is_active = 1", None).await
}

/// Active templates whose next due date is on or before `now`.
pub async fn fetch_due_templates(pool: &DbPool, now: NaiveDate) -> Result<Vec<RecurringTemplate>> {
    fetch_templates_where(pool, "is_active = 1 AND next_due_date <= ?", Some(now)).await
}

pub async fn fetch_template(pool: &DbPool, id: TemplateId) -> Result<Option<RecurringTemplate>> {
    let row = sqlx::query_as::<_, TemplateRow>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(hydrate(pool, row).await?)),
        None => Ok(None),
    }
}

/// Commits one scheduler mutation atomically: the template's schedule fields
/// and every materialized transaction, or nothing.
///
/// The update only applies while the stored template is still active with the
/// `next_due_date` the mutation was computed from; otherwise another run got
/// there first and the whole mutation is rejected with [`StoreError::Conflict`].
pub async fn persist(pool: &DbPool, mutation: &TemplateMutation) -> Result<Vec<TransactionId>> {
    let template = &mutation.template;
    let id = template
        .id
        .ok_or_else(|| StoreError::Unsaved(format!("template '{}'", template.name)))?;

    let mut db_tx = pool.begin().await?;

    let updated = sqlx::query(
        "UPDATE templates SET next_due_date = ?, last_processed_date = ?, is_active = ? \
         WHERE id = ? AND next_due_date = ? AND is_active = 1",
    )
    .bind(template.next_due_date.to_string())
    .bind(template.last_processed_date.map(|d| d.to_string()))
    .bind(template.is_active as i64)
    .bind(id.0)
    .bind(mutation.expected_next_due.to_string())
    .execute(&mut *db_tx)
    .await?;

    if updated.rows_affected() == 0 {
        db_tx.rollback().await?;
        return Err(StoreError::Conflict(id));
    }

    let mut ids = Vec::with_capacity(mutation.transactions.len());
    for tx in &mutation.transactions {
        let mut linked = tx.clone();
        linked.template_id = Some(id);
        ids.push(insert_transaction_with(&mut *db_tx, &linked).await?);
    }

    db_tx.commit().await?;
    Ok(ids)
}
