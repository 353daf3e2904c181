pub mod batch;
pub mod db;
pub mod error;

pub use batch::{promote, run_cancellation_scoring, run_detection, run_due, run_forecast, RunReport};
pub use db::{
    create_db, fetch_active_budget_categories, fetch_active_templates, fetch_due_templates,
    fetch_template, fetch_transactions, insert_category, insert_template, insert_transaction,
    persist, record_price, update_template_amount, DbPool, TransactionFilter,
};
pub use error::{Result, StoreError};
