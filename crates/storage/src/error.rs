use recur_core::{EngineError, TemplateId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(String),
    #[error("Template {0} was changed by another run")]
    Conflict(TemplateId),
    #[error("Template {0} not found")]
    Missing(TemplateId),
    #[error("Record has not been saved: {0}")]
    Unsaved(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
