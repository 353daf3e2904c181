use chrono::NaiveDate;
use thiserror::Error;

use crate::frequency::Frequency;
use crate::template::TemplateId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Cannot advance {frequency} schedule of '{name}' from {from}")]
    CalendarArithmetic {
        template: Option<TemplateId>,
        name: String,
        frequency: Frequency,
        from: NaiveDate,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
