pub mod cancel;
pub mod category;
pub mod config;
pub mod detect;
pub mod error;
pub mod forecast;
pub mod frequency;
pub mod money;
pub mod period;
pub mod price;
pub mod scheduler;
pub mod tags;
pub mod template;
pub mod transaction;
pub mod variability;

pub use cancel::{CancellationScorer, CancellationSuggestion};
pub use category::{AccountId, BudgetCategory, CategoryId};
pub use config::{CancellationConfig, DetectionConfig, EngineConfig, ForecastConfig, SchedulerConfig};
pub use detect::{DetectionResult, PatternDetector};
pub use error::{EngineError, Result};
pub use forecast::{ewma, CategoryForecast, ConfidenceTier, ForecastEngine, ForecastSummary, Trend};
pub use frequency::{infer_frequency, Frequency};
pub use money::Money;
pub use period::{DateRange, MonthKey};
pub use scheduler::{ObligationScheduler, ScheduleRun, TemplateMutation, UpcomingObligation};
pub use tags::{format_tags, BracketTagExtractor, TagExtractor};
pub use template::{ObligationState, PriceSnapshot, RecurringTemplate, TemplateId};
pub use transaction::{Transaction, TransactionId, TransactionKind};
pub use variability::{analyze_amounts, AmountStats};
