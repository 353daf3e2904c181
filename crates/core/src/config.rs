//! Tunable thresholds for every engine component.
//!
//! All sections default to the stock heuristics, so a config file only needs
//! the keys it overrides:
//!
//! ```toml
//! [forecast]
//! alpha = 0.5
//!
//! [cancellation]
//! suggestion_threshold = 60
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::variability::DEFAULT_VARIABILITY_THRESHOLD;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub detection: DetectionConfig,
    pub scheduler: SchedulerConfig,
    pub forecast: ForecastConfig,
    pub cancellation: CancellationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub min_matches: usize,
    pub variability_threshold: Decimal,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_matches: 2,
            variability_threshold: DEFAULT_VARIABILITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on occurrences materialized for one template in one run.
    pub max_catch_up: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_catch_up: 120 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// EWMA decay; the i-th oldest of N months weighs `alpha^(N-1-i)`.
    pub alpha: Decimal,
    pub lookback_months: u32,
    /// Share of the blend given to known recurring amounts.
    pub recurring_weight: Decimal,
    pub high_confidence_months: usize,
    pub medium_confidence_months: usize,
    pub trend_threshold_percent: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            alpha: Decimal::new(4, 1),
            lookback_months: 6,
            recurring_weight: Decimal::new(3, 1),
            high_confidence_months: 6,
            medium_confidence_months: 3,
            trend_threshold_percent: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancellationConfig {
    /// Suggestions are emitted only below this score.
    pub suggestion_threshold: u32,
    pub high_cost_share: Decimal,
    pub elevated_cost_share: Decimal,
    pub high_cost_penalty: u32,
    pub elevated_cost_penalty: u32,
    pub price_increase_penalty: u32,
    pub unused_months: u32,
    pub unused_penalty: u32,
    pub variable_penalty: u32,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            suggestion_threshold: 70,
            high_cost_share: Decimal::new(25, 2),
            elevated_cost_share: Decimal::new(15, 2),
            high_cost_penalty: 20,
            elevated_cost_penalty: 10,
            price_increase_penalty: 15,
            unused_months: 3,
            unused_penalty: 25,
            variable_penalty: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(toml_content)
            .map_err(|e| EngineError::Config(format!("Failed to parse TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        if f.alpha <= Decimal::ZERO || f.alpha > Decimal::ONE {
            return Err(EngineError::Config(format!("forecast.alpha must be in (0, 1], got {}", f.alpha)));
        }
        if f.recurring_weight < Decimal::ZERO || f.recurring_weight > Decimal::ONE {
            return Err(EngineError::Config(format!(
                "forecast.recurring_weight must be in [0, 1], got {}",
                f.recurring_weight
            )));
        }
        if f.medium_confidence_months > f.high_confidence_months {
            return Err(EngineError::Config(
                "forecast.medium_confidence_months exceeds high_confidence_months".to_string(),
            ));
        }
        if f.lookback_months == 0 {
            return Err(EngineError::Config("forecast.lookback_months must be at least 1".to_string()));
        }

        if self.scheduler.max_catch_up == 0 {
            return Err(EngineError::Config("scheduler.max_catch_up must be at least 1".to_string()));
        }

        if self.detection.min_matches < 2 {
            return Err(EngineError::Config("detection.min_matches must be at least 2".to_string()));
        }
        if self.detection.variability_threshold < Decimal::ZERO {
            return Err(EngineError::Config("detection.variability_threshold is negative".to_string()));
        }

        let c = &self.cancellation;
        if c.suggestion_threshold > 100 {
            return Err(EngineError::Config("cancellation.suggestion_threshold exceeds 100".to_string()));
        }
        if c.elevated_cost_share > c.high_cost_share {
            return Err(EngineError::Config(
                "cancellation.elevated_cost_share exceeds high_cost_share".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(EngineConfig::from_toml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = EngineConfig::from_toml(
            r#"
            [forecast]
            alpha = 0.5

            [cancellation]
            suggestion_threshold = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.forecast.alpha, Decimal::new(5, 1));
        assert_eq!(config.forecast.lookback_months, 6);
        assert_eq!(config.cancellation.suggestion_threshold, 60);
        assert_eq!(config.cancellation.unused_penalty, 25);
        assert_eq!(config.detection, DetectionConfig::default());
    }

    #[test]
    fn rejects_zero_catch_up() {
        let err = EngineConfig::from_toml("[scheduler]\nmax_catch_up = 0\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(msg) if msg.contains("max_catch_up")));
    }

    #[test]
    fn rejects_out_of_range_alpha() {
        let err = EngineConfig::from_toml("[forecast]\nalpha = 1.5\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_inverted_confidence_tiers() {
        let err = EngineConfig::from_toml(
            "[forecast]\nhigh_confidence_months = 2\nmedium_confidence_months = 4\n",
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml("[forecast\nalpha = "),
            Err(EngineError::Config(_))
        ));
    }
}
