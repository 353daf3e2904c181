use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::money::Money;

/// Relative spread above which an obligation counts as variable (5%).
pub const DEFAULT_VARIABILITY_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmountStats {
    pub min: Money,
    pub max: Money,
    /// Simple arithmetic mean, rounded to cents.
    pub mean: Money,
    pub is_variable: bool,
}

/// Summarises observed amounts and decides fixed vs variable.
///
/// With a positive minimum the amounts are variable when `(max - min) / min`
/// strictly exceeds `threshold`; otherwise any difference at all is variable.
pub fn analyze_amounts(amounts: &[Money], threshold: Decimal) -> Result<AmountStats> {
    let (first, rest) = amounts
        .split_first()
        .ok_or_else(|| EngineError::Input("cannot analyse an empty amount history".to_string()))?;

    let (min, max) = rest
        .iter()
        .fold((*first, *first), |(lo, hi), &a| (lo.min(a), hi.max(a)));
    let total: Money = amounts.iter().sum();
    let mean = Money::from_decimal(total.as_decimal() / Decimal::from(amounts.len()));

    let is_variable = if min.is_positive() {
        (max - min).ratio(min).is_some_and(|spread| spread > threshold)
    } else {
        max != min
    };

    Ok(AmountStats {
        min,
        max,
        mean,
        is_variable,
    })
}
