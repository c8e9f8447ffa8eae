pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;

use error_stack::{Report, bail};

use crate::error::IndicatorError;

/// A technical analysis indicator computed from closing prices.
///
/// Prices must be in ascending chronological order (oldest first).
/// Implementations are pure: no I/O, no shared state.
pub trait Indicator {
    type Output;

    /// Short name used in logs and error attachments (e.g. "rsi", "sma").
    fn name(&self) -> &str;

    /// Minimum number of prices required to produce a defined final value.
    fn required_points(&self) -> usize;

    fn calculate(&self, closes: &[f64]) -> Result<Self::Output, Report<IndicatorError>>;
}

/// Fail with `InsufficientData` when fewer than `required` prices are available.
pub fn ensure_len(closes: &[f64], required: usize) -> Result<(), Report<IndicatorError>> {
    if closes.len() < required {
        bail!(IndicatorError::InsufficientData {
            required,
            available: closes.len(),
        });
    }
    Ok(())
}

pub(crate) fn ensure_period(period: usize, name: &str) -> Result<(), Report<IndicatorError>> {
    if period == 0 {
        bail!(IndicatorError::InvalidParameter {
            name: format!("{name} must be > 0"),
        });
    }
    Ok(())
}
