use error_stack::Report;

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_len, ensure_period};

/// Simple Moving Average over the trailing window ending at the last price.
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period, "sma period")?;
        Ok(Self { period })
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn name(&self) -> &str {
        "sma"
    }

    fn required_points(&self) -> usize {
        self.period
    }

    fn calculate(&self, closes: &[f64]) -> Result<f64, Report<IndicatorError>> {
        ensure_len(closes, self.period)?;
        let window = &closes[closes.len() - self.period..];
        Ok(window.iter().sum::<f64>() / self.period as f64)
    }
}

/// How the first EMA value is chosen.
///
/// Charting tools disagree here. `FirstValue` (pandas `adjust=False`) starts
/// at the first observation and yields a value for every input. `SimpleMean`
/// starts at the mean of the first `period` prices and yields
/// `len - period + 1` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmaSeed {
    #[default]
    FirstValue,
    SimpleMean,
}

/// Exponential Moving Average with smoothing factor `2 / (period + 1)`.
pub struct Ema {
    period: usize,
    seed: EmaSeed,
}

impl Ema {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period, "ema period")?;
        Ok(Self {
            period,
            seed: EmaSeed::default(),
        })
    }

    pub fn with_seed(mut self, seed: EmaSeed) -> Self {
        self.seed = seed;
        self
    }
}

impl Indicator for Ema {
    type Output = Vec<f64>;

    fn name(&self) -> &str {
        "ema"
    }

    fn required_points(&self) -> usize {
        match self.seed {
            EmaSeed::FirstValue => 1,
            EmaSeed::SimpleMean => self.period,
        }
    }

    fn calculate(&self, closes: &[f64]) -> Result<Vec<f64>, Report<IndicatorError>> {
        ensure_len(closes, self.required_points())?;

        let k = 2.0 / (self.period as f64 + 1.0);
        let (mut ema, rest) = match self.seed {
            EmaSeed::FirstValue => (closes[0], &closes[1..]),
            EmaSeed::SimpleMean => (
                closes[..self.period].iter().sum::<f64>() / self.period as f64,
                &closes[self.period..],
            ),
        };

        let mut results = Vec::with_capacity(rest.len() + 1);
        results.push(ema);
        for &price in rest {
            ema = price * k + ema * (1.0 - k);
            results.push(ema);
        }

        Ok(results)
    }
}
