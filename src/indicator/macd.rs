use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicator::ma::{Ema, EmaSeed};
use crate::indicator::{Indicator, ensure_len, ensure_period};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
}

impl MacdPoint {
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }
}

/// MACD/signal pairs for the tail of a price series.
///
/// `offset` is the price index of the first point. It is 0 with
/// `EmaSeed::FirstValue`, so the series is aligned 1:1 with the prices.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    offset: usize,
    points: Vec<MacdPoint>,
}

impl MacdSeries {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn points(&self) -> &[MacdPoint] {
        &self.points
    }

    pub fn last(&self) -> Option<MacdPoint> {
        self.points.last().copied()
    }
}

pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    seed: EmaSeed,
}

impl Macd {
    pub fn new(
        fast_period: usize,
        slow_period: usize,
        signal_period: usize,
    ) -> Result<Self, Report<IndicatorError>> {
        ensure_period(fast_period, "macd fast period")?;
        ensure_period(slow_period, "macd slow period")?;
        ensure_period(signal_period, "macd signal period")?;
        if fast_period >= slow_period {
            bail!(IndicatorError::InvalidParameter {
                name: "fast_period must be < slow_period".into(),
            });
        }
        Ok(Self {
            fast_period,
            slow_period,
            signal_period,
            seed: EmaSeed::FirstValue,
        })
    }

    /// Use a different EMA seeding convention for all three averages.
    pub fn with_seed(mut self, seed: EmaSeed) -> Self {
        self.seed = seed;
        self
    }

    fn ema(&self, period: usize) -> Result<Ema, Report<IndicatorError>> {
        Ok(Ema::new(period)?.with_seed(self.seed))
    }
}

impl Indicator for Macd {
    type Output = MacdSeries;

    fn name(&self) -> &str {
        "macd"
    }

    fn required_points(&self) -> usize {
        match self.seed {
            EmaSeed::FirstValue => 1,
            EmaSeed::SimpleMean => self.slow_period + self.signal_period - 1,
        }
    }

    fn calculate(&self, closes: &[f64]) -> Result<MacdSeries, Report<IndicatorError>> {
        ensure_len(closes, self.required_points())?;

        let fast_ema = self.ema(self.fast_period)?.calculate(closes)?;
        let slow_ema = self.ema(self.slow_period)?.calculate(closes)?;

        // A mean-seeded slow EMA starts (slow - fast) points later
        let offset = fast_ema.len() - slow_ema.len();
        let macd_line: Vec<f64> = fast_ema[offset..]
            .iter()
            .zip(&slow_ema)
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = self.ema(self.signal_period)?.calculate(&macd_line)?;
        let signal_offset = macd_line.len() - signal_line.len();

        let points: Vec<MacdPoint> = macd_line[signal_offset..]
            .iter()
            .zip(signal_line)
            .map(|(&macd, signal)| MacdPoint { macd, signal })
            .collect();

        Ok(MacdSeries {
            offset: closes.len() - points.len(),
            points,
        })
    }
}
