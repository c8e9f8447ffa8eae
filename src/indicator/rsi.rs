use error_stack::Report;
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicator::{Indicator, ensure_period};

/// RSI values aligned 1:1 with the input prices.
///
/// The first `period` entries are always `None`. Later entries are `None`
/// only while both smoothed averages are zero (a perfectly flat stretch
/// with no gain or loss yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiSeries(Vec<Option<f64>>);

impl RsiSeries {
    pub fn values(&self) -> &[Option<f64>] {
        &self.0
    }

    /// RSI at the last observed price, if defined.
    pub fn last(&self) -> Option<f64> {
        self.0.last().copied().flatten()
    }
}

/// RSI (Relative Strength Index) using Wilder's smoothing method.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        ensure_period(period, "rsi period")?;
        Ok(Self { period })
    }
}

impl Indicator for Rsi {
    type Output = RsiSeries;

    fn name(&self) -> &str {
        "rsi"
    }

    fn required_points(&self) -> usize {
        self.period + 1
    }

    /// Never fails: a series shorter than `period + 1` yields all `None`.
    fn calculate(&self, closes: &[f64]) -> Result<RsiSeries, Report<IndicatorError>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < self.required_points() {
            return Ok(RsiSeries(out));
        }

        let period = self.period as f64;
        let gain = |i: usize| (closes[i] - closes[i - 1]).max(0.0);
        let loss = |i: usize| (closes[i - 1] - closes[i]).max(0.0);

        // Seed with the simple mean of the first `period` gains/losses
        let mut avg_gain = (1..=self.period).map(gain).sum::<f64>() / period;
        let mut avg_loss = (1..=self.period).map(loss).sum::<f64>() / period;
        out[self.period] = rsi_value(avg_gain, avg_loss);

        // Wilder smoothing, strictly left to right
        for i in self.period + 1..closes.len() {
            avg_gain = (avg_gain * (period - 1.0) + gain(i)) / period;
            avg_loss = (avg_loss * (period - 1.0) + loss(i)) / period;
            out[i] = rsi_value(avg_gain, avg_loss);
        }

        Ok(RsiSeries(out))
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        // RS is +inf when there are gains, 0/0 when flat
        return (avg_gain > 0.0).then_some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn calc(period: usize, closes: &[f64]) -> RsiSeries {
        Rsi::new(period).unwrap().calculate(closes).unwrap()
    }

    #[test]
    fn rsi_period_zero_invalid() {
        assert!(Rsi::new(0).is_err());
    }

    #[test]
    fn rsi_short_series_is_all_undefined() {
        for len in 0..=14 {
            let closes = vec![10.0; len];
            let series = calc(14, &closes);
            assert_eq!(series.values().len(), len);
            assert!(series.values().iter().all(Option::is_none));
        }
    }

    #[test]
    fn rsi_output_aligned_with_input() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let series = calc(14, &closes);
        assert_eq!(series.values().len(), 20);
        assert!(series.values()[..14].iter().all(Option::is_none));
        assert!(series.values()[14..].iter().all(Option::is_some));
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let series = calc(3, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(series.values()[3], Some(100.0));
        assert_eq!(series.last(), Some(100.0));
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let series = calc(3, &[4.0, 3.0, 2.0, 1.0]);
        assert!((series.last().unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_flat_prices_undefined_until_first_move() {
        let mut closes = vec![50.0; 20];
        closes.push(51.0);
        let series = calc(14, &closes);
        assert!(series.values()[..20].iter().all(Option::is_none));
        // First gain after a flat stretch: avg_loss still 0 -> 100
        assert_eq!(series.last(), Some(100.0));
    }

    #[test]
    fn rsi_loss_after_gains_stays_below_100() {
        let closes = [10.0, 11.0, 12.0, 13.0, 12.0];
        let series = calc(3, &closes);
        assert_eq!(series.values()[3], Some(100.0));
        let last = series.last().unwrap();
        assert!(last < 100.0 && last > 0.0);
    }

    #[test]
    fn rsi_wilder_recurrence_known_value() {
        // period 2; deltas: +2, -1, +1
        // seed at i=2: gain=(2+0)/2=1, loss=(0+1)/2=0.5 -> rs=2 -> 66.666..
        // i=3: gain=(1*1+1)/2=1, loss=(0.5*1+0)/2=0.25 -> rs=4 -> 80
        let series = calc(2, &[10.0, 12.0, 11.0, 12.0]);
        assert!((series.values()[2].unwrap() - 200.0 / 3.0).abs() < 1e-9);
        assert!((series.values()[3].unwrap() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn rsi_differs_from_simple_rolling_mean() {
        // A rolling mean over the last 2 deltas (+1, -3) would give rs=1/3 -> 25.
        let closes = [10.0, 14.0, 15.0, 12.0];
        let series = calc(2, &closes);
        // Wilder: seed gain=2.5 loss=0; i=3: gain=1.25, loss=1.5 -> rs=0.8333
        let expected = 100.0 - 100.0 / (1.0 + 1.25 / 1.5);
        assert!((series.last().unwrap() - expected).abs() < 1e-9);
        assert!((series.last().unwrap() - 25.0).abs() > 1.0);
    }

    #[test]
    fn rsi_random_walk_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mut price = 100.0_f64;
            let closes: Vec<f64> = (0..300)
                .map(|_| {
                    price = (price + rng.random_range(-2.0..2.0)).max(1.0);
                    price
                })
                .collect();
            let series = calc(14, &closes);
            for value in series.values().iter().flatten() {
                assert!(value.is_finite());
                assert!((0.0..=100.0).contains(value), "rsi out of range: {value}");
            }
        }
    }
}
