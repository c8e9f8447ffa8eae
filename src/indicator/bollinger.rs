use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;
use crate::indicator::{Indicator, ensure_len};

/// Bands at the last observed price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerBand {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
}

pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        // Sample standard deviation needs at least two points
        if period < 2 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be >= 2".into(),
            });
        }
        if std_dev_multiplier.is_nan() || std_dev_multiplier <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "std_dev_multiplier must be > 0".into(),
            });
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerBand;

    fn name(&self) -> &str {
        "bollinger"
    }

    fn required_points(&self) -> usize {
        self.period
    }

    fn calculate(&self, closes: &[f64]) -> Result<BollingerBand, Report<IndicatorError>> {
        ensure_len(closes, self.period)?;

        let middle = Sma::new(self.period)?.calculate(closes)?;
        let window = &closes[closes.len() - self.period..];
        let variance = window.iter().map(|&p| (p - middle).powi(2)).sum::<f64>()
            / (self.period - 1) as f64;
        let width = self.std_dev_multiplier * variance.sqrt();

        Ok(BollingerBand {
            middle,
            upper: middle + width,
            lower: middle - width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_period_too_small_invalid() {
        assert!(BollingerBands::new(0, 2.0).is_err());
        assert!(BollingerBands::new(1, 2.0).is_err());
    }

    #[test]
    fn bollinger_non_positive_multiplier_invalid() {
        assert!(BollingerBands::new(20, -1.0).is_err());
        assert!(BollingerBands::new(20, 0.0).is_err());
        assert!(BollingerBands::new(20, f64::NAN).is_err());
    }

    #[test]
    fn bollinger_insufficient_data() {
        let bb = BollingerBands::new(5, 2.0).unwrap();
        assert!(bb.calculate(&[1.0; 4]).is_err());
    }

    #[test]
    fn bollinger_flat_prices_zero_width() {
        let bb = BollingerBands::new(3, 2.0).unwrap();
        let band = bb.calculate(&[10.0_f64; 5]).unwrap();
        assert_eq!(
            band,
            BollingerBand {
                middle: 10.0,
                upper: 10.0,
                lower: 10.0
            }
        );
    }

    #[test]
    fn bollinger_uses_sample_std_dev() {
        let bb = BollingerBands::new(4, 2.0).unwrap();
        // trailing window 2,4,6,8: mean 5, squared deviations sum 20, /3
        let band = bb.calculate(&[100.0, 2.0, 4.0, 6.0, 8.0]).unwrap();
        let sigma = (20.0_f64 / 3.0).sqrt();
        assert!((band.middle - 5.0).abs() < 1e-9);
        assert!((band.upper - (5.0 + 2.0 * sigma)).abs() < 1e-9);
        assert!((band.lower - (5.0 - 2.0 * sigma)).abs() < 1e-9);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let bb = BollingerBands::new(3, 2.0).unwrap();
        let band = bb.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((band.upper - band.middle - (band.middle - band.lower)).abs() < 1e-9);
    }
}
