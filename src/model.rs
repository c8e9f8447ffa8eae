use chrono::NaiveDate;
use error_stack::{Report, bail};
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// One daily close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closing prices for a single symbol, oldest first.
///
/// Construction guarantees the series is non-empty, every close is finite
/// and positive, and dates are strictly increasing. Indicators only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, Report<SeriesError>> {
        if points.is_empty() {
            bail!(SeriesError::Empty);
        }
        for (index, point) in points.iter().enumerate() {
            if !point.close.is_finite() || point.close <= 0.0 {
                return Err(Report::new(SeriesError::NonPositiveClose { index })
                    .attach(format!("close: {}", point.close)));
            }
            if index > 0 && points[index - 1].date >= point.date {
                return Err(Report::new(SeriesError::NonMonotonicDate { index })
                    .attach(format!("{} -> {}", points[index - 1].date, point.date)));
            }
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Closing prices in chronological order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn last(&self) -> PricePoint {
        // Non-empty by construction.
        self.points[self.points.len() - 1]
    }
}

/// Split a comma-separated ticker list into normalized symbols.
///
/// Entries are trimmed and uppercased, empty entries dropped. Order and
/// duplicates are kept.
pub fn parse_symbols(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_uppercase)
        .collect()
}
