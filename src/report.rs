use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};

use crate::classify::{Classification, classify_macd, classify_rsi};
use crate::config::AnalysisConfig;
use crate::error::IndicatorError;
use crate::indicator::bollinger::{BollingerBand, BollingerBands};
use crate::indicator::ma::Sma;
use crate::indicator::macd::Macd;
use crate::indicator::rsi::Rsi;
use crate::indicator::{Indicator, ensure_len};
use crate::model::PriceSeries;

/// Indicators computed for every symbol, built once per run.
pub struct IndicatorSet {
    rsi: Rsi,
    macd: Macd,
    bollinger: BollingerBands,
    sma20: Sma,
    sma50: Sma,
    sma200: Sma,
}

impl IndicatorSet {
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, Report<IndicatorError>> {
        Ok(Self {
            rsi: Rsi::new(config.rsi_period)?,
            macd: Macd::new(config.macd_fast, config.macd_slow, config.macd_signal)?
                .with_seed(config.macd_seed.into()),
            bollinger: BollingerBands::new(config.bollinger_window, config.bollinger_k)?,
            sma20: Sma::new(20)?,
            sma50: Sma::new(50)?,
            sma200: Sma::new(200)?,
        })
    }

    /// Shortest series for which every required indicator is defined.
    pub fn min_points(&self) -> usize {
        [
            self.rsi.required_points(),
            self.macd.required_points(),
            self.bollinger.required_points(),
            self.sma20.required_points(),
        ]
        .into_iter()
        .max()
        .unwrap_or(1)
    }

    /// Compute the latest value of every indicator.
    ///
    /// RSI, MACD, SMA20 and the Bollinger band are required. SMA50 and SMA200
    /// are left empty when the series is too short for them.
    pub fn snapshot(
        &self,
        series: &PriceSeries,
    ) -> Result<IndicatorSnapshot, Report<IndicatorError>> {
        let closes = series.closes();
        ensure_len(&closes, self.min_points())?;

        let rsi = run(&self.rsi, &closes)?.last();
        let macd = run(&self.macd, &closes)?
            .last()
            .ok_or_else(|| {
                Report::new(IndicatorError::InsufficientData {
                    required: self.macd.required_points(),
                    available: closes.len(),
                })
            })?;
        let last = series.last();

        Ok(IndicatorSnapshot {
            as_of: last.date,
            close: last.close,
            rsi,
            macd: macd.macd,
            signal: macd.signal,
            sma20: run(&self.sma20, &closes)?,
            sma50: optional(&self.sma50, &closes)?,
            sma200: optional(&self.sma200, &closes)?,
            bollinger: run(&self.bollinger, &closes)?,
        })
    }
}

fn run<I: Indicator>(indicator: &I, closes: &[f64]) -> Result<I::Output, Report<IndicatorError>> {
    indicator
        .calculate(closes)
        .attach_with(|| format!("indicator: {}", indicator.name()))
}

fn optional<I: Indicator>(
    indicator: &I,
    closes: &[f64],
) -> Result<Option<I::Output>, Report<IndicatorError>> {
    if closes.len() < indicator.required_points() {
        return Ok(None);
    }
    run(indicator, closes).map(Some)
}

/// Most recent indicator values for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub as_of: NaiveDate,
    pub close: f64,
    /// `None` when the price never moved inside the RSI history.
    pub rsi: Option<f64>,
    pub macd: f64,
    pub signal: f64,
    pub sma20: f64,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub bollinger: BollingerBand,
}

impl IndicatorSnapshot {
    pub fn classify(&self) -> Classification {
        Classification {
            rsi_zone: self.rsi.map(classify_rsi),
            macd_cross: classify_macd(self.macd, self.signal),
        }
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Snapshot values at display precision: price 2 dp, everything else 1 dp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayValues {
    pub close: f64,
    pub rsi: Option<f64>,
    pub sma20: f64,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub bollinger_upper: f64,
    pub bollinger_lower: f64,
}

impl DisplayValues {
    fn from_snapshot(s: &IndicatorSnapshot) -> Self {
        Self {
            close: round_to(s.close, 2),
            rsi: s.rsi.map(|v| round_to(v, 1)),
            sma20: round_to(s.sma20, 1),
            sma50: s.sma50.map(|v| round_to(v, 1)),
            sma200: s.sma200.map(|v| round_to(v, 1)),
            bollinger_upper: round_to(s.bollinger.upper, 1),
            bollinger_lower: round_to(s.bollinger.lower, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLanguage {
    #[default]
    En,
    Ko,
}

/// Per-symbol analysis result.
///
/// Read-only once built, except for a single narrative attachment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    symbol: String,
    snapshot: IndicatorSnapshot,
    classification: Classification,
    display: DisplayValues,
    strategy_prompt: String,
    narrative: Option<String>,
}

impl AnalysisReport {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn snapshot(&self) -> &IndicatorSnapshot {
        &self.snapshot
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    pub fn display(&self) -> &DisplayValues {
        &self.display
    }

    pub fn strategy_prompt(&self) -> &str {
        &self.strategy_prompt
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn as_of(&self) -> NaiveDate {
        self.snapshot.as_of
    }

    pub fn attach_narrative(self, text: impl Into<String>) -> Self {
        Self {
            narrative: Some(text.into()),
            ..self
        }
    }
}

pub struct ReportBuilder {
    language: PromptLanguage,
}

impl ReportBuilder {
    pub fn new(language: PromptLanguage) -> Self {
        Self { language }
    }

    pub fn build(&self, symbol: &str, snapshot: IndicatorSnapshot) -> AnalysisReport {
        let classification = snapshot.classify();
        let display = DisplayValues::from_snapshot(&snapshot);
        let strategy_prompt = self.prompt(symbol, &display, &classification);
        AnalysisReport {
            symbol: symbol.to_owned(),
            snapshot,
            classification,
            display,
            strategy_prompt,
            narrative: None,
        }
    }

    fn prompt(&self, symbol: &str, display: &DisplayValues, c: &Classification) -> String {
        match self.language {
            PromptLanguage::En => {
                let rsi = display
                    .rsi
                    .map_or_else(|| "undefined".to_owned(), |v| format!("{v:.1}"));
                format!(
                    "{symbol} has an RSI of {rsi} and its MACD shows a {}. \
                     Taking the SMAs and Bollinger Bands into account as well, \
                     suggest a strategy for how to respond.",
                    c.macd_cross
                )
            }
            PromptLanguage::Ko => {
                let rsi = display
                    .rsi
                    .map_or_else(|| "산출 불가".to_owned(), |v| format!("{v:.1}"));
                format!(
                    "{symbol}의 RSI는 {rsi}이고 MACD는 {}야. \
                     SMA와 볼린저밴드도 함께 고려해서 대응 전략을 알려줘.",
                    c.macd_cross.label_ko()
                )
            }
        }
    }
}
