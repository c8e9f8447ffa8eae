use std::fmt;

use serde::{Deserialize, Serialize};

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_MIDLINE: f64 = 50.0;
pub const RSI_OVERSOLD: f64 = 30.0;

/// Qualitative RSI band. Each band includes its lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiZone {
    Overbought,
    NeutralBullish,
    NeutralBearish,
    Oversold,
}

impl fmt::Display for RsiZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overbought => write!(f, "overbought"),
            Self::NeutralBullish => write!(f, "neutral (bullish)"),
            Self::NeutralBearish => write!(f, "neutral (bearish)"),
            Self::Oversold => write!(f, "oversold"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdCross {
    Golden,
    Dead,
}

impl MacdCross {
    pub fn label_ko(self) -> &'static str {
        match self {
            Self::Golden => "골든크로스",
            Self::Dead => "데드크로스",
        }
    }
}

impl fmt::Display for MacdCross {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Golden => write!(f, "golden cross"),
            Self::Dead => write!(f, "dead cross"),
        }
    }
}

/// Labels derived from an indicator snapshot.
///
/// `rsi_zone` is `None` when RSI is undefined (a flat price history).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub rsi_zone: Option<RsiZone>,
    pub macd_cross: MacdCross,
}

pub fn classify_rsi(value: f64) -> RsiZone {
    if value >= RSI_OVERBOUGHT {
        RsiZone::Overbought
    } else if value >= RSI_MIDLINE {
        RsiZone::NeutralBullish
    } else if value >= RSI_OVERSOLD {
        RsiZone::NeutralBearish
    } else {
        RsiZone::Oversold
    }
}

/// `Golden` only when MACD is strictly above its signal line.
pub fn classify_macd(macd: f64, signal: f64) -> MacdCross {
    if macd > signal {
        MacdCross::Golden
    } else {
        MacdCross::Dead
    }
}
