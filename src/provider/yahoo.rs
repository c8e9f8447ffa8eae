use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use error_stack::{Report, ResultExt, bail};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::model::PricePoint;
use crate::provider::PriceProvider;

const USER_AGENT: &str = concat!(
    "Mozilla/5.0 (compatible; etf-analyzer/",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// Daily bars from the Yahoo Finance chart API.
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: Url,
    range: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, Report<ProviderError>> {
        let base_url = Url::parse(&config.base_url)
            .change_context(ProviderError::Client)
            .attach_with(|| format!("base_url: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            bail!(ProviderError::Client);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .change_context(ProviderError::Client)?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(nonzero!(1u32));

        Ok(Self {
            client,
            base_url,
            range: config.range.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    fn chart_url(&self, symbol: &str) -> Result<Url, Report<ProviderError>> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Report::new(ProviderError::Client))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }
}

impl PriceProvider for YahooProvider {
    fn fetch_daily_closes(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<Vec<PricePoint>, Report<ProviderError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            // Wait for rate limiter before making the request
            self.rate_limiter.until_ready().await;

            let url = self.chart_url(&symbol)?;
            debug!(symbol = %symbol, url = %url, "requesting daily chart");

            let response = self
                .client
                .get(url)
                .query(&[("range", self.range.as_str()), ("interval", "1d")])
                .send()
                .await
                .change_context(ProviderError::Network {
                    symbol: symbol.clone(),
                })?;

            let status = response.status();
            let kind = match status {
                StatusCode::NOT_FOUND => Some(ProviderError::NotFound {
                    symbol: symbol.clone(),
                }),
                StatusCode::TOO_MANY_REQUESTS => Some(ProviderError::RateLimited {
                    symbol: symbol.clone(),
                }),
                s if !s.is_success() => Some(ProviderError::Network {
                    symbol: symbol.clone(),
                }),
                _ => None,
            };
            if let Some(kind) = kind {
                return Err(Report::new(kind).attach(format!("HTTP status: {status}")));
            }

            let chart: ChartResponse =
                response
                    .json()
                    .await
                    .change_context(ProviderError::ResponseParse {
                        symbol: symbol.clone(),
                    })?;

            let points = chart.into_points(&symbol)?;
            info!(
                symbol = %symbol,
                fetched = points.len(),
                range = %self.range,
                "yahoo daily closes fetched"
            );
            Ok(points)
        })
    }
}

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    /// Absent when the range holds no bars
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResponse {
    fn into_points(self, symbol: &str) -> Result<Vec<PricePoint>, Report<ProviderError>> {
        let not_found = || ProviderError::NotFound {
            symbol: symbol.to_owned(),
        };

        if let Some(err) = self.chart.error {
            let kind = if err.code == "Not Found" {
                not_found()
            } else {
                ProviderError::Network {
                    symbol: symbol.to_owned(),
                }
            };
            return Err(Report::new(kind).attach(format!("{}: {}", err.code, err.description)));
        }

        let result = self
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| Report::new(not_found()))?;

        let offset = result.meta.gmtoffset;
        let closes = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|q| q.close)
            .unwrap_or_default();

        let parse_error = || ProviderError::ResponseParse {
            symbol: symbol.to_owned(),
        };
        if result.timestamp.len() != closes.len() {
            return Err(Report::new(parse_error()).attach(format!(
                "{} timestamps but {} closes",
                result.timestamp.len(),
                closes.len()
            )));
        }

        let mut points: Vec<PricePoint> = Vec::with_capacity(closes.len());
        for (&ts, close) in result.timestamp.iter().zip(closes) {
            // Holidays and halted sessions come back as null
            let Some(close) = close else { continue };
            let date = ts
                .checked_add(offset)
                .and_then(|local| DateTime::from_timestamp(local, 0))
                .ok_or_else(|| {
                    Report::new(parse_error())
                        .attach(format!("timestamp out of range: {ts} + {offset}"))
                })?
                .date_naive();

            // The live session can repeat the last date; keep the latest close
            match points.last_mut() {
                Some(prev) if prev.date == date => prev.close = close,
                _ => points.push(PricePoint { date, close }),
            }
        }

        if points.is_empty() {
            return Err(Report::new(not_found()).attach("no closing prices in range"));
        }
        Ok(points)
    }
}
