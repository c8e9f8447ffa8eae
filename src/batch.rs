pub mod cache;

use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::{StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::batch::cache::ReportCache;
use crate::error::{AnalysisError, NarrativeError, ProviderError};
use crate::model::{PricePoint, PriceSeries};
use crate::narrative::NarrativeService;
use crate::provider::PriceProvider;
use crate::report::{AnalysisReport, IndicatorSet, ReportBuilder};

/// Result of analysing one requested symbol.
#[derive(Debug)]
pub struct SymbolOutcome {
    pub symbol: String,
    pub result: Result<AnalysisReport, Report<AnalysisError>>,
    /// Set when narrative generation was attempted for a successful report
    /// and failed. The numeric report stays valid.
    pub narrative_error: Option<Report<NarrativeError>>,
}

impl SymbolOutcome {
    pub fn summary(&self) -> OutcomeSummary<'_> {
        match &self.result {
            Ok(report) => OutcomeSummary::Analysed {
                symbol: &self.symbol,
                report,
                narrative_error: self.narrative_error.as_ref().map(|e| e.to_string()),
            },
            Err(e) => OutcomeSummary::Failed {
                symbol: &self.symbol,
                error: e.to_string(),
            },
        }
    }
}

/// Serializable view of a [`SymbolOutcome`].
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeSummary<'a> {
    #[serde(rename = "ok")]
    Analysed {
        symbol: &'a str,
        report: &'a AnalysisReport,
        #[serde(skip_serializing_if = "Option::is_none")]
        narrative_error: Option<String>,
    },
    Failed {
        symbol: &'a str,
        error: String,
    },
}

/// Runs the indicator pipeline over a list of symbols.
///
/// Failures are scoped to the symbol that produced them; the batch always
/// yields one outcome per requested symbol, in input order.
pub struct BatchRunner {
    provider: Arc<dyn PriceProvider>,
    indicators: IndicatorSet,
    builder: ReportBuilder,
    concurrency: usize,
    cache: ReportCache,
}

impl BatchRunner {
    pub fn new(
        provider: Arc<dyn PriceProvider>,
        indicators: IndicatorSet,
        builder: ReportBuilder,
        concurrency: usize,
    ) -> Self {
        Self {
            provider,
            indicators,
            builder,
            concurrency: concurrency.max(1),
            cache: ReportCache::new(),
        }
    }

    pub async fn run(&mut self, symbols: &[String]) -> Vec<SymbolOutcome> {
        let run_id = Uuid::new_v4();
        let span = info_span!("batch", %run_id);

        async {
            self.cache.invalidate();
            info!(symbols = symbols.len(), concurrency = self.concurrency, "batch run started");

            let provider = self.provider.as_ref();
            let fetched: Vec<_> = stream::iter(symbols)
                .map(|symbol| provider.fetch_daily_closes(symbol))
                .buffered(self.concurrency)
                .collect()
                .await;

            let mut outcomes = Vec::with_capacity(symbols.len());
            for (symbol, points) in symbols.iter().zip(fetched) {
                let result = self.analyze(symbol, points);
                if let Err(e) = &result {
                    warn!(symbol = %symbol, error = ?e, "symbol analysis failed");
                }
                outcomes.push(SymbolOutcome {
                    symbol: symbol.clone(),
                    result,
                    narrative_error: None,
                });
            }

            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            info!(
                analysed = outcomes.len() - failed,
                failed,
                "batch run finished"
            );
            outcomes
        }
        .instrument(span)
        .await
    }

    fn analyze(
        &mut self,
        symbol: &str,
        points: Result<Vec<PricePoint>, Report<ProviderError>>,
    ) -> Result<AnalysisReport, Report<AnalysisError>> {
        let points = points.change_context(AnalysisError::Fetch {
            symbol: symbol.to_owned(),
        })?;
        let series = PriceSeries::new(points).change_context(AnalysisError::InvalidSeries {
            symbol: symbol.to_owned(),
        })?;

        let as_of = series.last().date;
        if let Some(report) = self.cache.get(symbol, as_of) {
            debug!(symbol, %as_of, "report cache hit");
            return Ok(report.clone());
        }
        debug!(symbol, %as_of, "report cache miss");

        let snapshot = self
            .indicators
            .snapshot(&series)
            .change_context(AnalysisError::Indicator {
                symbol: symbol.to_owned(),
            })?;
        let report = self.builder.build(symbol, snapshot);

        info!(
            symbol,
            %as_of,
            close = report.display().close,
            rsi_zone = ?report.classification().rsi_zone,
            macd_cross = %report.classification().macd_cross,
            "symbol analysed"
        );
        self.cache.insert(report.clone());
        Ok(report)
    }

    /// Attach narrative text to `report`, keeping the cached copy in step.
    pub fn attach_narrative(&mut self, report: AnalysisReport, text: &str) -> AnalysisReport {
        self.cache.attach_narrative(report.symbol(), report.as_of(), text);
        report.attach_narrative(text)
    }

    /// Request a narrative for every successful report that lacks one.
    ///
    /// A failed request is recorded on the outcome and never touches the
    /// numeric report.
    pub async fn narrate(
        &mut self,
        outcomes: &mut [SymbolOutcome],
        service: &dyn NarrativeService,
        cancel: &CancellationToken,
    ) {
        for outcome in outcomes.iter_mut() {
            let Ok(report) = &outcome.result else {
                continue;
            };
            if report.narrative().is_some() {
                continue;
            }

            let cached = self
                .cache
                .get(report.symbol(), report.as_of())
                .and_then(|r| r.narrative())
                .map(str::to_owned);
            let generated = match cached {
                Some(text) => {
                    debug!(symbol = %outcome.symbol, "narrative served from cache");
                    Ok(text)
                }
                None => {
                    service
                        .generate(report.strategy_prompt(), cancel.clone())
                        .await
                }
            };

            match generated {
                Ok(text) => {
                    let updated = self.attach_narrative(report.clone(), &text);
                    outcome.result = Ok(updated);
                }
                Err(e) => {
                    warn!(symbol = %outcome.symbol, error = ?e, "narrative generation failed");
                    outcome.narrative_error = Some(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;
    use futures::future::BoxFuture;

    use super::*;
    use crate::classify::MacdCross;
    use crate::config::AnalysisConfig;
    use crate::error::IndicatorError;
    use crate::report::PromptLanguage;

    struct StubProvider {
        responses: HashMap<String, Result<Vec<PricePoint>, ProviderError>>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn new(
            responses: impl IntoIterator<Item = (&'static str, Result<Vec<PricePoint>, ProviderError>)>,
        ) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|(symbol, response)| (symbol.to_owned(), response))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PriceProvider for StubProvider {
        fn fetch_daily_closes(
            &self,
            symbol: &str,
        ) -> BoxFuture<'_, Result<Vec<PricePoint>, Report<ProviderError>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self.responses.get(symbol).cloned().unwrap_or_else(|| {
                Err(ProviderError::NotFound {
                    symbol: symbol.to_owned(),
                })
            });
            Box::pin(async move { response.map_err(Report::new) })
        }
    }

    struct StubNarrator {
        reply: Result<String, NarrativeError>,
        calls: AtomicUsize,
    }

    impl StubNarrator {
        fn new(reply: Result<String, NarrativeError>) -> Self {
            Self {
                reply,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl NarrativeService for StubNarrator {
        fn generate(
            &self,
            _prompt: &str,
            _cancel: CancellationToken,
        ) -> BoxFuture<'_, Result<String, Report<NarrativeError>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let reply = self.reply.clone().map_err(Report::new);
            Box::pin(async move { reply })
        }
    }

    fn rising(len: usize) -> Vec<PricePoint> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..len)
            .map(|i| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close: 100.0 + i as f64,
            })
            .collect()
    }

    fn runner(provider: StubProvider) -> (BatchRunner, Arc<StubProvider>) {
        let provider = Arc::new(provider);
        let runner = BatchRunner::new(
            Arc::clone(&provider) as Arc<dyn PriceProvider>,
            IndicatorSet::from_config(&AnalysisConfig::default()).unwrap(),
            ReportBuilder::new(PromptLanguage::En),
            2,
        );
        (runner, provider)
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn failed_fetch_is_isolated_and_order_preserved() {
        let (mut runner, _) = runner(StubProvider::new([
            ("AAA", Ok(rising(250))),
            (
                "BAD",
                Err(ProviderError::Network {
                    symbol: "BAD".into(),
                }),
            ),
            ("CCC", Ok(rising(120))),
        ]));

        let outcomes = runner.run(&symbols(&["AAA", "BAD", "CCC"])).await;

        let order: Vec<_> = outcomes.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(order, ["AAA", "BAD", "CCC"]);

        let aaa = outcomes[0].result.as_ref().unwrap();
        assert_eq!(aaa.symbol(), "AAA");
        assert_eq!(aaa.classification().macd_cross, MacdCross::Golden);

        let bad = outcomes[1].result.as_ref().unwrap_err();
        assert_eq!(
            *bad.current_context(),
            AnalysisError::Fetch {
                symbol: "BAD".into()
            }
        );
        assert!(bad.contains::<ProviderError>());

        let ccc = outcomes[2].result.as_ref().unwrap();
        assert_eq!(ccc.symbol(), "CCC");
        assert!(ccc.snapshot().sma200.is_none());
    }

    #[tokio::test]
    async fn duplicate_symbols_yield_one_outcome_each() {
        let (mut runner, provider) = runner(StubProvider::new([("AAA", Ok(rising(60)))]));

        let outcomes = runner.run(&symbols(&["AAA", "AAA"])).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(
            outcomes[0].result.as_ref().unwrap(),
            outcomes[1].result.as_ref().unwrap()
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.cache.len(), 1);
    }

    #[tokio::test]
    async fn invalid_series_is_tagged() {
        let mut points = rising(60);
        points[10].close = 0.0;
        let (mut runner, _) = runner(StubProvider::new([("ZERO", Ok(points))]));

        let outcomes = runner.run(&symbols(&["ZERO"])).await;

        let err = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(
            *err.current_context(),
            AnalysisError::InvalidSeries {
                symbol: "ZERO".into()
            }
        );
    }

    #[tokio::test]
    async fn short_history_is_insufficient_data() {
        let (mut runner, _) = runner(StubProvider::new([("NEW", Ok(rising(10)))]));

        let outcomes = runner.run(&symbols(&["NEW"])).await;

        let err = outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(
            *err.current_context(),
            AnalysisError::Indicator {
                symbol: "NEW".into()
            }
        );
        assert_eq!(
            err.downcast_ref::<IndicatorError>(),
            Some(&IndicatorError::InsufficientData {
                required: 20,
                available: 10
            })
        );
    }

    #[tokio::test]
    async fn new_run_invalidates_cache() {
        let (mut runner, _) = runner(StubProvider::new([
            ("AAA", Ok(rising(60))),
            ("CCC", Ok(rising(60))),
        ]));

        runner.run(&symbols(&["AAA", "CCC"])).await;
        assert_eq!(runner.cache.len(), 2);

        runner.run(&symbols(&["CCC"])).await;
        assert_eq!(runner.cache.len(), 1);
        assert!(runner.cache.get("AAA", rising(60)[59].date).is_none());
    }

    #[tokio::test]
    async fn narrate_attaches_text_to_successful_reports() {
        let (mut runner, _) = runner(StubProvider::new([("AAA", Ok(rising(60)))]));
        let mut outcomes = runner.run(&symbols(&["AAA", "BAD"])).await;
        let narrator = StubNarrator::new(Ok("Stay long.".into()));

        runner
            .narrate(&mut outcomes, &narrator, &CancellationToken::new())
            .await;

        let aaa = outcomes[0].result.as_ref().unwrap();
        assert_eq!(aaa.narrative(), Some("Stay long."));
        assert!(outcomes[0].narrative_error.is_none());
        assert!(outcomes[1].narrative_error.is_none());
        assert_eq!(narrator.calls.load(Ordering::SeqCst), 1);

        let cached = runner.cache.get("AAA", aaa.as_of()).unwrap();
        assert_eq!(cached.narrative(), Some("Stay long."));
    }

    #[tokio::test]
    async fn narrative_failure_keeps_numeric_report() {
        let (mut runner, _) = runner(StubProvider::new([("AAA", Ok(rising(60)))]));
        let mut outcomes = runner.run(&symbols(&["AAA"])).await;
        let before = outcomes[0].result.as_ref().unwrap().clone();
        let narrator = StubNarrator::new(Err(NarrativeError::RateLimited));

        runner
            .narrate(&mut outcomes, &narrator, &CancellationToken::new())
            .await;

        assert_eq!(outcomes[0].result.as_ref().unwrap(), &before);
        let err = outcomes[0].narrative_error.as_ref().unwrap();
        assert_eq!(*err.current_context(), NarrativeError::RateLimited);
    }

    #[tokio::test]
    async fn duplicate_symbol_reuses_cached_narrative() {
        let (mut runner, _) = runner(StubProvider::new([("AAA", Ok(rising(60)))]));
        let mut outcomes = runner.run(&symbols(&["AAA", "AAA"])).await;
        let narrator = StubNarrator::new(Ok("Stay long.".into()));

        runner
            .narrate(&mut outcomes, &narrator, &CancellationToken::new())
            .await;

        assert_eq!(narrator.calls.load(Ordering::SeqCst), 1);
        for outcome in &outcomes {
            assert_eq!(
                outcome.result.as_ref().unwrap().narrative(),
                Some("Stay long.")
            );
        }
    }

    #[tokio::test]
    async fn summary_serializes_status_tag() {
        let (mut runner, _) = runner(StubProvider::new([("AAA", Ok(rising(60)))]));
        let outcomes = runner.run(&symbols(&["AAA", "BAD"])).await;

        let json = serde_json::to_value(
            outcomes.iter().map(SymbolOutcome::summary).collect::<Vec<_>>(),
        )
        .unwrap();

        assert_eq!(json[0]["status"], "ok");
        assert_eq!(json[0]["report"]["symbol"], "AAA");
        assert_eq!(json[1]["status"], "failed");
        assert_eq!(json[1]["error"], "failed to fetch prices for BAD");
    }
}
