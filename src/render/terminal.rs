use std::io::Write;

use error_stack::{Report, ResultExt};

use crate::batch::SymbolOutcome;
use crate::error::RenderError;
use crate::render::ReportSink;
use crate::report::AnalysisReport;

/// Plain-text block per symbol, for interactive use.
pub struct TerminalSink;

impl ReportSink for TerminalSink {
    fn render(
        &self,
        outcomes: &[SymbolOutcome],
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>> {
        for (i, outcome) in outcomes.iter().enumerate() {
            if i > 0 {
                writeln!(out).change_context(RenderError::Write)?;
            }
            match &outcome.result {
                Ok(report) => write_report(out, report, outcome)
                    .change_context(RenderError::Write)
                    .attach_with(|| format!("symbol: {}", outcome.symbol))?,
                Err(e) => writeln!(out, "== {} ==\nerror: {e}", outcome.symbol)
                    .change_context(RenderError::Write)?,
            }
        }
        Ok(())
    }
}

fn write_report(
    out: &mut dyn Write,
    report: &AnalysisReport,
    outcome: &SymbolOutcome,
) -> std::io::Result<()> {
    let d = report.display();
    let s = report.snapshot();
    let c = report.classification();

    writeln!(out, "== {} ({}) ==", report.symbol(), report.as_of())?;
    writeln!(out, "close      {:.2}", d.close)?;
    match (d.rsi, c.rsi_zone) {
        (Some(rsi), Some(zone)) => writeln!(out, "RSI        {rsi:.1} ({zone})")?,
        _ => writeln!(out, "RSI        n/a (no price movement)")?,
    }
    writeln!(
        out,
        "MACD       {:.4} / signal {:.4} ({})",
        s.macd, s.signal, c.macd_cross
    )?;
    writeln!(
        out,
        "SMA        20: {:.1}  50: {}  200: {}",
        d.sma20,
        optional(d.sma50),
        optional(d.sma200)
    )?;
    writeln!(
        out,
        "Bollinger  upper {:.1} / lower {:.1}",
        d.bollinger_upper, d.bollinger_lower
    )?;
    writeln!(out, "prompt     {}", report.strategy_prompt())?;

    if let Some(text) = report.narrative() {
        writeln!(out, "narrative  {text}")?;
    } else if let Some(e) = &outcome.narrative_error {
        writeln!(out, "narrative  unavailable: {e}")?;
    }
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_owned(), |v| format!("{v:.1}"))
}
