use std::io::Write;

use error_stack::{Report, ResultExt};

use crate::batch::SymbolOutcome;
use crate::error::RenderError;
use crate::render::ReportSink;

/// One pretty-printed JSON array per run.
pub struct JsonSink;

impl ReportSink for JsonSink {
    fn render(
        &self,
        outcomes: &[SymbolOutcome],
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>> {
        let summaries: Vec<_> = outcomes.iter().map(SymbolOutcome::summary).collect();
        serde_json::to_writer_pretty(&mut *out, &summaries)
            .change_context(RenderError::Serialize)?;
        writeln!(out).change_context(RenderError::Write)
    }
}
