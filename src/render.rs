pub mod json;
pub mod terminal;

use std::io::Write;

use error_stack::Report;

use crate::batch::SymbolOutcome;
use crate::error::RenderError;

/// Presentation surface for a finished batch run.
pub trait ReportSink {
    fn render(
        &self,
        outcomes: &[SymbolOutcome],
        out: &mut dyn Write,
    ) -> Result<(), Report<RenderError>>;
}
