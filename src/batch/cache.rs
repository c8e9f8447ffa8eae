use std::collections::HashMap;

use chrono::NaiveDate;

use crate::report::AnalysisReport;

/// Reports computed during the current batch run, keyed by `(symbol, as_of)`.
#[derive(Debug, Default)]
pub struct ReportCache {
    entries: HashMap<(String, NaiveDate), AnalysisReport>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str, as_of: NaiveDate) -> Option<&AnalysisReport> {
        self.entries.get(&(symbol.to_owned(), as_of))
    }

    pub fn insert(&mut self, report: AnalysisReport) {
        let key = (report.symbol().to_owned(), report.as_of());
        self.entries.insert(key, report);
    }

    /// Replace the cached report with one carrying `text`. Returns `false`
    /// when nothing is cached under the key.
    pub fn attach_narrative(&mut self, symbol: &str, as_of: NaiveDate, text: &str) -> bool {
        let key = (symbol.to_owned(), as_of);
        match self.entries.remove(&key) {
            Some(report) => {
                self.entries.insert(key, report.attach_narrative(text));
                true
            }
            None => false,
        }
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
