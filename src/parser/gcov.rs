use std::path::Path;

use super::{no_source_error, split_report_line, CoverageParser, ParsedReport, ReportLine};
use crate::error::Result;

/// `gcov` text output. Line 0 carries the header; its `Source:` entry names
/// the annotated file.
pub struct GcovParser;

impl CoverageParser for GcovParser {
    fn extension(&self) -> &'static str {
        "gcov"
    }

    fn parse(&self, report: &Path, text: &str) -> Result<Option<ParsedReport>> {
        let mut source = None;
        let mut lines = Vec::new();
        for line in text.lines() {
            let (count, lineno, text) = match split_report_line(line, false) {
                Some(parts) => parts,
                None => continue,
            };
            if lineno == 0 {
                if let Some(path) = text.strip_prefix("Source:") {
                    source = Some(path.to_string());
                }
                continue;
            }
            if source.is_none() {
                return Err(no_source_error(report));
            }
            lines.push(ReportLine { lineno, count, text: text.to_string() });
        }
        Ok(source.map(|source| ParsedReport { source, lines }))
    }
}
