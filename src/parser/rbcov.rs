use std::path::Path;

use super::{split_report_line, CoverageParser, ParsedReport, ReportLine};
use crate::error::{Error, Result};

/// Ruby line coverage in gcov-like layout. There is no header: `foo.rbcov`
/// annotates `foo.rb` next to it, and every annotated line is indented.
pub struct RbcovParser;

impl CoverageParser for RbcovParser {
    fn extension(&self) -> &'static str {
        "rbcov"
    }

    fn parse(&self, report: &Path, text: &str) -> Result<Option<ParsedReport>> {
        let stem = report
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| Error::Parse {
                path: report.to_path_buf(),
                message: "report name is not valid UTF-8".to_string(),
            })?;
        let lines = text
            .lines()
            .filter_map(|line| split_report_line(line, true))
            .map(|(count, lineno, text)| ReportLine { lineno, count, text: text.to_string() })
            .collect();
        Ok(Some(ParsedReport { source: format!("{}.rb", stem), lines }))
    }
}
