//! Coverage report parsers and the report-directory walker that feeds
//! registration.

mod gcov;
mod rbcov;

pub use gcov::GcovParser;
pub use rbcov::RbcovParser;

use globset::GlobSet;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::analysis::CapturedFile;
use crate::error::{Error, Result};
use crate::types::{CoverageVector, HitCount, ProgressEstimate};

pub const GATHER_STAGE: &str = "gather source code";

/// One annotated source line of a report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportLine {
    /// 1-based.
    pub lineno: usize,
    pub count: Option<HitCount>,
    pub text: String,
}

/// Content of one report file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedReport {
    /// Source path as written by the tool, relative to the report's directory.
    pub source: String,
    pub lines: Vec<ReportLine>,
}

/// A coverage tool output format.
pub trait CoverageParser: Send + Sync {
    /// Report file extension, also used as the adapter name.
    fn extension(&self) -> &'static str;

    /// Parse `text` read from `report`. `Ok(None)` when the report names no
    /// source and annotates no line.
    fn parse(&self, report: &Path, text: &str) -> Result<Option<ParsedReport>>;
}

static PARSERS: &[&dyn CoverageParser] = &[&GcovParser, &RbcovParser];

pub fn supported_extensions() -> Vec<&'static str> {
    PARSERS.iter().map(|p| p.extension()).collect()
}

/// Parser for `report`, chosen by its extension.
pub fn parser_for(report: &Path) -> Option<&'static dyn CoverageParser> {
    let ext = report.extension()?.to_str()?;
    PARSERS.iter().copied().find(|p| p.extension() == ext)
}

/// Parse one report file.
pub fn parse(report: &Path) -> Result<Option<(&'static str, ParsedReport)>> {
    let parser = parser_for(report).ok_or_else(|| Error::Parse {
        path: report.to_path_buf(),
        message: "unsupported report format".to_string(),
    })?;
    let bytes = fs::read(report)?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(parser.parse(report, &text)?.map(|parsed| (parser.extension(), parsed)))
}

/// Split `COUNT:LINENO:TEXT`. `COUNT` is `-` for lines that cannot be
/// covered, a run of `#` or `=` for unexecuted lines, or a number, possibly
/// marked with a trailing `*`.
pub(crate) fn split_report_line(line: &str, indented: bool) -> Option<(Option<HitCount>, usize, &str)> {
    let (count, rest) = line.split_once(':')?;
    if indented && !count.starts_with(char::is_whitespace) {
        return None;
    }
    let count = count.trim_start();
    let count = count.strip_suffix('*').unwrap_or(count);
    let count = match count {
        "-" => None,
        c if !c.is_empty() && c.bytes().all(|b| b == b'#' || b == b'=') => Some(0),
        c if !c.is_empty() && c.bytes().all(|b| b.is_ascii_digit()) => Some(c.parse().ok()?),
        _ => return None,
    };
    let (lineno, text) = rest.split_once(':')?;
    let lineno = lineno.trim_start();
    if lineno.is_empty() || !lineno.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((count, lineno.parse().ok()?, text.trim_end_matches('\r')))
}

pub(crate) fn no_source_error(report: &Path) -> Error {
    Error::Parse {
        path: report.to_path_buf(),
        message: "path of original source code is not found".to_string(),
    }
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Source path relative to `base`, or `None` when it lies outside `base` or
/// matches `skip`.
fn check_path(base: &Path, source: &Path, skip: &GlobSet) -> Option<String> {
    let relative = lexical_normalize(source).strip_prefix(base).ok()?.to_path_buf();
    let relative = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join("/");
    if relative.is_empty() || skip.is_match(&relative) {
        return None;
    }
    Some(relative)
}

struct Capture {
    adapter: &'static str,
    lines: Vec<String>,
    coverage: CoverageVector,
}

/// Walk `dir` for reports of every supported format and rebuild the sources
/// they annotate.
///
/// Hit counts of a source annotated by several reports add up; its text is
/// taken from the first report in walk order.
pub fn gather(
    dir: &Path,
    skip: &GlobSet,
    mut progress: impl FnMut(ProgressEstimate),
) -> Result<Vec<CapturedFile>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }
    let base = lexical_normalize(&std::env::current_dir()?.join(dir));

    let mut captures: BTreeMap<String, Capture> = BTreeMap::new();
    for entry in WalkDir::new(&base).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() || parser_for(entry.path()).is_none() {
            continue;
        }
        let report = entry.path();
        let (adapter, parsed) = match parse(report)? {
            Some(parsed) => parsed,
            None => continue,
        };
        let report_dir = report.parent().unwrap_or(&base);
        let path = match check_path(&base, &report_dir.join(&parsed.source), skip) {
            Some(path) => path,
            None => {
                debug!("{}: {} skipped", report.display(), parsed.source);
                continue;
            }
        };

        let first = !captures.contains_key(&path);
        let capture = captures.entry(path.clone()).or_insert_with(|| Capture {
            adapter,
            lines: Vec::new(),
            coverage: CoverageVector::default(),
        });
        if capture.adapter != adapter {
            warn!("{}: annotated by both {} and {}", path, capture.adapter, adapter);
        }
        let limit = parsed.lines.len();
        for line in parsed.lines {
            if line.lineno > limit {
                warn!("{}: line {} past the end of the report, ignored", report.display(), line.lineno);
                continue;
            }
            if let (Some(count), Some(idx)) = (line.count, line.lineno.checked_sub(1)) {
                capture.coverage.accumulate(idx, count);
            }
            if first {
                capture.lines.push(line.text);
            }
        }
        if first {
            progress(ProgressEstimate { stage: GATHER_STAGE, processed: captures.len(), total: None });
        }
    }

    Ok(captures
        .into_iter()
        .map(|(path, capture)| {
            let mut source = capture.lines.join("\n").into_bytes();
            if !capture.lines.is_empty() {
                source.push(b'\n');
            }
            CapturedFile {
                path,
                adapter: capture.adapter.to_string(),
                source,
                coverage: capture.coverage,
            }
        })
        .collect())
}
