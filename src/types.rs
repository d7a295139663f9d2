//! # Common Types
//!
//! This module contains the types shared by the analysis engine, the store and
//! the text reports: revisions, coverage vectors, line alignments and the
//! change records produced between two revisions.

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::AddAssign;
use std::str::FromStr;

use crate::error::{Error, Result};

/// A registered snapshot of the source tree, identified by its calendar date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(NaiveDate);

impl Revision {
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The revision `days` calendar days away (negative for earlier days).
    pub fn offset(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn succ(&self) -> Self {
        self.offset(1)
    }

    pub fn pred(&self) -> Self {
        self.offset(-1)
    }

    /// Path form, `YYYYmmdd`. Also used as the tag name in the source store.
    pub fn to_path(&self) -> String {
        format!("{:04}{:02}{:02}", self.0.year(), self.0.month(), self.0.day())
    }

    /// Display form, `YYYY/mm/dd`.
    pub fn to_show(&self) -> String {
        format!("{:04}/{:02}/{:02}", self.0.year(), self.0.month(), self.0.day())
    }

    /// Display form of the range from `self` to `until`, omitting the leading
    /// components `until` shares with `self`.
    ///
    /// `2009/01/01` to `2009/01/07` shows as `2009/01/01 - 07`.
    pub fn to_show_until(&self, until: &Revision) -> String {
        let (a, b) = (self.0, until.0);
        let mut tail = String::new();
        if !tail.is_empty() || a.year() != b.year() {
            tail.push_str(&format!("{:04}/", b.year()));
        }
        if !tail.is_empty() || a.month() != b.month() {
            tail.push_str(&format!("{:02}/", b.month()));
        }
        if !tail.is_empty() || a.day() != b.day() {
            tail.push_str(&format!("{:02}", b.day()));
        }
        if tail.is_empty() {
            self.to_show()
        } else {
            format!("{} - {}", self.to_show(), tail)
        }
    }

    /// Parse the path form `YYYYmmdd`.
    pub fn parse_path(s: &str) -> Result<Self> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDate(s.to_string()));
        }
        let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().unwrap_or(0);
        Self::new(field(0..4) as i32, field(4..6), field(6..8))
            .ok_or_else(|| Error::InvalidDate(s.to_string()))
    }

    /// Parse the display form `YYYY/mm/dd`.
    pub fn parse_show(s: &str) -> Result<Self> {
        NaiveDate::parse_from_str(s, "%Y/%m/%d")
            .map(Self)
            .map_err(|_| Error::InvalidDate(s.to_string()))
    }
}

impl FromStr for Revision {
    type Err = Error;

    /// Accepts `YYYYmmdd`, `YYYY/mm/dd` and `YYYY-mm-dd`.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse_path(s)
            .or_else(|_| Self::parse_show(s))
            .or_else(|_| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(Self)
                    .map_err(|_| Error::InvalidDate(s.to_string()))
            })
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_show())
    }
}

/// Hit count of one coverable line.
pub type HitCount = u64;

/// Coverage state of a single line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineState {
    NotCoverable,
    Uncovered,
    Covered,
}

impl LineState {
    pub fn of(count: Option<HitCount>) -> Self {
        match count {
            None => LineState::NotCoverable,
            Some(0) => LineState::Uncovered,
            Some(_) => LineState::Covered,
        }
    }

    pub fn is_covered(self) -> bool {
        self == LineState::Covered
    }
}

/// Per-line hit counts of one file at one revision (0-indexed by line).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageVector(Vec<Option<HitCount>>);

impl CoverageVector {
    pub fn new(counts: Vec<Option<HitCount>>) -> Self {
        Self(counts)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hit count of line `idx`; lines past the end are not coverable.
    pub fn get(&self, idx: usize) -> Option<HitCount> {
        self.0.get(idx).copied().flatten()
    }

    pub fn state(&self, idx: usize) -> LineState {
        LineState::of(self.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<HitCount>> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Option<HitCount>] {
        &self.0
    }

    /// Number of covered lines.
    pub fn hit(&self) -> u64 {
        self.iter().filter(|c| matches!(c, Some(n) if *n > 0)).count() as u64
    }

    /// Number of coverable lines.
    pub fn found(&self) -> u64 {
        self.iter().filter(Option::is_some).count() as u64
    }

    /// True when no line is coverable at all.
    pub fn is_blank(&self) -> bool {
        self.iter().all(|c| c.is_none())
    }

    /// Add `count` hits to line `idx`, growing the vector as needed.
    pub fn accumulate(&mut self, idx: usize, count: HitCount) {
        if self.0.len() <= idx {
            self.0.resize(idx + 1, None);
        }
        let slot = &mut self.0[idx];
        *slot = Some(slot.unwrap_or(0).saturating_add(count));
    }

    /// Make the vector exactly `len` lines long, dropping counts past the end
    /// or padding with non-coverable lines.
    pub fn resize_to(&mut self, len: usize) {
        self.0.resize(len, None);
    }
}

impl FromIterator<Option<HitCount>> for CoverageVector {
    fn from_iter<I: IntoIterator<Item = Option<HitCount>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Option<HitCount>>> for CoverageVector {
    fn from(counts: Vec<Option<HitCount>>) -> Self {
        Self(counts)
    }
}

/// One step of a line alignment between an older and a newer file text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineOp {
    /// The line exists only in the newer text.
    Add,
    /// The line exists only in the older text.
    Del,
    /// The line exists in both texts.
    Common,
}

impl LineOp {
    /// Whether the step consumes a line of the older text.
    pub fn touches_prev(self) -> bool {
        self != LineOp::Add
    }

    /// Whether the step consumes a line of the newer text.
    pub fn touches_curr(self) -> bool {
        self != LineOp::Del
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Deleted,
    Modified,
    Changed,
}

/// Code and coverage delta of a single file between two adjacent revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// Lines added.
    pub code_inc: u64,
    /// Lines removed.
    pub code_dec: u64,
    /// Lines that became covered.
    pub cov_inc: u64,
    /// Lines that are no longer covered.
    pub cov_dec: u64,
}

impl ChangeRecord {
    pub fn created(size: u64, covered: u64) -> Self {
        Self { kind: ChangeKind::Created, code_inc: size, code_dec: 0, cov_inc: covered, cov_dec: 0 }
    }

    pub fn deleted(size: u64, covered: u64) -> Self {
        Self { kind: ChangeKind::Deleted, code_inc: 0, code_dec: size, cov_inc: 0, cov_dec: covered }
    }
}

/// Sum of change records, as stored for directories and whole trees.
///
/// Besides the line counters it counts files per kind of change.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub created: u64,
    pub deleted: u64,
    pub modified: u64,
    pub changed: u64,
    pub code_inc: u64,
    pub code_dec: u64,
    pub cov_inc: u64,
    pub cov_dec: u64,
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        *self == ChangeSummary::default()
    }

    /// `None` for an all-zero summary, since "no change" is represented as
    /// absence.
    pub fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

impl From<&ChangeRecord> for ChangeSummary {
    fn from(record: &ChangeRecord) -> Self {
        let mut summary = ChangeSummary {
            code_inc: record.code_inc,
            code_dec: record.code_dec,
            cov_inc: record.cov_inc,
            cov_dec: record.cov_dec,
            ..Default::default()
        };
        match record.kind {
            ChangeKind::Created => summary.created = 1,
            ChangeKind::Deleted => summary.deleted = 1,
            ChangeKind::Modified => summary.modified = 1,
            ChangeKind::Changed => summary.changed = 1,
        }
        summary
    }
}

impl From<ChangeRecord> for ChangeSummary {
    fn from(record: ChangeRecord) -> Self {
        Self::from(&record)
    }
}

impl AddAssign<&ChangeSummary> for ChangeSummary {
    fn add_assign(&mut self, rhs: &ChangeSummary) {
        self.created += rhs.created;
        self.deleted += rhs.deleted;
        self.modified += rhs.modified;
        self.changed += rhs.changed;
        self.code_inc += rhs.code_inc;
        self.code_dec += rhs.code_dec;
        self.cov_inc += rhs.cov_inc;
        self.cov_dec += rhs.cov_dec;
    }
}

impl<'a> Sum<&'a ChangeSummary> for ChangeSummary {
    fn sum<I: Iterator<Item = &'a ChangeSummary>>(iter: I) -> Self {
        iter.fold(ChangeSummary::default(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

/// Coverage totals of one entity (file, directory or tree) at one revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: Revision,
    /// Covered lines; 0 when the entity does not exist at `date`.
    pub hit: u64,
    /// Coverable lines; 0 when the entity does not exist at `date`.
    pub found: u64,
    /// Change relative to the previous registered revision of the entity.
    pub change: Option<ChangeSummary>,
}

/// Progress of a long-running registration.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEstimate {
    pub stage: &'static str,
    pub processed: usize,
    pub total: Option<usize>,
}

impl ProgressEstimate {
    pub fn percent_complete(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| self.processed as f64 * 100.0 / total as f64)
    }
}

impl fmt::Display for ProgressEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}... {}", self.stage, self.processed)?;
        if let (Some(total), Some(pct)) = (self.total, self.percent_complete()) {
            write!(f, " / {} ({}%)", total, pct as u64)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rev(s: &str) -> Revision {
        s.parse().unwrap()
    }

    #[test]
    fn test_revision_formats() {
        let day = rev("20090101");
        assert_eq!(day.to_path(), "20090101");
        assert_eq!(day.to_show(), "2009/01/01");
        assert_eq!(rev("2009/01/01"), day);
        assert_eq!(rev("2009-01-01"), day);
        assert_eq!(day.pred(), rev("20081231"));
        assert!(Revision::parse_path("2009011").is_err());
        assert!(Revision::parse_path("20091301").is_err());
    }

    #[test]
    fn test_show_until() {
        let day = rev("20090101");
        assert_eq!(day.to_show_until(&day), "2009/01/01");
        assert_eq!(day.to_show_until(&rev("20090107")), "2009/01/01 - 07");
        assert_eq!(day.to_show_until(&rev("20090207")), "2009/01/01 - 02/07");
        assert_eq!(rev("20081226").to_show_until(&day), "2008/12/26 - 2009/01/01");
    }

    #[test]
    fn test_coverage_vector_totals() {
        let cov = CoverageVector::new(vec![Some(1), Some(10), Some(0), None, Some(100), Some(0)]);
        assert_eq!(cov.hit(), 3);
        assert_eq!(cov.found(), 5);
        assert_eq!(cov.state(3), LineState::NotCoverable);
        assert_eq!(cov.state(2), LineState::Uncovered);
        assert_eq!(cov.state(99), LineState::NotCoverable);
        assert!(!cov.is_blank());
        assert!(CoverageVector::new(vec![None, None]).is_blank());
    }

    #[test]
    fn test_accumulate() {
        let mut cov = CoverageVector::default();
        cov.accumulate(2, 3);
        cov.accumulate(2, 4);
        cov.resize_to(5);
        assert_eq!(cov.as_slice(), &[None, None, Some(7), None, None]);

        cov.accumulate(4, u64::MAX);
        cov.accumulate(4, 2);
        assert_eq!(cov.get(4), Some(u64::MAX));
    }

    #[test]
    fn test_resize_to_truncates() {
        let mut cov = CoverageVector::new(vec![Some(1), Some(0), None, Some(5)]);
        cov.resize_to(3);
        assert_eq!(cov.as_slice(), &[Some(1), Some(0), None]);
        assert_eq!((cov.hit(), cov.found()), (1, 2));
    }

    #[test]
    fn test_summary_from_records() {
        let records = [
            ChangeRecord::created(6, 3),
            ChangeRecord { kind: ChangeKind::Modified, code_inc: 2, code_dec: 1, cov_inc: 1, cov_dec: 0 },
        ];
        let total: ChangeSummary = records.iter().map(ChangeSummary::from).collect::<Vec<_>>().iter().sum();
        assert_eq!(
            total,
            ChangeSummary { created: 1, modified: 1, code_inc: 8, code_dec: 1, cov_inc: 4, ..Default::default() }
        );
        assert_eq!(ChangeSummary::default().non_empty(), None);
    }

    #[test]
    fn test_progress_display() {
        let progress = ProgressEstimate { stage: "register to database", processed: 1, total: Some(3) };
        assert_eq!(progress.to_string(), "register to database... 1 / 3 (33%)");
        let progress = ProgressEstimate { stage: "gather source code", processed: 2, total: None };
        assert_eq!(progress.to_string(), "gather source code... 2");
    }
}
