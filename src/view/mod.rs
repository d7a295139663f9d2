//! Temporal views over the coverage history and their text rendering.

pub mod report;
pub mod table;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::store::{normalize_path, Matcher, PathType, Store};
use crate::types::Revision;

/// Changed revisions listed by the changes view; enough for any history.
pub const CHANGES_WINDOW: usize = 99999;

/// Which revisions a view shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum View {
    /// One revision.
    Day(Revision),
    /// The seven days ending at the revision.
    Week(Revision),
    /// `date` compared with `base`.
    Diff { base: Revision, date: Revision },
    /// Changed revisions around the date.
    Changes(Revision),
}

impl View {
    /// The revision the view is anchored at.
    pub fn date(&self) -> Revision {
        match *self {
            View::Day(date) | View::Week(date) | View::Changes(date) => date,
            View::Diff { date, .. } => date,
        }
    }

    /// Dates shown side by side, oldest first.
    pub fn dates(&self) -> Vec<Revision> {
        match *self {
            View::Day(date) | View::Changes(date) => vec![date],
            View::Week(date) => (-6..=0).map(|d| date.offset(d)).collect(),
            View::Diff { base, date } => vec![base, date],
        }
    }

    /// Human-friendly title.
    pub fn to_show(&self) -> String {
        match self {
            View::Day(date) | View::Changes(date) => date.to_show(),
            View::Week(date) => date.offset(-6).to_show_until(date),
            View::Diff { base, date } => format!("{} (cf. {})", date.to_show(), base.to_show()),
        }
    }

    /// Form accepted by [`View::from_str`].
    pub fn to_path(&self) -> String {
        match self {
            View::Day(date) => date.to_path(),
            View::Week(date) => format!("w{}", date.to_path()),
            View::Diff { base, date } if base.succ() == *date => format!("d{}", date.to_path()),
            View::Diff { base, date } => format!("{}d{}", base.to_path(), date.to_path()),
            View::Changes(date) => format!("c{}", date.to_path()),
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_show())
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidView(s.to_string());
        let date = |d: &str| Revision::parse_path(d).map_err(|_| invalid());

        if let Some(rest) = s.strip_prefix('g') {
            date(rest)?;
            return Err(Error::ChartUnsupported);
        }
        if let Some(rest) = s.strip_prefix('w') {
            return Ok(View::Week(date(rest)?));
        }
        if let Some(rest) = s.strip_prefix('c') {
            return Ok(View::Changes(date(rest)?));
        }
        if let Some(rest) = s.strip_prefix('d') {
            let date = date(rest)?;
            return Ok(View::Diff { base: date.pred(), date });
        }
        if let Some((base, rest)) = s.split_once('d') {
            return Ok(View::Diff { base: date(base)?, date: date(rest)? });
        }
        Ok(View::Day(date(s)?))
    }
}

/// Render `view` of `path` as text.
///
/// Without a view the day view of the last revision with coverage is used.
pub fn render(store: &Store, view: Option<View>, path: &str, filter: &Matcher) -> Result<(View, String)> {
    let view = match view {
        Some(view) => view,
        None => View::Day(store.last_date(filter).ok_or(Error::NoCoverage)?),
    };
    let path = normalize_path(path);
    let kind = store
        .path_type(&path, filter)
        .ok_or_else(|| Error::UnknownPath(path.clone()))?;

    let text = match view {
        View::Changes(date) => {
            let page = store.changes(CHANGES_WINDOW, kind, &path, date, filter)?;
            report::changes_report(kind, &page)
        }
        _ if kind != PathType::File => {
            let dates = view.dates();
            report::list_table(kind, &store.list(&path, &dates, filter), &dates)
        }
        View::Week(_) => return Err(Error::InvalidView("cannot view file in week view".to_string())),
        View::Day(date) => {
            check_dates(store, &path, &[date], filter)?;
            report::code_table(&store.code(&path, date)?)
        }
        View::Diff { base, date } => {
            check_dates(store, &path, &[base, date], filter)?;
            report::diff_table(&store.code_diff(&path, base, date)?)
        }
    };
    Ok((view, text))
}

fn check_dates(store: &Store, path: &str, dates: &[Revision], filter: &Matcher) -> Result<()> {
    let (first, last) = match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Ok(()),
    };
    let history = store.history(PathType::File, path, first..=last, filter);
    match dates.iter().find(|date| !history.contains_key(*date)) {
        Some(date) => Err(Error::InvalidDate(date.to_show())),
        None => Ok(()),
    }
}
