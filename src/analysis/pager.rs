use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::{ChangeSummary, Revision, TimelineEntry};

/// Index range of one page over `count` changed entries, plus the indices the
/// newer and older cursors point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub start: usize,
    pub end: usize,
    pub newer: Option<usize>,
    pub older: Option<usize>,
}

/// Compute the page of up to `2 * win + 1` entries centred on `anchor`.
///
/// Indices are ascending by date; `anchor` must be below `count` unless
/// `count` is zero.
pub fn window(count: usize, anchor: usize, win: usize) -> Result<PageWindow> {
    if win == 0 {
        return Err(Error::InvalidWindow);
    }
    if count == 0 {
        return Ok(PageWindow { start: 0, end: 0, newer: None, older: None });
    }
    let size = count.min(2 * win + 1);
    let start = anchor.saturating_sub(win).min(count - size);
    let end = start + size;
    let newer = (end < count).then(|| (end - 1 + win).min(count - 1));
    let older = (start > 0).then(|| start.saturating_sub(win));
    Ok(PageWindow { start, end, newer, older })
}

/// One entry of a history page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PageEntry {
    pub date: Revision,
    /// Next newer changed revision in the whole timeline.
    pub until: Option<Revision>,
    pub hit: u64,
    pub found: u64,
    /// Change from the next older entry on the page to this one.
    pub change: Option<ChangeSummary>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    /// Most recent first.
    pub entries: Vec<PageEntry>,
    pub newer: Option<Revision>,
    pub older: Option<Revision>,
}

impl HistoryPage {
    /// Whether the page holds the newest changed entry.
    pub fn is_latest(&self) -> bool {
        self.newer.is_none()
    }

    /// Whether the page holds the oldest changed entry.
    pub fn is_earliest(&self) -> bool {
        self.older.is_none()
    }
}

/// Page through `timeline` (changed entries, ascending by date) around
/// `anchor`.
pub fn page(timeline: &[TimelineEntry], anchor: Revision, win: usize) -> Result<HistoryPage> {
    let anchor_idx = timeline
        .partition_point(|entry| entry.date <= anchor)
        .saturating_sub(1);
    let w = window(timeline.len(), anchor_idx, win)?;

    let entries = (w.start..w.end)
        .rev()
        .map(|i| {
            let entry = &timeline[i];
            PageEntry {
                date: entry.date,
                until: timeline.get(i + 1).map(|next| next.date),
                hit: entry.hit,
                found: entry.found,
                change: if i == w.start { None } else { entry.change },
            }
        })
        .collect();

    Ok(HistoryPage {
        entries,
        newer: w.newer.map(|i| timeline[i].date),
        older: w.older.map(|i| timeline[i].date),
    })
}
