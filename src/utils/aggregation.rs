use std::collections::BTreeMap;

use crate::store::{DirRow, FileRow};
use crate::types::{ChangeSummary, Revision};

/// Sum optional counts; `None` only when every input is `None`.
fn sum_present(values: impl Iterator<Item = Option<u64>>) -> Option<u64> {
    values.fold(None, |acc, v| match (acc, v) {
        (None, None) => None,
        (acc, v) => Some(acc.unwrap_or(0) + v.unwrap_or(0)),
    })
}

/// Roll the file rows of one revision up into directory rows, one per
/// `(dir, ext, adapter)` group.
pub fn aggregate_files<'a>(date: Revision, rows: impl IntoIterator<Item = &'a FileRow>) -> Vec<DirRow> {
    let mut groups: BTreeMap<(String, Option<String>, String), Vec<&FileRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.dir.clone(), row.ext.clone(), row.adapter.clone()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((dir, ext, adapter), rows)| {
            let change: ChangeSummary = rows
                .iter()
                .filter_map(|row| row.change.as_ref())
                .map(ChangeSummary::from)
                .collect::<Vec<_>>()
                .iter()
                .sum();
            DirRow {
                date,
                dir,
                ext,
                adapter,
                hit: sum_present(rows.iter().map(|r| r.hit)),
                found: sum_present(rows.iter().map(|r| r.found)),
                change: change.non_empty(),
            }
        })
        .collect()
}

/// Per-date `(hit, found)` totals; absent counts add nothing.
pub fn totals_by_date<I>(rows: I) -> BTreeMap<Revision, (u64, u64)>
where
    I: IntoIterator<Item = (Revision, Option<u64>, Option<u64>)>,
{
    let mut totals = BTreeMap::new();
    for (date, hit, found) in rows {
        let entry = totals.entry(date).or_insert((0, 0));
        entry.0 += hit.unwrap_or(0);
        entry.1 += found.unwrap_or(0);
    }
    totals
}
