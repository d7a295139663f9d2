use super::table::{Cell, TextTable};
use crate::analysis::pager::{HistoryPage, PageEntry};
use crate::analysis::snipper::snip;
use crate::store::{CodeLine, DiffLine, PathType, Totals};
use crate::types::Revision;

/// Lines of context kept around displayed lines in file tables.
pub const SNIP_RADIUS: usize = 3;

fn percent(hit: u64, found: u64) -> String {
    if found > 0 {
        format!("{:3.1}%", 100.0 * hit as f64 / found as f64)
    } else {
        "N/A".to_string()
    }
}

/// Expand tabs to 8-column stops.
pub fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for c in line.chars() {
        if c == '\t' {
            let n = 8 - column % 8;
            out.extend(std::iter::repeat(' ').take(n));
            column += n;
        } else {
            out.push(c);
            column += 1;
        }
    }
    out
}

/// Table of directories (top level) or files (a directory), with coverage,
/// hit and found per date.
pub fn list_table(kind: PathType, rows: &[(String, Totals)], dates: &[Revision]) -> String {
    let mut table = TextTable::new(&format!("l{}", "rrr".repeat(dates.len())));

    let title = if kind == PathType::Dir { "files" } else { "dirs" };
    let mut header = vec![Cell::centered(title)];
    for _ in dates {
        header.extend([Cell::centered("%"), Cell::new(""), Cell::new("")]);
    }
    table.push(header);
    table.separator();

    for (name, totals) in rows {
        let mut row = vec![Cell::new(name.as_str())];
        for date in dates {
            match totals.get(date) {
                Some(&(hit, found)) => row.extend([
                    Cell::new(percent(hit, found)),
                    Cell::new(hit.to_string()),
                    Cell::new(found.to_string()),
                ]),
                None => row.extend([Cell::new("N/A"), Cell::new("N/A"), Cell::new("N/A")]),
            }
        }
        table.push(row);
    }
    table.render()
}

fn count_cell(count: Option<u64>) -> Cell {
    Cell::new(count.map(|c| c.to_string()).unwrap_or_default())
}

/// Five-row band drawn in place of an elided hunk.
fn snip_band(sides: usize) -> Vec<Vec<Cell>> {
    let blank = || vec![Cell::new(""); 1 + 2 * sides];
    let mut mark = vec![Cell::centered("*")];
    for _ in 0..sides {
        mark.extend([Cell::centered("*"), Cell::centered("*** snip ***")]);
    }
    vec![blank(), blank(), mark, blank(), blank()]
}

fn windowed_table(format: &str, sides: usize, rows: impl IntoIterator<Item = (Vec<Cell>, bool)>) -> String {
    let mut table = TextTable::new(format);
    // the radius is a positive constant
    if let Ok(hunks) = snip(SNIP_RADIUS, rows) {
        for hunk in hunks {
            if hunk.displayed {
                for row in hunk.items {
                    table.push(row);
                }
            } else {
                for row in snip_band(sides) {
                    table.push(row);
                }
            }
        }
    }
    table.render()
}

/// Source of one file at one date: line number, hit count and text.
pub fn code_table(lines: &[(CodeLine, bool)]) -> String {
    let rows = lines.iter().map(|(line, show)| {
        (
            vec![
                Cell::new(line.lineno.to_string()),
                count_cell(line.count),
                Cell::new(expand_tabs(&line.text)),
            ],
            *show,
        )
    });
    windowed_table("rrl", 1, rows)
}

/// Line diff of one file between two dates, both sides with their counts.
pub fn diff_table(lines: &[(DiffLine, bool)]) -> String {
    let side = |side: &Option<(Option<u64>, String)>| match side {
        Some((count, text)) => [count_cell(*count), Cell::new(expand_tabs(text))],
        None => [Cell::new(""), Cell::new("")],
    };
    let rows = lines.iter().map(|(line, show)| {
        let mut row = vec![Cell::new(line.lineno.map(|n| n.to_string()).unwrap_or_default())];
        row.extend(side(&line.left));
        row.extend(side(&line.right));
        (row, *show)
    });
    windowed_table("rrlrl", 2, rows)
}

fn entry_line(entry: &PageEntry, mark: Option<&str>) -> String {
    let title = match entry.until {
        Some(until) => entry.date.to_show_until(&until.pred()),
        None => format!("{} -", entry.date.to_show()),
    };
    let mark = mark.map(|m| format!(" ({})", m)).unwrap_or_default();
    format!(
        "{}{}  ({}; {}/{})",
        title,
        mark,
        percent(entry.hit, entry.found),
        entry.hit,
        entry.found
    )
}

fn count_line(out: &mut Vec<String>, count: u64, unit: &str, event: &str) {
    if count > 0 {
        let plural = if count > 1 { "s" } else { "" };
        out.push(format!("  | {} {}{} {}", count, unit, plural, event));
    }
}

/// Changed revisions, newest first, each followed by what changed since the
/// next older one.
pub fn changes_report(kind: PathType, page: &HistoryPage) -> String {
    let last = page.entries.len().saturating_sub(1);
    let mut out = Vec::new();
    for (idx, entry) in page.entries.iter().enumerate() {
        let mark = if idx == 0 && page.is_latest() {
            Some("latest")
        } else if idx == last && page.is_earliest() {
            Some("earliest")
        } else {
            None
        };
        out.push(entry_line(entry, mark));

        if let Some(change) = entry.change {
            out.push("  ^".to_string());
            if kind == PathType::File {
                count_line(&mut out, change.code_inc, "line", "added");
                count_line(&mut out, change.code_dec, "line", "deleted");
            } else {
                count_line(&mut out, change.created, "file", "added");
                count_line(&mut out, change.deleted, "file", "deleted");
                count_line(&mut out, change.modified, "file", "modified");
            }
            out.push("  |".to_string());
        }
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeSummary;
    use pretty_assertions::assert_eq;

    fn rev(s: &str) -> Revision {
        Revision::parse_path(s).unwrap()
    }

    #[test]
    fn test_expand_tabs() {
        assert_eq!(expand_tabs("\tfoo();"), "        foo();");
        assert_eq!(expand_tabs("ab\tc\td"), "ab      c       d");
        assert_eq!(expand_tabs("no tabs"), "no tabs");
    }

    #[test]
    fn test_list_table() {
        let day = rev("20090101");
        let rows = vec![
            ("bar/".to_string(), Totals::from([(day, (3, 5))])),
            ("foo/".to_string(), Totals::from([(day, (6, 7))])),
        ];
        assert_eq!(
            list_table(PathType::Top, &rows, &[day]),
            "+----+-----+-+-+\n\
             |dirs|  %  | | |\n\
             +----+-----+-+-+\n\
             |bar/|60.0%|3|5|\n\
             |foo/|85.7%|6|7|\n\
             +----+-----+-+-+"
        );
    }

    #[test]
    fn test_list_table_missing_dates() {
        let day = rev("20090101");
        let rows = vec![("test1.c".to_string(), Totals::from([(day, (0, 0))]))];
        assert_eq!(
            list_table(PathType::Dir, &rows, &[day.pred(), day]),
            "+-------+---+---+---+---+-+-+\n\
             | files | % |   |   | % | | |\n\
             +-------+---+---+---+---+-+-+\n\
             |test1.c|N/A|N/A|N/A|N/A|0|0|\n\
             +-------+---+---+---+---+-+-+"
        );
    }

    fn code(lineno: usize, count: Option<u64>, text: &str) -> (CodeLine, bool) {
        (CodeLine { lineno, count, text: text.to_string() }, count.is_some())
    }

    #[test]
    fn test_code_table() {
        let lines = vec![
            code(1, Some(1), "int main() {"),
            code(2, Some(1), "\tfoo();"),
            code(3, None, "}"),
        ];
        assert_eq!(
            code_table(&lines),
            "+-+-+--------------+\n\
             |1|1|int main() {  |\n\
             |2|1|        foo();|\n\
             |3| |}             |\n\
             +-+-+--------------+"
        );
    }

    #[test]
    fn test_code_table_snips_long_runs() {
        let mut lines: Vec<_> = (1..=20).map(|n| code(n, None, "x")).collect();
        lines[0] = code(1, Some(1), "x");
        let text = code_table(&lines);
        assert!(text.contains("|* |*|*** snip ***|"));
        // flagged first line with three lines of context, band, tail
        assert!(text.contains("| 4| |x           |"));
        assert!(!text.contains("| 5| |"));
        assert!(!text.contains("|17| |"));
        assert!(text.contains("|18| |x           |"));
        assert!(text.contains("|20| |x           |"));
        assert_eq!(text.lines().count(), 2 + 4 + 5 + 3);
    }

    #[test]
    fn test_diff_table() {
        let lines = vec![
            (
                DiffLine { lineno: Some(1), left: Some((Some(1), "a".into())), right: Some((Some(1), "a".into())) },
                false,
            ),
            (DiffLine { lineno: None, left: Some((Some(1), "if false".into())), right: None }, true),
            (DiffLine { lineno: Some(2), left: None, right: Some((Some(1), "if true".into())) }, true),
        ];
        assert_eq!(
            diff_table(&lines),
            "+-+-+--------+-+-------+\n\
             |1|1|a       |1|a      |\n\
             | |1|if false| |       |\n\
             |2| |        |1|if true|\n\
             +-+-+--------+-+-------+"
        );
    }

    fn entry(date: &str, until: Option<&str>, hit: u64, found: u64, change: Option<ChangeSummary>) -> PageEntry {
        PageEntry { date: rev(date), until: until.map(rev), hit, found, change }
    }

    #[test]
    fn test_changes_report_single_entry() {
        let page = HistoryPage { entries: vec![entry("20090101", None, 9, 12, None)], newer: None, older: None };
        assert_eq!(changes_report(PathType::Top, &page), "2009/01/01 - (latest)  (75.0%; 9/12)");
    }

    #[test]
    fn test_changes_report() {
        let dirs = ChangeSummary { modified: 2, code_inc: 2, ..Default::default() };
        let page = HistoryPage {
            entries: vec![
                entry("20090102", None, 12, 14, Some(dirs)),
                entry("20090101", Some("20090102"), 9, 12, None),
            ],
            newer: None,
            older: None,
        };
        assert_eq!(
            changes_report(PathType::Top, &page),
            "2009/01/02 - (latest)  (85.7%; 12/14)\n  ^\n  | 2 files modified\n  |\n2009/01/01 (earliest)  (75.0%; 9/12)"
        );
        assert_eq!(
            changes_report(PathType::File, &page),
            "2009/01/02 - (latest)  (85.7%; 12/14)\n  ^\n  | 2 lines added\n  |\n2009/01/01 (earliest)  (75.0%; 9/12)"
        );
    }

    #[test]
    fn test_changes_report_middle_page() {
        let page = HistoryPage {
            entries: vec![
                entry("20090105", Some("20090108"), 1, 1, Some(ChangeSummary { deleted: 1, ..Default::default() })),
                entry("20090104", Some("20090105"), 0, 0, None),
            ],
            newer: Some(rev("20090110")),
            older: Some(rev("20090102")),
        };
        assert_eq!(
            changes_report(PathType::Dir, &page),
            "2009/01/05 - 07  (100.0%; 1/1)\n  ^\n  | 1 file deleted\n  |\n2009/01/04  (N/A; 0/0)"
        );
    }
}
