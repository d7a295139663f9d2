//! Persistent coverage history: the timeline document plus the git source
//! store, behind one browsing facade.

mod database;
mod query;
pub mod source;

pub use database::{split_path, Database, DirRow, FileRow, Lock};
pub use query::{Filter, Matcher};
pub use source::SourceRepo;

use git2::Oid;
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::analysis::pager::{self, HistoryPage};
use crate::analysis::CoverageCache;
use crate::error::{Error, Result};
use crate::types::{ChangeSummary, CoverageVector, LineOp, LineState, Revision, TimelineEntry};
use crate::utils::aggregation::totals_by_date;

const DATABASE_FILE: &str = "coverage.json";
const SOURCE_DIR: &str = "source.git";

/// What a browsing path refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathType {
    /// The whole tree: a list of directories.
    Top,
    /// One directory: a list of its files.
    Dir,
    /// One file: its source text.
    File,
}

/// `(hit, found)` per date.
pub type Totals = BTreeMap<Revision, (u64, u64)>;

/// One line of a single-revision file view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeLine {
    pub lineno: usize,
    pub count: Option<u64>,
    pub text: String,
}

/// One side of a diff row: hit count and text.
pub type DiffSide = (Option<u64>, String);

/// One line of a two-revision file diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiffLine {
    /// Line number on the newer side, absent for deleted lines.
    pub lineno: Option<usize>,
    pub left: Option<DiffSide>,
    pub right: Option<DiffSide>,
}

/// Normalize a browsing path: `""`/`"."` for the top, no leading `./` and no
/// trailing slash otherwise.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    parts.join("/")
}

fn dir_key(path: &str) -> String {
    if path.is_empty() {
        "./".to_string()
    } else {
        format!("{}/", path)
    }
}

/// The coverage history of one data directory.
pub struct Store {
    pub(crate) root: PathBuf,
    pub(crate) db: Database,
    pub(crate) source: SourceRepo,
    cache: Mutex<CoverageCache>,
}

impl Store {
    /// Create the data directory, the timeline document and the source store.
    pub fn init(root: &Path) -> Result<Self> {
        if Self::is_initialized(root) {
            return Err(Error::AlreadyInitialized);
        }
        fs::create_dir_all(root)?;
        let db = Database::create(&root.join(DATABASE_FILE))?;
        let source = SourceRepo::init(&root.join(SOURCE_DIR))?;
        debug!("initialized {}", root.display());
        Ok(Self::assemble(root, db, source))
    }

    pub fn open(root: &Path) -> Result<Self> {
        let db = Database::open(&root.join(DATABASE_FILE))?;
        let source = SourceRepo::open(&root.join(SOURCE_DIR))?;
        Ok(Self::assemble(root, db, source))
    }

    /// Re-read the timeline document, which another process may have replaced.
    pub(crate) fn reload(&mut self) -> Result<()> {
        self.db = Database::open(&self.root.join(DATABASE_FILE))?;
        Ok(())
    }

    pub fn is_initialized(root: &Path) -> bool {
        root.join(DATABASE_FILE).is_file()
    }

    fn assemble(root: &Path, db: Database, source: SourceRepo) -> Self {
        Self {
            root: root.to_path_buf(),
            db,
            source,
            cache: Mutex::new(CoverageCache::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn source(&self) -> &SourceRepo {
        &self.source
    }

    /// Decode the vector stored in `blob`, going through the cache.
    pub fn load_coverage(&self, blob: Oid) -> Result<Arc<CoverageVector>> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(hit) = cache.get(&blob) {
            return Ok(hit);
        }
        let coverage = Arc::new(self.source.read_coverage(blob)?);
        cache.store(blob, coverage.clone());
        Ok(coverage)
    }

    fn live_dirs<'a>(&'a self, filter: &'a Matcher) -> impl Iterator<Item = &'a DirRow> + 'a {
        self.db
            .dirs()
            .iter()
            .filter(move |row| !row.is_deleted() && filter.matches(&row.dir, row.ext.as_deref(), &row.adapter))
    }

    fn dir_rows<'a>(&'a self, filter: &'a Matcher) -> impl Iterator<Item = &'a DirRow> + 'a {
        self.db
            .dirs()
            .iter()
            .filter(move |row| filter.matches(&row.dir, row.ext.as_deref(), &row.adapter))
    }

    fn file_rows<'a>(&'a self, filter: &'a Matcher) -> impl Iterator<Item = &'a FileRow> + 'a {
        self.db
            .files()
            .iter()
            .filter(move |row| filter.matches(&row.dir, row.ext.as_deref(), &row.adapter))
    }

    pub fn path_type(&self, path: &str, filter: &Matcher) -> Option<PathType> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Some(PathType::Top);
        }
        let dir = dir_key(&path);
        if self.live_dirs(filter).any(|row| row.dir == dir) {
            return Some(PathType::Dir);
        }
        let (dir, file, _) = split_path(&path);
        self.file_rows(filter)
            .any(|row| !row.is_deleted() && row.dir == dir && row.file == file)
            .then_some(PathType::File)
    }

    /// First revision with any live coverage.
    pub fn first_date(&self, filter: &Matcher) -> Option<Revision> {
        self.live_dirs(filter).map(|row| row.date).min()
    }

    /// Last revision with any live coverage.
    pub fn last_date(&self, filter: &Matcher) -> Option<Revision> {
        self.live_dirs(filter).map(|row| row.date).max()
    }

    /// Last registered revision, empty trees included.
    pub fn last_registered_date(&self) -> Option<Revision> {
        self.db.last_registered()
    }

    /// Directory totals for the top level, or file totals for a directory,
    /// sorted by name.
    pub fn list(&self, path: &str, dates: &[Revision], filter: &Matcher) -> Vec<(String, Totals)> {
        let path = normalize_path(path);
        let mut rows: BTreeMap<String, Vec<(Revision, Option<u64>, Option<u64>)>> = BTreeMap::new();
        if path.is_empty() {
            for row in self.live_dirs(filter).filter(|row| dates.contains(&row.date)) {
                rows.entry(row.dir.clone()).or_default().push((row.date, row.hit, row.found));
            }
        } else {
            let dir = dir_key(&path);
            for row in self
                .file_rows(filter)
                .filter(|row| !row.is_deleted() && row.dir == dir && dates.contains(&row.date))
            {
                rows.entry(row.file.clone()).or_default().push((row.date, row.hit, row.found));
            }
        }
        rows.into_iter()
            .map(|(name, entries)| (name, totals_by_date(entries)))
            .collect()
    }

    /// `(hit, found)` of one entity for every live revision in `range`.
    pub fn history(&self, kind: PathType, path: &str, range: RangeInclusive<Revision>, filter: &Matcher) -> Totals {
        let path = normalize_path(path);
        match kind {
            PathType::Top | PathType::Dir => {
                let dir = (kind == PathType::Dir).then(|| dir_key(&path));
                totals_by_date(
                    self.live_dirs(filter)
                        .filter(|row| range.contains(&row.date))
                        .filter(|row| dir.as_ref().map_or(true, |d| &row.dir == d))
                        .map(|row| (row.date, row.hit, row.found)),
                )
            }
            PathType::File => {
                let (dir, file, _) = split_path(&path);
                totals_by_date(
                    self.file_rows(filter)
                        .filter(|row| !row.is_deleted() && range.contains(&row.date))
                        .filter(|row| row.dir == dir && row.file == file)
                        .map(|row| (row.date, row.hit, row.found)),
                )
            }
        }
    }

    /// Live row of `path` at exactly `date`.
    fn file_row_at(&self, path: &str, date: Revision) -> Option<&FileRow> {
        let (dir, file, _) = split_path(&normalize_path(path));
        self.db
            .files_at(date)
            .find(|row| !row.is_deleted() && row.dir == dir && row.file == file)
    }

    /// Per-line hit counts of `path` at `date`.
    pub fn coverage(&self, path: &str, date: Revision) -> Result<Option<Arc<CoverageVector>>> {
        match self.file_row_at(path, date).map(FileRow::coverage_blob).transpose()?.flatten() {
            Some(blob) => Ok(Some(self.load_coverage(blob)?)),
            None => Ok(None),
        }
    }

    /// Source lines of `path` at `date`, each flagged when coverable.
    pub fn code(&self, path: &str, date: Revision) -> Result<Vec<(CodeLine, bool)>> {
        let path = normalize_path(path);
        let coverage = self.coverage(&path, date)?.unwrap_or_default();
        let lines = self.source.lines(&path, date)?.unwrap_or_default();
        Ok(lines
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let count = coverage.get(idx);
                (CodeLine { lineno: idx + 1, count, text }, count.is_some())
            })
            .collect())
    }

    /// Line diff of `path` from `from` to `to`, each row flagged when its
    /// text or coverage state changed.
    pub fn code_diff(&self, path: &str, from: Revision, to: Revision) -> Result<Vec<(DiffLine, bool)>> {
        let path = normalize_path(path);
        let left = self.coverage(&path, from)?.unwrap_or_default();
        let right = self.coverage(&path, to)?.unwrap_or_default();

        let (mut l, mut r) = (0, 0);
        let mut rows = Vec::new();
        for (op, text) in self.source.diff(&path, from, to)? {
            let (count1, count2) = (left.get(l), right.get(r));
            let row = DiffLine {
                lineno: op.touches_curr().then_some(r + 1),
                left: op.touches_prev().then(|| (count1, text.clone())),
                right: op.touches_curr().then(|| (count2, text)),
            };
            let show = op != LineOp::Common || LineState::of(count1) != LineState::of(count2);
            rows.push((row, show));
            if op.touches_prev() {
                l += 1;
            }
            if op.touches_curr() {
                r += 1;
            }
        }
        Ok(rows)
    }

    /// Changed revisions of one entity, ascending, with totals and summed
    /// changes. Deleted markers count.
    pub fn timeline(&self, kind: PathType, path: &str, filter: &Matcher) -> Vec<TimelineEntry> {
        let path = normalize_path(path);
        let mut by_date: BTreeMap<Revision, (u64, u64, Option<ChangeSummary>)> = BTreeMap::new();
        let mut add = |date, hit: Option<u64>, found: Option<u64>, change: Option<ChangeSummary>| {
            let entry = by_date.entry(date).or_insert((0, 0, None));
            entry.0 += hit.unwrap_or(0);
            entry.1 += found.unwrap_or(0);
            if let Some(change) = change {
                let mut sum = entry.2.unwrap_or_default();
                sum += &change;
                entry.2 = Some(sum);
            }
        };
        match kind {
            PathType::Top | PathType::Dir => {
                let dir = (kind == PathType::Dir).then(|| dir_key(&path));
                for row in self
                    .dir_rows(filter)
                    .filter(|row| dir.as_ref().map_or(true, |d| &row.dir == d))
                {
                    add(row.date, row.hit, row.found, row.change);
                }
            }
            PathType::File => {
                let (dir, file, _) = split_path(&path);
                for row in self.file_rows(filter).filter(|row| row.dir == dir && row.file == file) {
                    add(row.date, row.hit, row.found, row.change.as_ref().map(ChangeSummary::from));
                }
            }
        }
        by_date
            .into_iter()
            .filter_map(|(date, (hit, found, change))| {
                change.map(|change| TimelineEntry { date, hit, found, change: Some(change) })
            })
            .collect()
    }

    /// Page of `2 * win + 1` changed revisions around `date`.
    pub fn changes(
        &self,
        win: usize,
        kind: PathType,
        path: &str,
        date: Revision,
        filter: &Matcher,
    ) -> Result<HistoryPage> {
        pager::page(&self.timeline(kind, path, filter), date, win)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("."), "");
        assert_eq!(normalize_path("./foo/"), "foo");
        assert_eq!(normalize_path("foo//test1.c"), "foo/test1.c");
        assert_eq!(normalize_path("foo/../bar/x.y"), "bar/x.y");
    }

    #[test]
    fn test_init_and_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path().join("data");
        assert!(!Store::is_initialized(&root));
        assert!(matches!(Store::open(&root), Err(Error::NotInitialized)));

        let store = Store::init(&root).unwrap();
        assert!(Store::is_initialized(&root));
        assert_eq!(store.last_registered_date(), None);
        assert_eq!(store.first_date(&Matcher::all()), None);
        assert!(matches!(Store::init(&root), Err(Error::AlreadyInitialized)));

        let store = Store::open(&root).unwrap();
        assert_eq!(store.path_type(".", &Matcher::all()), Some(PathType::Top));
        assert_eq!(store.path_type("foo", &Matcher::all()), None);
    }
}
