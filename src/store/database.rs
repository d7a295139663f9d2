use git2::Oid;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::types::{ChangeRecord, ChangeSummary, Revision};

const FORMAT_VERSION: u32 = 1;

/// Timeline row of one file at one revision.
///
/// A row with no coverage is a deleted marker: the file existed at the
/// previous revision but not at this one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRow {
    pub date: Revision,
    /// Directory with a trailing slash, `./` for the top level.
    pub dir: String,
    pub file: String,
    pub ext: Option<String>,
    pub adapter: String,
    /// Blob holding the encoded coverage vector.
    pub coverage: Option<String>,
    pub hit: Option<u64>,
    pub found: Option<u64>,
    pub change: Option<ChangeRecord>,
}

impl FileRow {
    pub fn path(&self) -> String {
        if self.dir == "./" {
            self.file.clone()
        } else {
            format!("{}{}", self.dir, self.file)
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.hit.is_none()
    }

    pub fn coverage_blob(&self) -> Result<Option<Oid>> {
        self.coverage
            .as_deref()
            .map(|id| Oid::from_str(id).map_err(Error::from))
            .transpose()
    }
}

/// Sum of the file rows of one `(dir, ext, adapter)` group at one revision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirRow {
    pub date: Revision,
    pub dir: String,
    pub ext: Option<String>,
    pub adapter: String,
    /// `None` when every file of the group is a deleted marker.
    pub hit: Option<u64>,
    pub found: Option<u64>,
    pub change: Option<ChangeSummary>,
}

impl DirRow {
    pub fn is_deleted(&self) -> bool {
        self.hit.is_none()
    }
}

/// Split `foo/bar.c` into (`foo/`, `bar.c`, `Some("c")`).
pub fn split_path(path: &str) -> (String, String, Option<String>) {
    let (dir, file) = match path.rfind('/') {
        Some(idx) => (path[..=idx].to_string(), path[idx + 1..].to_string()),
        None => ("./".to_string(), path.to_string()),
    };
    let ext = match file.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < file.len() => Some(file[idx + 1..].to_string()),
        _ => None,
    };
    (dir, file, ext)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    revisions: BTreeSet<Revision>,
    files: Vec<FileRow>,
    dirs: Vec<DirRow>,
}

/// The timeline document: file rows, directory rows and registered revisions.
///
/// Rows are kept sorted by date, so appending a revision keeps the order.
#[derive(Clone, Debug)]
pub struct Database {
    path: PathBuf,
    doc: Document,
}

impl Database {
    /// Create an empty document at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(Error::AlreadyInitialized);
        }
        let db = Self {
            path: path.to_path_buf(),
            doc: Document { version: FORMAT_VERSION, ..Default::default() },
        };
        db.save()?;
        Ok(db)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let text = match fs::read(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::NotInitialized),
            Err(e) => return Err(e.into()),
        };
        let doc: Document = serde_json::from_slice(&text)?;
        debug!(
            "opened {} ({} revisions, {} file rows)",
            path.display(),
            doc.revisions.len(),
            doc.files.len()
        );
        Ok(Self { path: path.to_path_buf(), doc })
    }

    /// Replace the document on disk atomically.
    pub fn save(&self) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut tmp, &self.doc)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    pub fn revisions(&self) -> &BTreeSet<Revision> {
        &self.doc.revisions
    }

    pub fn last_registered(&self) -> Option<Revision> {
        self.doc.revisions.iter().next_back().copied()
    }

    pub fn add_revision(&mut self, rev: Revision) {
        self.doc.revisions.insert(rev);
    }

    pub fn files(&self) -> &[FileRow] {
        &self.doc.files
    }

    pub fn dirs(&self) -> &[DirRow] {
        &self.doc.dirs
    }

    pub fn files_at(&self, date: Revision) -> impl Iterator<Item = &FileRow> {
        let start = self.doc.files.partition_point(|row| row.date < date);
        self.doc.files[start..].iter().take_while(move |row| row.date == date)
    }

    /// Latest row of `path`, deleted markers included.
    pub fn last_file_row(&self, path: &str) -> Option<&FileRow> {
        let (dir, file, _) = split_path(path);
        self.doc
            .files
            .iter()
            .rev()
            .find(|row| row.dir == dir && row.file == file)
    }

    pub fn insert_file(&mut self, row: FileRow) {
        let idx = self.doc.files.partition_point(|r| r.date <= row.date);
        self.doc.files.insert(idx, row);
    }

    pub fn insert_dir(&mut self, row: DirRow) {
        let idx = self.doc.dirs.partition_point(|r| r.date <= row.date);
        self.doc.dirs.insert(idx, row);
    }
}

/// Exclusive lock on a data directory, released on drop.
///
/// The file holds the owner's process id. A process killed while holding the
/// lock leaves it behind, and it has to be removed by hand.
#[derive(Debug)]
pub struct Lock {
    path: PathBuf,
    _file: File,
}

impl Lock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join("lock");
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::Locked(path.clone()),
                _ => Error::Io(e),
            })?;
        if let Err(e) = writeln!(file, "{}", std::process::id()) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }
        debug!("locked {}", path.display());
        Ok(Self { path, _file: file })
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
