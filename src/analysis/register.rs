use git2::Oid;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::spawn_blocking;

use super::change::{detect, DetectMode};
use crate::error::{Error, Result};
use crate::store::source::TreeFiles;
use crate::store::{split_path, Database, FileRow, Lock, SourceRepo, Store};
use crate::types::{ChangeRecord, CoverageVector, ProgressEstimate, Revision};
use crate::utils::aggregation::aggregate_files;

pub const REGISTER_STAGE: &str = "register to database";

/// One source file captured from coverage reports, ready to be registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedFile {
    /// Path relative to the source root, `/`-separated.
    pub path: String,
    /// Name of the parser that produced the coverage.
    pub adapter: String,
    pub source: Vec<u8>,
    pub coverage: CoverageVector,
}

/// What a registration wrote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterReport {
    pub registered: usize,
    pub deleted: usize,
    pub skipped: usize,
    /// Day registered as an empty tree because the previous revision is not
    /// the day before.
    pub gap: Option<Revision>,
}

struct DetectJob {
    path: String,
    mode: DetectMode,
    prev: Option<(Revision, Arc<CoverageVector>)>,
    blob: Oid,
    curr: Arc<CoverageVector>,
}

struct Prepared {
    path: String,
    adapter: String,
    blob: Oid,
    coverage_blob: Oid,
    coverage: Arc<CoverageVector>,
}

/// Get chunk size for change detection based on file count
fn get_optimal_chunk_size(total_files: usize) -> usize {
    const MIN_CHUNK_SIZE: usize = 16;
    const MAX_CHUNK_SIZE: usize = 256;

    (total_files / get_optimal_task_count()).clamp(MIN_CHUNK_SIZE, MAX_CHUNK_SIZE)
}

/// Get optimal number of parallel tasks based on system resources
fn get_optimal_task_count() -> usize {
    let cpu_count = num_cpus::get();
    (cpu_count * 3 / 4).max(1)
}

async fn report(progress: &Option<mpsc::Sender<ProgressEstimate>>, estimate: ProgressEstimate) {
    if let Some(tx) = progress {
        // a dropped receiver only means nobody is watching
        let _ = tx.send(estimate).await;
    }
}

fn line_count(source: &[u8]) -> usize {
    String::from_utf8_lossy(source).lines().count()
}

fn marker_row(date: Revision, row: &FileRow, change: Option<ChangeRecord>) -> FileRow {
    FileRow {
        date,
        dir: row.dir.clone(),
        file: row.file.clone(),
        ext: row.ext.clone(),
        adapter: row.adapter.clone(),
        coverage: None,
        hit: None,
        found: None,
        change,
    }
}

/// Deleted marker for a file that was alive in `row`.
fn deleted_marker(store: &Store, date: Revision, row: &FileRow) -> Result<FileRow> {
    let prev = match row.coverage_blob()? {
        Some(blob) => store.load_coverage(blob)?,
        None => return Err(Error::CorruptStore(format!("{} has no coverage", row.path()))),
    };
    let change = detect(Some(prev.as_ref()), None, DetectMode::Deleted, None)?;
    Ok(marker_row(date, row, change))
}

fn rebuild_dirs(db: &mut Database, date: Revision) {
    let dirs = aggregate_files(date, db.files_at(date));
    for dir in dirs {
        db.insert_dir(dir);
    }
}

fn detect_chunk(repo_path: &Path, chunk: Vec<DetectJob>) -> Result<Vec<Option<ChangeRecord>>> {
    let source = SourceRepo::open(repo_path)?;
    chunk
        .iter()
        .map(|job| {
            let alignment = match (&job.prev, job.mode) {
                (Some((date, _)), DetectMode::Modified) => Some(source.alignment(&job.path, *date, job.blob)?),
                _ => None,
            };
            let change = detect(
                job.prev.as_ref().map(|(_, prev)| prev.as_ref()),
                Some(job.curr.as_ref()),
                job.mode,
                alignment.as_deref(),
            )?;
            debug!("{}: {:?}", job.path, change.map(|c| c.kind));
            Ok(change)
        })
        .collect()
}

/// Run change detection in parallel chunks, keeping the input order.
async fn detect_parallel(
    repo_path: PathBuf,
    jobs: Vec<DetectJob>,
    progress: &Option<mpsc::Sender<ProgressEstimate>>,
) -> Result<Vec<Option<ChangeRecord>>> {
    let start_time = Instant::now();
    let total = jobs.len();
    let chunk_size = get_optimal_chunk_size(total);
    let max_tasks = get_optimal_task_count();
    let semaphore = Arc::new(Semaphore::new(max_tasks));

    let mut handles = Vec::new();
    let mut jobs = jobs.into_iter().peekable();
    while jobs.peek().is_some() {
        let chunk: Vec<DetectJob> = jobs.by_ref().take(chunk_size).collect();
        let repo_path = repo_path.clone();
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| Error::Task(format!("failed to acquire semaphore: {}", e)))?;

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            match spawn_blocking(move || detect_chunk(&repo_path, chunk)).await {
                Ok(result) => result,
                Err(e) => Err(Error::from(e)),
            }
        }));
    }

    let mut changes = Vec::with_capacity(total);
    for handle in handles {
        for change in handle.await?? {
            changes.push(change);
            report(
                progress,
                ProgressEstimate { stage: REGISTER_STAGE, processed: changes.len(), total: Some(total) },
            )
            .await;
        }
    }

    debug!(
        "detected changes of {} files in {:.2}s (chunk size {}, {} tasks)",
        total,
        start_time.elapsed().as_secs_f64(),
        chunk_size,
        max_tasks
    );
    Ok(changes)
}

/// Register `files` as the revision at `date`.
///
/// The timeline is re-read from disk once the lock is held. Everything is
/// written to a copy of it that replaces the store's only once the source
/// commits and the document save succeeded.
pub async fn register(
    store: &mut Store,
    date: Revision,
    files: Vec<CapturedFile>,
    progress: Option<mpsc::Sender<ProgressEstimate>>,
) -> Result<RegisterReport> {
    let _lock = Lock::acquire(&store.root)?;
    store.reload()?;
    let mut db = store.db.clone();
    let mut summary = RegisterReport::default();
    let mut pending: Vec<(Revision, Oid, Oid)> = Vec::new();

    let mut baseline = match db.last_registered() {
        Some(last) if date <= last => return Err(Error::DateNotNewer(last)),
        Some(last) => Some(store.source.tree_id(last)?),
        None => None,
    };

    if let Some(last) = db.last_registered() {
        let next = last.succ();
        let alive: Vec<FileRow> = db.files_at(last).filter(|row| !row.is_deleted()).cloned().collect();
        if next < date && !alive.is_empty() {
            for row in &alive {
                db.insert_file(deleted_marker(store, next, row)?);
            }
            rebuild_dirs(&mut db, next);
            let empty = store.source.empty_tree()?;
            pending.push((next, empty, empty));
            db.add_revision(next);
            baseline = Some(empty);
            summary.gap = Some(next);
            info!("{} files deleted at {}", alive.len(), next);
        }
    }

    let (files, skipped): (Vec<_>, Vec<_>) = files.into_iter().partition(|f| !f.coverage.is_blank());
    for file in &skipped {
        debug!("{}: no coverable line, skipped", file.path);
    }
    summary.skipped = skipped.len();
    if files.is_empty() {
        warn!("nothing to register found; empty tree will be registered");
    }

    let mut tree_files = TreeFiles::new();
    let mut coverage_files = TreeFiles::new();
    let mut prepared = Vec::with_capacity(files.len());
    for mut file in files {
        if tree_files.contains_key(&file.path) {
            warn!("{}: captured twice, keeping the first", file.path);
            continue;
        }
        file.coverage.resize_to(line_count(&file.source));
        let blob = store.source.write_blob(&file.source)?;
        let coverage_blob = store.source.write_coverage(&file.coverage)?;
        tree_files.insert(file.path.clone(), blob);
        coverage_files.insert(file.path.clone(), coverage_blob);
        prepared.push(Prepared {
            path: file.path,
            adapter: file.adapter,
            blob,
            coverage_blob,
            coverage: Arc::new(file.coverage),
        });
    }
    let tree = store.source.build_tree(&tree_files)?;
    let coverage_tree = store.source.build_tree(&coverage_files)?;
    let modified: Option<BTreeSet<String>> = baseline
        .map(|old| store.source.modified_paths(old, tree))
        .transpose()?;

    let mut jobs = Vec::with_capacity(prepared.len());
    for file in &prepared {
        let mode = match &modified {
            Some(paths) if !paths.contains(&file.path) => DetectMode::Unspecified,
            _ => DetectMode::Modified,
        };
        let prev = match db.last_file_row(&file.path).filter(|row| !row.is_deleted()) {
            Some(row) => match row.coverage_blob()? {
                Some(blob) => Some((row.date, store.load_coverage(blob)?)),
                None => None,
            },
            None => None,
        };
        jobs.push(DetectJob {
            path: file.path.clone(),
            mode,
            prev,
            blob: file.blob,
            curr: file.coverage.clone(),
        });
    }

    let changes = detect_parallel(store.source.path(), jobs, &progress).await?;

    for (file, change) in prepared.iter().zip(changes) {
        let (dir, name, ext) = split_path(&file.path);
        db.insert_file(FileRow {
            date,
            dir,
            file: name,
            ext,
            adapter: file.adapter.clone(),
            coverage: Some(file.coverage_blob.to_string()),
            hit: Some(file.coverage.hit()),
            found: Some(file.coverage.found()),
            change,
        });
    }
    summary.registered = prepared.len();

    for path in modified.iter().flatten().filter(|p| !tree_files.contains_key(*p)) {
        let alive = db.last_file_row(path).filter(|row| !row.is_deleted()).cloned();
        if let Some(row) = alive {
            db.insert_file(deleted_marker(store, date, &row)?);
            summary.deleted += 1;
        }
    }

    rebuild_dirs(&mut db, date);
    pending.push((date, tree, coverage_tree));
    db.add_revision(date);

    for (rev, tree, coverage) in pending {
        store.source.commit(rev, tree, coverage)?;
    }
    db.save()?;
    store.db = db;

    info!(
        "registered {}: {} files, {} deleted, {} skipped",
        date, summary.registered, summary.deleted, summary.skipped
    );
    Ok(summary)
}
