use git2::build::TreeUpdateBuilder;
use git2::{DiffOptions, FileMode, ObjectType, Oid, Patch, Repository, Signature, Tree, TreeWalkMode, TreeWalkResult};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{CoverageVector, LineOp, Revision};

const BRANCH: &str = "refs/heads/main";
const COMMITTER: &str = "covhist";

/// Source tree of one revision: path to blob.
pub type TreeFiles = BTreeMap<String, Oid>;

/// Git-backed store of source text and encoded coverage vectors.
///
/// Each registered revision is a commit on `main` tagged `YYYYmmdd`.
pub struct SourceRepo {
    repo: Repository,
}

impl SourceRepo {
    pub fn init(path: &Path) -> Result<Self> {
        let repo = Repository::init_bare(path)?;
        Ok(Self { repo })
    }

    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open_bare(path)?;
        Ok(Self { repo })
    }

    pub fn path(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    /// libgit2 version, for `info`.
    pub fn version() -> String {
        let v = git2::Version::get();
        let (major, minor, rev) = v.libgit2_version();
        format!("libgit2 {}.{}.{}", major, minor, rev)
    }

    pub fn write_blob(&self, bytes: &[u8]) -> Result<Oid> {
        Ok(self.repo.blob(bytes)?)
    }

    /// Encode a coverage vector as a blob. Git compresses it on disk.
    pub fn write_coverage(&self, coverage: &CoverageVector) -> Result<Oid> {
        let bytes = serde_json::to_vec(coverage)?;
        self.write_blob(&bytes)
    }

    pub fn read_coverage(&self, blob: Oid) -> Result<CoverageVector> {
        let blob = self.repo.find_blob(blob)?;
        Ok(serde_json::from_slice(blob.content())?)
    }

    fn tree_at(&self, rev: Revision) -> Result<Tree<'_>> {
        let name = format!("refs/tags/{}", rev.to_path());
        let reference = self
            .repo
            .find_reference(&name)
            .map_err(|_| Error::UnknownRevision(rev))?;
        Ok(reference.peel_to_tree()?)
    }

    pub fn has_revision(&self, rev: Revision) -> bool {
        self.tree_at(rev).is_ok()
    }

    /// Every file of the tree registered at `rev`.
    pub fn files(&self, rev: Revision) -> Result<TreeFiles> {
        let tree = self.tree_at(rev)?;
        let mut files = TreeFiles::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    files.insert(format!("{}{}", root, name), entry.id());
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(files)
    }

    /// Blob of `path` at `rev`, if the file exists there.
    pub fn blob_at(&self, path: &str, rev: Revision) -> Result<Option<Oid>> {
        let tree = self.tree_at(rev)?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(_) => return Ok(None),
        };
        Ok((entry.kind() == Some(ObjectType::Blob)).then(|| entry.id()))
    }

    /// Text of `path` at `rev`, split into lines without terminators.
    pub fn lines(&self, path: &str, rev: Revision) -> Result<Option<Vec<String>>> {
        match self.blob_at(path, rev)? {
            Some(blob) => Ok(Some(split_lines(self.repo.find_blob(blob)?.content()))),
            None => Ok(None),
        }
    }

    /// Tree registered at `rev`.
    pub fn tree_id(&self, rev: Revision) -> Result<Oid> {
        Ok(self.tree_at(rev)?.id())
    }

    pub fn empty_tree(&self) -> Result<Oid> {
        Ok(self.repo.treebuilder(None)?.write()?)
    }

    /// Write the tree for `files` without committing it.
    pub fn build_tree(&self, files: &TreeFiles) -> Result<Oid> {
        let empty = self.repo.find_tree(self.empty_tree()?)?;
        let mut update = TreeUpdateBuilder::new();
        for (path, blob) in files {
            update.upsert(path.as_str(), *blob, FileMode::Blob);
        }
        Ok(update.create_updated(&self.repo, &empty)?)
    }

    /// Paths that differ between two trees, including added and removed
    /// files.
    pub fn modified_paths(&self, old: Oid, new: Oid) -> Result<BTreeSet<String>> {
        let old = self.repo.find_tree(old)?;
        let new = self.repo.find_tree(new)?;
        let diff = self.repo.diff_tree_to_tree(Some(&old), Some(&new), None)?;
        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            for file in [delta.old_file(), delta.new_file()] {
                if let Some(path) = file.path().and_then(Path::to_str) {
                    paths.insert(path.to_string());
                }
            }
        }
        Ok(paths)
    }

    /// Commit `tree` as revision `rev` and tag it. `coverage` is the tree of
    /// coverage blobs, referenced so that the blobs stay reachable.
    pub fn commit(&self, rev: Revision, tree: Oid, coverage: Oid) -> Result<Oid> {
        let tree = self.repo.find_tree(tree)?;
        let signature = Signature::now(COMMITTER, "covhist@localhost")?;
        let parent = self
            .repo
            .find_reference(BRANCH)
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        let commit = self.repo.commit(
            Some(BRANCH),
            &signature,
            &signature,
            &rev.to_path(),
            &tree,
            &parents,
        )?;
        self.repo.reference(
            &format!("refs/tags/{}", rev.to_path()),
            commit,
            true,
            "register revision",
        )?;
        self.repo.reference(
            &format!("refs/coverage/{}", rev.to_path()),
            coverage,
            true,
            "register coverage",
        )?;
        debug!("committed {} as {}", rev, commit);
        Ok(commit)
    }

    /// Line alignment from the file at `prev` to the blob `new`.
    pub fn alignment(&self, path: &str, prev: Revision, new: Oid) -> Result<Vec<LineOp>> {
        let old = match self.blob_at(path, prev)? {
            Some(blob) => self.repo.find_blob(blob)?.content().to_vec(),
            None => Vec::new(),
        };
        let new = self.repo.find_blob(new)?;
        Ok(align(&old, new.content())?.into_iter().map(|(op, _)| op).collect())
    }

    /// Line diff of `path` between two revisions. A side where the file is
    /// missing counts as empty.
    pub fn diff(&self, path: &str, from: Revision, to: Revision) -> Result<Vec<(LineOp, String)>> {
        let read = |rev| -> Result<Vec<u8>> {
            match self.blob_at(path, rev)? {
                Some(blob) => Ok(self.repo.find_blob(blob)?.content().to_vec()),
                None => Ok(Vec::new()),
            }
        };
        align(&read(from)?, &read(to)?)
    }
}

/// Whitespace-change-insensitive alignment of two texts, with the text of
/// each step. Identical texts (or texts that differ only in whitespace)
/// align as all-common over the newer text.
pub fn align(old: &[u8], new: &[u8]) -> Result<Vec<(LineOp, String)>> {
    let mut opts = DiffOptions::new();
    opts.ignore_whitespace_change(true)
        .force_text(true)
        .context_lines(1_000_000_000)
        .interhunk_lines(1_000_000_000);

    let patch = Patch::from_buffers(old, None, new, None, Some(&mut opts))?;
    if patch.num_hunks() == 0 {
        return Ok(split_lines(new).into_iter().map(|l| (LineOp::Common, l)).collect());
    }

    let mut steps = Vec::new();
    for hunk in 0..patch.num_hunks() {
        for idx in 0..patch.num_lines_in_hunk(hunk)? {
            let line = patch.line_in_hunk(hunk, idx)?;
            let op = match line.origin() {
                ' ' => LineOp::Common,
                '+' => LineOp::Add,
                '-' => LineOp::Del,
                _ => continue,
            };
            let text = String::from_utf8_lossy(line.content());
            steps.push((op, text.trim_end_matches(['\n', '\r']).to_string()));
        }
    }
    Ok(steps)
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}
