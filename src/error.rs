use std::path::PathBuf;
use thiserror::Error;

use crate::types::Revision;

/// Errors produced by the coverage history engine and its stores
#[derive(Debug, Error)]
pub enum Error {
    #[error("radius must be at least 1 (got {0})")]
    InvalidRadius(usize),

    #[error("window must be at least 1")]
    InvalidWindow,

    #[error("a modified file needs a line alignment")]
    MissingAlignment,

    #[error("coverage lengths differ for unchanged text ({prev} vs {curr})")]
    LengthMismatch { prev: usize, curr: usize },

    #[error("current coverage is missing for a file that is not deleted")]
    MissingCoverage,

    #[error("date must be newer than last date ({0})")]
    DateNotNewer(Revision),

    #[error("already initialized")]
    AlreadyInitialized,

    #[error("database is not initialized")]
    NotInitialized,

    #[error(
        "database is locked by another process; remove {} if no registration is running",
        .0.display()
    )]
    Locked(PathBuf),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("invalid view: {0}")]
    InvalidView(String),

    #[error("chart mode cannot be used in command-line interface")]
    ChartUnsupported,

    #[error("no coverage registered")]
    NoCoverage,

    #[error("unknown query: {0}")]
    UnknownQuery(String),

    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("no such file or directory in history: {0}")]
    UnknownPath(String),

    #[error("revision {0} is not registered")]
    UnknownRevision(Revision),

    #[error("corrupt source store: {0}")]
    CorruptStore(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Glob(#[from] globset::Error),
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Task(e.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
