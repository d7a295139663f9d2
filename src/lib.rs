//! # Continuous Coverage History
//!
//! `covhist` records line coverage of a source tree once per day and lets you
//! browse how coverage evolved. Each registered revision stores the source
//! text in a bare git repository and the per-line hit counts beside it, so
//! changes between revisions can be attributed to code changes or to
//! coverage changes.
//!
//! ## Features
//!
//! - Parse `gcov` and `rbcov` coverage reports
//! - Register a whole source tree per day, with deleted files tracked
//! - Classify per-file changes (created, deleted, modified, changed)
//! - Directory and file summaries for any set of days
//! - Annotated source views and line diffs, windowed around what matters
//! - Paged history of the days on which coverage changed
//!
//! ## Example
//!
//! ```no_run
//! use covhist::store::{Matcher, Store};
//! use covhist::{parser, register, Revision};
//! use globset::GlobSet;
//! use std::path::Path;
//!
//! # async fn run() -> covhist::Result<()> {
//! let mut store = Store::init(Path::new("data"))?;
//! let files = parser::gather(Path::new("reports"), &GlobSet::empty(), |_| {})?;
//! register(&mut store, Revision::today(), files, None).await?;
//! println!("{:?}", store.last_date(&Matcher::all()));
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod error;
pub mod parser;
pub mod store;
pub mod types;
pub mod utils;
pub mod view;

// Re-export main types for convenience
pub use analysis::{register, CapturedFile};
pub use config::Config;
pub use error::{Error, Result};
pub use store::Store;
pub use types::{ChangeKind, ChangeRecord, ChangeSummary, CoverageVector, LineOp, Revision};
pub use view::View;
