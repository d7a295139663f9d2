pub mod cache;
pub mod change;
pub mod pager;
pub mod register;
pub mod snipper;

pub use cache::CoverageCache;
pub use change::{detect, DetectMode};
pub use pager::{page, HistoryPage, PageEntry};
pub use register::{register, CapturedFile, RegisterReport};
pub use snipper::{nth_hunk, snip, Hunk, Snipper};
