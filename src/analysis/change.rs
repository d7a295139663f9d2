use log::debug;

use crate::error::{Error, Result};
use crate::types::{ChangeKind, ChangeRecord, CoverageVector, LineOp};

/// How the caller knows the file changed between two revisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectMode {
    /// Text is unchanged; vectors are compared line by line.
    Unspecified,
    /// Text changed; an alignment maps old lines to new lines.
    Modified,
    /// The file no longer exists.
    Deleted,
}

#[derive(Default)]
struct Counters {
    code_inc: u64,
    code_dec: u64,
    cov_inc: u64,
    cov_dec: u64,
}

impl Counters {
    fn transition(&mut self, prev_covered: bool, curr_covered: bool) {
        match (prev_covered, curr_covered) {
            (false, true) => self.cov_inc += 1,
            (true, false) => self.cov_dec += 1,
            _ => {}
        }
    }

    fn classify(self) -> Option<ChangeRecord> {
        let kind = if self.code_inc > 0 || self.code_dec > 0 {
            ChangeKind::Modified
        } else if self.cov_inc > 0 || self.cov_dec > 0 {
            ChangeKind::Changed
        } else {
            return None;
        };
        Some(ChangeRecord {
            kind,
            code_inc: self.code_inc,
            code_dec: self.code_dec,
            cov_inc: self.cov_inc,
            cov_dec: self.cov_dec,
        })
    }
}

/// Compare two coverage snapshots of one file.
///
/// `prev` is `None` when the file did not exist before (or was a deleted
/// marker). Returns `Ok(None)` when nothing changed.
pub fn detect(
    prev: Option<&CoverageVector>,
    curr: Option<&CoverageVector>,
    mode: DetectMode,
    alignment: Option<&[LineOp]>,
) -> Result<Option<ChangeRecord>> {
    let prev = match prev {
        Some(prev) => prev,
        None => {
            return Ok(curr.map(|curr| ChangeRecord::created(curr.len() as u64, curr.hit())));
        }
    };

    let mut counters = Counters::default();

    match mode {
        DetectMode::Deleted => {
            return Ok(Some(ChangeRecord::deleted(prev.len() as u64, prev.hit())));
        }
        DetectMode::Modified => {
            let curr = curr.ok_or(Error::MissingCoverage)?;
            let alignment = alignment.ok_or(Error::MissingAlignment)?;
            let (mut p, mut c) = (0, 0);
            for op in alignment {
                match op {
                    LineOp::Add => {
                        counters.code_inc += 1;
                        if curr.state(c).is_covered() {
                            counters.cov_inc += 1;
                        }
                        c += 1;
                    }
                    LineOp::Del => {
                        counters.code_dec += 1;
                        if prev.state(p).is_covered() {
                            counters.cov_dec += 1;
                        }
                        p += 1;
                    }
                    LineOp::Common => {
                        counters.transition(prev.state(p).is_covered(), curr.state(c).is_covered());
                        p += 1;
                        c += 1;
                    }
                }
            }
        }
        DetectMode::Unspecified => {
            let curr = curr.ok_or(Error::MissingCoverage)?;
            if prev.len() != curr.len() {
                return Err(Error::LengthMismatch { prev: prev.len(), curr: curr.len() });
            }
            for i in 0..curr.len() {
                counters.transition(prev.state(i).is_covered(), curr.state(i).is_covered());
            }
        }
    }

    let record = counters.classify();
    debug!("detected {:?} ({:?})", record.map(|r| r.kind), mode);
    Ok(record)
}
