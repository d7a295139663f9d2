use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Narrows list, history and changes queries.
///
/// `incl` and `excl` hold comma-separated glob patterns matched against
/// directory paths such as `foo/`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    pub adapter: Option<String>,
    pub ext: Option<String>,
    pub incl: Option<String>,
    pub excl: Option<String>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        *self == Filter::default()
    }

    /// Fields set in `other` override those of `self`.
    pub fn merged(&self, other: &Filter) -> Filter {
        Filter {
            adapter: other.adapter.clone().or_else(|| self.adapter.clone()),
            ext: other.ext.clone().or_else(|| self.ext.clone()),
            incl: other.incl.clone().or_else(|| self.incl.clone()),
            excl: other.excl.clone().or_else(|| self.excl.clone()),
        }
    }

    pub fn compile(&self) -> Result<Matcher> {
        Ok(Matcher {
            adapter: self.adapter.clone(),
            ext: self.ext.clone(),
            incl: self.incl.as_deref().map(glob_set).transpose()?,
            excl: self.excl.as_deref().map(glob_set).transpose()?,
        })
    }
}

fn glob_set(patterns: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// A compiled [`Filter`].
#[derive(Clone, Debug)]
pub struct Matcher {
    adapter: Option<String>,
    ext: Option<String>,
    incl: Option<GlobSet>,
    excl: Option<GlobSet>,
}

impl Matcher {
    pub fn all() -> Self {
        Self { adapter: None, ext: None, incl: None, excl: None }
    }

    pub fn matches(&self, dir: &str, ext: Option<&str>, adapter: &str) -> bool {
        if let Some(want) = &self.adapter {
            if want != adapter {
                return false;
            }
        }
        if let Some(want) = &self.ext {
            if ext != Some(want.as_str()) {
                return false;
            }
        }
        if let Some(incl) = &self.incl {
            if !incl.is_match(dir) {
                return false;
            }
        }
        if let Some(excl) = &self.excl {
            if excl.is_match(dir) {
                return false;
            }
        }
        true
    }
}
