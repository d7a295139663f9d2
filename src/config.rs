use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::Filter;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG: &str = "covhist.toml";

/// Settings read from `covhist.toml`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the timeline document, the source store and the lock
    pub database_path: PathBuf,
    /// Glob patterns of source paths that are never registered
    pub skip_files: Vec<String>,
    /// Named filter presets, selected with `--query`
    pub custom_query: BTreeMap<String, Filter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data"),
            skip_files: Vec::new(),
            custom_query: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("loading configuration from {}", path.display());
        Self::from_toml(&fs::read_to_string(path)?)
    }

    /// Load the explicit file if given, else the first of `./covhist.toml` and
    /// `<config dir>/covhist/config.toml` that exists, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let candidates = [Some(PathBuf::from(LOCAL_CONFIG)), user_config_path()];
        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }
        debug!("no configuration file found; using defaults");
        Ok(Self::default())
    }

    pub fn skip_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.skip_files {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }

    pub fn query(&self, name: &str) -> Result<&Filter> {
        self.custom_query
            .get(name)
            .ok_or_else(|| Error::UnknownQuery(name.to_string()))
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("covhist").join("config.toml"))
}
