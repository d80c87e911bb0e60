//! Calibration and step-output catalogs.
//!
//! Both catalogs serialize as sorted-key maps so the persisted files diff
//! cleanly between runs.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Observation-type tag to staged artifact set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationCatalog {
    entries: BTreeMap<String, Vec<PathBuf>>,
}

impl CalibrationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append staged paths to a tag, preserving resolution order.
    pub fn append(&mut self, tag: &str, paths: impl IntoIterator<Item = PathBuf>) {
        self.entries.entry(tag.to_string()).or_default().extend(paths);
    }

    pub fn get(&self, tag: &str) -> Option<&[PathBuf]> {
        self.entries.get(tag).map(Vec::as_slice)
    }

    /// True when the tag exists with at least one artifact.
    pub fn contains(&self, tag: &str) -> bool {
        self.get(tag).is_some_and(|paths| !paths.is_empty())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Step-output name to produced artifact paths; only ever extended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOutputCatalog {
    entries: BTreeMap<String, Vec<PathBuf>>,
}

impl StepOutputCatalog {
    /// Record the artifacts produced under `key`, replacing an earlier record
    /// of the same key when a step is re-executed.
    pub fn record(&mut self, key: &str, paths: Vec<PathBuf>) {
        self.entries.insert(key.to_string(), paths);
    }

    pub fn get(&self, key: &str) -> Option<&[PathBuf]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Render a path list for log lines.
pub fn describe_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| file_name(path))
        .collect::<Vec<_>>()
        .join(", ")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
