//! Durable catalog records for a run.
//!
//! Records are sorted-key pretty JSON so external tools and humans can diff
//! them; a missing record is reported separately from a corrupt one.
use crate::paths::RunPaths;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Which catalog a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Calibration,
    Step,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Calibration => f.write_str("calibration"),
            Namespace::Step => f.write_str("step"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// No record has been saved yet (expected on a first run).
    #[error("no {namespace} record at {}", .path.display())]
    NotFound { namespace: Namespace, path: PathBuf },

    #[error("corrupt {namespace} record at {}: {source}", .path.display())]
    Corrupt {
        namespace: Namespace,
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("serialize {namespace} record: {source}")]
    Serialize {
        namespace: Namespace,
        source: serde_json::Error,
    },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// File-backed store for the two catalogs of one run.
#[derive(Debug, Clone)]
pub struct StateStore {
    paths: RunPaths,
}

impl StateStore {
    pub fn new(paths: RunPaths) -> Self {
        Self { paths }
    }

    /// Return the file backing a namespace.
    pub fn path(&self, namespace: Namespace) -> PathBuf {
        match namespace {
            Namespace::Calibration => self.paths.caldata_path(),
            Namespace::Step => self.paths.stepdata_path(),
        }
    }

    /// Persist a record atomically (temporary sibling, then rename).
    pub fn save<T: Serialize>(&self, namespace: Namespace, record: &T) -> Result<(), StoreError> {
        let path = self.path(namespace);
        let mut text = serde_json::to_string_pretty(record)
            .map_err(|source| StoreError::Serialize { namespace, source })?;
        text.push('\n');
        write_atomic(&path, text.as_bytes())
    }

    pub fn load<T: DeserializeOwned>(&self, namespace: Namespace) -> Result<T, StoreError> {
        let path = self.path(namespace);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound { namespace, path });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            namespace,
            path,
            source,
        })
    }

    /// Load a record, treating "no prior state" as the default value.
    pub fn load_or_default<T: DeserializeOwned + Default>(
        &self,
        namespace: Namespace,
    ) -> Result<T, StoreError> {
        match self.load(namespace) {
            Err(err) if err.is_not_found() => {
                tracing::debug!(%namespace, "no prior state; starting empty");
                Ok(T::default())
            }
            other => other,
        }
    }
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(io_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.persist(path).map_err(|err| io_err(err.error))?;
    Ok(())
}
