//! Stage raw inputs into the run layout under deterministic names.
use crate::catalog::CalibrationCatalog;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// How a raw file is materialized in the working tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageMode {
    /// Symbolic link to the absolute source path.
    #[default]
    Link,
    /// Byte copy, for work trees on another filesystem.
    Copy,
}

/// What to do when a destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestagePolicy {
    #[default]
    Overwrite,
    SkipExisting,
}

/// Name `count` files after `stem`: a bare `{stem}.{ext}` for one file,
/// `{stem}_{NN}.{ext}` numbered from 0 otherwise.
pub fn artifact_file_names(stem: &str, ext: &str, count: usize) -> Vec<String> {
    if count == 1 {
        return vec![format!("{stem}.{ext}")];
    }
    (0..count)
        .map(|index| format!("{stem}_{index:02}.{ext}"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Stager {
    run_name: String,
    mode: StageMode,
    restage: RestagePolicy,
}

impl Stager {
    pub fn new(run_name: &str, mode: StageMode, restage: RestagePolicy) -> Self {
        Self {
            run_name: run_name.to_string(),
            mode,
            restage,
        }
    }

    /// Stage `inputs` into `dest_dir` as `{run}_{tag}[_NN].fits` and append
    /// the staged paths to the catalog entry for `tag`.
    pub fn stage(
        &self,
        inputs: &[PathBuf],
        dest_dir: &Path,
        tag: &str,
        catalog: &mut CalibrationCatalog,
    ) -> Result<Vec<PathBuf>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        fs::create_dir_all(dest_dir).with_context(|| format!("create {}", dest_dir.display()))?;
        let stem = format!("{}_{tag}", self.run_name);
        let names = artifact_file_names(&stem, crate::paths::IMAGE_EXT, inputs.len());
        let mut staged = Vec::with_capacity(inputs.len());
        for (source, name) in inputs.iter().zip(names) {
            let dest = dest_dir.join(name);
            self.stage_file(source, &dest)
                .with_context(|| format!("stage {tag} input {}", source.display()))?;
            staged.push(dest);
        }
        tracing::info!(tag, count = staged.len(), dir = %dest_dir.display(), "staged inputs");
        catalog.append(tag, staged.iter().cloned());
        Ok(staged)
    }

    fn stage_file(&self, source: &Path, dest: &Path) -> Result<()> {
        if !source.is_file() {
            return Err(anyhow!("source file {} does not exist", source.display()));
        }
        if self.restage == RestagePolicy::SkipExisting && dest.is_file() {
            tracing::debug!(dest = %dest.display(), "destination exists; keeping it");
            return Ok(());
        }
        // Also clears dangling links, which `is_file` does not see.
        if fs::symlink_metadata(dest).is_ok() {
            fs::remove_file(dest).with_context(|| format!("remove stale {}", dest.display()))?;
        }
        match self.mode {
            StageMode::Link => link_file(source, dest),
            StageMode::Copy => copy_file(source, dest),
        }
    }
}

fn link_file(source: &Path, dest: &Path) -> Result<()> {
    let target = source
        .canonicalize()
        .with_context(|| format!("resolve {}", source.display()))?;
    symlink(&target, dest)
        .with_context(|| format!("link {} -> {}", dest.display(), target.display()))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::copy(source, &tmp_path).with_context(|| format!("copy {}", source.display()))?;
    fs::rename(&tmp_path, dest).with_context(|| format!("publish {}", dest.display()))?;
    Ok(())
}
