//! Pipeline configuration.
//!
//! Settings come from an optional JSON file, then `OBPIPE_*` environment
//! variables, then command-line flags; later sources win.
use crate::operation::OperationKind;
use crate::staging::{RestagePolicy, StageMode};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

pub const ENV_RAW_DIR: &str = "OBPIPE_RAW_DIR";
pub const ENV_CALIB_DIR: &str = "OBPIPE_CALIB_DIR";
pub const ENV_WORK_ROOT: &str = "OBPIPE_WORK_ROOT";
pub const ENV_RECIPE_COMMAND: &str = "OBPIPE_RECIPE_COMMAND";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    /// Directory holding every raw file a manifest names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_dir: Option<PathBuf>,
    /// Directory holding default reference calibrations (distortion maps).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calib_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_root: Option<PathBuf>,
    #[serde(default)]
    pub stage_mode: StageMode,
    #[serde(default)]
    pub restage: RestagePolicy,
    #[serde(default = "default_recipe_command")]
    pub recipe_command: Vec<String>,
    /// Per-kind recipe name overrides.
    #[serde(default)]
    pub recipes: BTreeMap<OperationKind, String>,
}

/// Validated roots required before setup may touch the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRoots {
    pub raw_dir: PathBuf,
    pub calib_dir: PathBuf,
    pub work_root: PathBuf,
}

fn default_recipe_command() -> Vec<String> {
    vec!["esorex".to_string()]
}

pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        raw_dir: None,
        calib_dir: None,
        work_root: None,
        stage_mode: StageMode::default(),
        restage: RestagePolicy::default(),
        recipe_command: default_recipe_command(),
        recipes: BTreeMap::new(),
    }
}

/// Load a config file, or the defaults when no path is given, and apply the
/// process environment on top.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => default_config(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

pub fn read_config(path: &Path) -> Result<PipelineConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Apply `OBPIPE_*` overrides read through `lookup`.
pub fn apply_env_overrides(
    config: &mut PipelineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    if let Some(dir) = non_empty(ENV_RAW_DIR) {
        config.raw_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = non_empty(ENV_CALIB_DIR) {
        config.calib_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = non_empty(ENV_WORK_ROOT) {
        config.work_root = Some(PathBuf::from(dir));
    }
    if let Some(command) = non_empty(ENV_RECIPE_COMMAND) {
        config.recipe_command = shell_words::split(&command)
            .with_context(|| format!("parse {ENV_RECIPE_COMMAND}"))?;
    }
    Ok(())
}

pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {} (expected {CONFIG_SCHEMA_VERSION})",
            config.schema_version
        ));
    }
    if config.recipe_command.is_empty() {
        return Err(anyhow!("recipe_command must name a program"));
    }
    if let Some((kind, _)) = config
        .recipes
        .iter()
        .find(|(_, recipe)| recipe.trim().is_empty())
    {
        return Err(anyhow!("recipe name for {kind} must be non-empty"));
    }
    Ok(())
}

impl PipelineConfig {
    /// Configured work root, or `~/.local/share/obpipe/runs`.
    pub fn work_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.work_root {
            return Ok(root.clone());
        }
        default_work_root()
    }

    /// Check the roots setup reads from; nothing is created here.
    pub fn setup_roots(&self) -> Result<SetupRoots> {
        let raw_dir = existing_dir(self.raw_dir.as_deref(), "raw_dir", ENV_RAW_DIR)?;
        let calib_dir = existing_dir(self.calib_dir.as_deref(), "calib_dir", ENV_CALIB_DIR)?;
        Ok(SetupRoots {
            raw_dir,
            calib_dir,
            work_root: self.work_root()?,
        })
    }
}

fn existing_dir(dir: Option<&Path>, field: &str, env: &str) -> Result<PathBuf> {
    let dir = dir.ok_or_else(|| {
        anyhow!(
            "{field} is not configured (set {env} or --{})",
            field.replace('_', "-")
        )
    })?;
    if !dir.is_dir() {
        return Err(anyhow!("{field} {} is not a directory", dir.display()));
    }
    Ok(dir.to_path_buf())
}

pub fn default_work_root() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(data_dir.join("obpipe").join("runs"))
}

/// Pretty JSON for `obpipe config` and new config files.
pub fn render_config(config: &PipelineConfig) -> Result<String> {
    let mut text = serde_json::to_string_pretty(config).context("serialize config")?;
    text.push('\n');
    Ok(text)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
