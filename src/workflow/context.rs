use crate::cli::GlobalArgs;
use crate::config::{self, PipelineConfig};
use crate::operation::recipe::RecipeRunner;
use crate::paths::RunPaths;
use crate::pipeline::RunContext;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

/// Effective settings shared by every command.
pub(crate) struct WorkflowContext {
    pub(crate) config: PipelineConfig,
    pub(crate) work_root: PathBuf,
}

impl WorkflowContext {
    /// Load the config file (if any), then environment, then CLI overrides.
    pub(crate) fn load(global: &GlobalArgs) -> Result<Self> {
        let mut config = config::load_config(global.config.as_deref())?;
        if let Some(root) = &global.work_root {
            config.work_root = Some(root.clone());
        }
        let work_root = config.work_root()?;
        Ok(Self { config, work_root })
    }

    pub(crate) fn run_paths(&self, run: &str) -> Result<RunPaths> {
        validate_run_name(run)?;
        Ok(RunPaths::new(&self.work_root, run))
    }

    /// Reload a run that has been set up.
    pub(crate) fn load_run(&self, run: &str) -> Result<RunContext> {
        let paths = self.run_paths(run)?;
        if !paths.root().is_dir() {
            return Err(anyhow!(
                "run `{run}` not found under {} (run `obpipe setup` first)",
                self.work_root.display()
            ));
        }
        RunContext::load(paths)
    }

    /// Build the recipe runner and check its program is on PATH.
    pub(crate) fn recipe_runner(&self) -> Result<RecipeRunner> {
        let runner = RecipeRunner::new(&self.config.recipe_command, self.config.recipes.clone())?;
        let program = runner.locate()?;
        tracing::debug!(program = %program.display(), "recipe program");
        Ok(runner)
    }
}

/// Run names become directory and file-name prefixes.
pub(crate) fn validate_run_name(run: &str) -> Result<()> {
    let valid = !run.is_empty()
        && !run.starts_with('.')
        && run
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(anyhow!(
            "invalid run name {run:?} (use letters, digits, '_', '-', '.')"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_run_name;

    #[test]
    fn run_names_are_plain_path_components() {
        assert!(validate_run_name("ob1_2019-03-02.a").is_ok());
        assert!(validate_run_name("").is_err());
        assert!(validate_run_name("../x").is_err());
        assert!(validate_run_name(".hidden").is_err());
        assert!(validate_run_name("a b").is_err());
    }
}
