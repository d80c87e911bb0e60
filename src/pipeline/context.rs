use super::ArtifactKey;
use crate::catalog::{CalibrationCatalog, StepOutputCatalog};
use crate::paths::RunPaths;
use crate::store::{Namespace, StateStore, StoreError};
use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

/// Everything one run's sequencer reads and extends.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub paths: RunPaths,
    pub calibration: CalibrationCatalog,
    pub steps: StepOutputCatalog,
    store: StateStore,
}

impl RunContext {
    pub fn new(paths: RunPaths, calibration: CalibrationCatalog, steps: StepOutputCatalog) -> Self {
        let store = StateStore::new(paths.clone());
        Self {
            paths,
            calibration,
            steps,
            store,
        }
    }

    /// Reload a run from its persisted catalogs.
    ///
    /// The calibration catalog must exist (setup has run); a missing step
    /// catalog means nothing has executed yet.
    pub fn load(paths: RunPaths) -> Result<Self> {
        let store = StateStore::new(paths.clone());
        let calibration: CalibrationCatalog = match store.load(Namespace::Calibration) {
            Ok(catalog) => catalog,
            Err(err) if err.is_not_found() => {
                return Err(anyhow!(
                    "run `{}` has no calibration catalog at {} (run `obpipe setup` first)",
                    paths.run_name(),
                    paths.caldata_path().display()
                ));
            }
            Err(err) => return Err(err).context("load calibration catalog"),
        };
        let steps: StepOutputCatalog = store
            .load_or_default(Namespace::Step)
            .context("load step-output catalog")?;
        Ok(Self::new(paths, calibration, steps))
    }

    pub fn lookup(&self, key: &ArtifactKey) -> Option<&[PathBuf]> {
        match key {
            ArtifactKey::Calibration(tag) => self.calibration.get(tag),
            ArtifactKey::Step(key) => self.steps.get(key),
        }
        .filter(|paths| !paths.is_empty())
    }

    /// Save `steps` and adopt it; on failure the held catalog is unchanged.
    pub(crate) fn commit_steps(&mut self, steps: StepOutputCatalog) -> Result<(), StoreError> {
        self.store.save(Namespace::Step, &steps)?;
        self.steps = steps;
        Ok(())
    }
}
