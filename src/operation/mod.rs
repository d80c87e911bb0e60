//! Processing-operation boundary.
//!
//! Operations are opaque: they receive named artifact lists and declared
//! output destinations, and report what they produced. Each kind declares its
//! roles once; every invocation is checked against that contract here, not
//! inside individual operations.
mod kind;
pub mod recipe;
#[cfg(test)]
pub(crate) mod testing;

pub use kind::{Cardinality, OperationKind};

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Role name to ordered artifact paths.
pub type Artifacts = BTreeMap<String, Vec<PathBuf>>;

/// One call into a processing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step: String,
    pub kind: OperationKind,
    /// Directory the operation writes its outputs and scratch files into.
    pub workdir: PathBuf,
    pub inputs: Artifacts,
    pub calibrations: Artifacts,
    /// Destinations the operation must create, by output role.
    pub outputs: Artifacts,
}

/// A processing backend able to run every operation kind.
pub trait Operation {
    fn invoke(&self, invocation: &Invocation) -> Result<Artifacts>;
}

/// Violation of an operation kind's declared contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("required input role `{0}` is empty")]
    MissingInput(&'static str),
    #[error("input role `{0}` is not accepted")]
    UnexpectedInput(String),
    #[error("calibration role `{role}` needs exactly one file, got {count}")]
    Calibration { role: &'static str, count: usize },
    #[error("calibration role `{0}` is not accepted")]
    UnexpectedCalibration(String),
    #[error("output role `{role}` expects {expected} file(s), got {actual}")]
    OutputCount {
        role: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("output role `{0}` is not declared")]
    UnexpectedOutput(String),
    #[error("output role `{0}` was not produced")]
    OutputNotProduced(String),
    #[error("output {} for role `{role}` does not exist", .path.display())]
    OutputMissingOnDisk { role: String, path: PathBuf },
}

impl Invocation {
    /// Number of frames in the primary input role.
    pub fn primary_frames(&self) -> usize {
        let primary = self.kind.input_roles()[0];
        self.inputs.get(primary).map_or(0, Vec::len)
    }

    /// Check the invocation against its kind before it runs.
    pub fn validate(&self) -> Result<(), ContractError> {
        let kind = self.kind;
        for role in kind.input_roles() {
            if self.inputs.get(*role).is_none_or(Vec::is_empty) {
                return Err(ContractError::MissingInput(*role));
            }
        }
        for role in self.inputs.keys() {
            let known = kind.input_roles().contains(&role.as_str())
                || kind.optional_input_roles().contains(&role.as_str());
            if !known {
                return Err(ContractError::UnexpectedInput(role.clone()));
            }
        }
        for role in kind.calibration_roles() {
            let count = self.calibrations.get(*role).map_or(0, Vec::len);
            if count != 1 {
                return Err(ContractError::Calibration { role: *role, count });
            }
        }
        if let Some(role) = self
            .calibrations
            .keys()
            .find(|role| !kind.calibration_roles().contains(&role.as_str()))
        {
            return Err(ContractError::UnexpectedCalibration(role.clone()));
        }
        for spec in kind.outputs() {
            let expected = match spec.cardinality {
                Cardinality::One => 1,
                Cardinality::PerFrame => self.primary_frames(),
            };
            let actual = self.outputs.get(spec.role).map_or(0, Vec::len);
            if actual != expected {
                return Err(ContractError::OutputCount {
                    role: spec.role,
                    expected,
                    actual,
                });
            }
        }
        if let Some(role) = self.outputs.keys().find(|role| kind.output(role).is_none()) {
            return Err(ContractError::UnexpectedOutput(role.clone()));
        }
        Ok(())
    }

    /// Check what an operation reported against the declared outputs.
    pub fn check_produced(&self, produced: &Artifacts) -> Result<(), ContractError> {
        for role in self.outputs.keys() {
            let paths = produced
                .get(role)
                .filter(|paths| !paths.is_empty())
                .ok_or_else(|| ContractError::OutputNotProduced(role.clone()))?;
            if let Some(path) = paths.iter().find(|path| !path.is_file()) {
                return Err(ContractError::OutputMissingOnDisk {
                    role: role.clone(),
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}
