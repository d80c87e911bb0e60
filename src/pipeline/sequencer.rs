//! Step sequencer: resolves a step's inputs, invokes its operation, and
//! persists the outputs before the next step may start.
//!
//! Per-step state is never stored. A step is done when every output key it
//! declares is in the step-output catalog; running and failed exist only for
//! the lifetime of this process.
use super::fallback::resolve_calibration;
use super::{build_pipeline, ArtifactKey, CalibrationSource, RunContext, StepDescriptor};
use crate::operation::{Artifacts, Cardinality, ContractError, Invocation, Operation, OperationKind};
use crate::catalog::describe_paths;
use crate::store::StoreError;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    Running,
    Done,
    Failed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Done => "done",
            StepState::Failed => "failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("unknown step `{step}`")]
    UnknownStep { step: String },

    #[error("step `{step}` is disabled for this run ({reason})")]
    Disabled { step: String, reason: String },

    #[error("step `{step}` is blocked; missing {}", .missing.join(", "))]
    Blocked { step: String, missing: Vec<String> },

    #[error("step `{step}` ({kind}) rejected: {source}")]
    Contract {
        step: String,
        kind: OperationKind,
        source: ContractError,
    },

    #[error("step `{step}` ({kind}) failed: {source:#}")]
    Operation {
        step: String,
        kind: OperationKind,
        source: anyhow::Error,
    },

    #[error("step `{step}` finished but its outputs could not be persisted: {source}")]
    Persist { step: String, source: StoreError },
}

/// What one successful step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub outputs: Vec<(String, Vec<PathBuf>)>,
    /// Calibration roles served by the master artifact.
    pub master_fallbacks: Vec<String>,
}

/// A fully resolved invocation plus the bookkeeping needed to record it.
#[derive(Debug, Clone)]
pub(crate) struct PreparedStep {
    pub(crate) invocation: Invocation,
    pub(crate) master_fallbacks: Vec<String>,
}

pub struct Sequencer<'a> {
    ctx: RunContext,
    steps: Vec<StepDescriptor>,
    backend: &'a dyn Operation,
    running: Option<String>,
    failed: BTreeSet<String>,
}

impl<'a> Sequencer<'a> {
    /// Build the run's fixed DAG from its calibration catalog.
    pub fn new(ctx: RunContext, backend: &'a dyn Operation) -> Self {
        let steps = build_pipeline(&ctx.calibration);
        Self {
            ctx,
            steps,
            backend,
            running: None,
            failed: BTreeSet::new(),
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn descriptor(&self, name: &str) -> Result<&StepDescriptor, StepError> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .ok_or_else(|| StepError::UnknownStep {
                step: name.to_string(),
            })
    }

    pub fn is_enabled(&self, step: &StepDescriptor) -> bool {
        step.is_enabled(&self.ctx.calibration)
    }

    pub fn is_done(&self, step: &StepDescriptor) -> bool {
        step.is_done(&self.ctx.steps)
    }

    pub fn state(&self, name: &str) -> StepState {
        if self.running.as_deref() == Some(name) {
            return StepState::Running;
        }
        if self.failed.contains(name) {
            return StepState::Failed;
        }
        match self.descriptor(name) {
            Ok(step) if self.is_done(step) => StepState::Done,
            _ => StepState::Pending,
        }
    }

    /// Resolve every input, calibration, and output path for a step.
    pub(crate) fn prepare(&self, step: &StepDescriptor) -> Result<PreparedStep, StepError> {
        let mut missing = Vec::new();
        let mut inputs = Artifacts::new();
        for binding in &step.inputs {
            match self.ctx.lookup(&binding.key) {
                Some(paths) => inputs
                    .entry(binding.role.to_string())
                    .or_default()
                    .extend(paths.iter().cloned()),
                None if binding.optional => {}
                None => missing.push(binding.key.to_string()),
            }
        }

        let mut calibrations = Artifacts::new();
        let mut master_fallbacks = Vec::new();
        for binding in &step.calibrations {
            match &binding.source {
                CalibrationSource::Product { artifact } => {
                    match resolve_calibration(&self.ctx.paths, &step.tag, artifact) {
                        Some(resolved) => {
                            if resolved.from_master {
                                master_fallbacks.push(binding.role.to_string());
                            }
                            calibrations.insert(binding.role.to_string(), vec![resolved.path]);
                        }
                        None => missing.push(
                            self.ctx
                                .paths
                                .product_path(&step.tag, artifact, crate::paths::IMAGE_EXT)
                                .display()
                                .to_string(),
                        ),
                    }
                }
                CalibrationSource::Catalog(tag) => {
                    let key = ArtifactKey::calibration(tag.as_str());
                    match self.ctx.lookup(&key) {
                        Some(paths) => {
                            calibrations.insert(binding.role.to_string(), paths.to_vec());
                        }
                        None => missing.push(key.to_string()),
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(StepError::Blocked {
                step: step.name.clone(),
                missing,
            });
        }

        let primary = step.kind.input_roles()[0];
        let frames = inputs.get(primary).map_or(0, Vec::len);
        let mut outputs = Artifacts::new();
        for binding in &step.outputs {
            let Some(spec) = step.kind.output(binding.role) else {
                continue;
            };
            let count = match spec.cardinality {
                Cardinality::One => 1,
                Cardinality::PerFrame => frames,
            };
            let paths = self.ctx.paths.product_paths(
                &step.tag,
                binding.artifact,
                spec.format.extension(),
                count,
            );
            outputs.insert(binding.role.to_string(), paths);
        }

        let invocation = Invocation {
            step: step.name.clone(),
            kind: step.kind,
            workdir: self.ctx.paths.products_dir(),
            inputs,
            calibrations,
            outputs,
        };
        invocation.validate().map_err(|source| StepError::Contract {
            step: step.name.clone(),
            kind: step.kind,
            source,
        })?;
        Ok(PreparedStep {
            invocation,
            master_fallbacks,
        })
    }

    /// Run one step now. The caller is responsible for DAG order and for
    /// skipping steps that are already done.
    pub fn run_step(&mut self, name: &str) -> Result<StepReport, StepError> {
        let step = self.descriptor(name)?.clone();
        if !self.is_enabled(&step) {
            return Err(StepError::Disabled {
                step: step.name.clone(),
                reason: disabled_reason(&step),
            });
        }
        let prepared = self.prepare(&step)?;
        let invocation = &prepared.invocation;

        self.running = Some(step.name.clone());
        tracing::info!(step = %step.name, kind = %step.kind, state = %StepState::Running, "step started");
        for (role, paths) in invocation.inputs.iter().chain(&invocation.calibrations) {
            tracing::debug!(step = %step.name, role = %role, files = %describe_paths(paths), "bound");
        }
        let result = self.backend.invoke(invocation);
        self.running = None;

        let produced = match result {
            Ok(produced) => produced,
            Err(source) => {
                return Err(self.fail(
                    &step,
                    StepError::Operation {
                        step: step.name.clone(),
                        kind: step.kind,
                        source,
                    },
                ));
            }
        };
        if let Err(source) = invocation.check_produced(&produced) {
            return Err(self.fail(
                &step,
                StepError::Contract {
                    step: step.name.clone(),
                    kind: step.kind,
                    source,
                },
            ));
        }

        let mut steps = self.ctx.steps.clone();
        let mut outputs = Vec::with_capacity(step.outputs.len());
        for binding in &step.outputs {
            let paths = produced.get(binding.role).cloned().unwrap_or_default();
            steps.record(&binding.key, paths.clone());
            outputs.push((binding.key.clone(), paths));
        }
        if let Err(source) = self.ctx.commit_steps(steps) {
            return Err(self.fail(
                &step,
                StepError::Persist {
                    step: step.name.clone(),
                    source,
                },
            ));
        }
        self.failed.remove(&step.name);
        tracing::info!(step = %step.name, state = %StepState::Done, outputs = outputs.len(), "step finished");
        Ok(StepReport {
            step: step.name,
            outputs,
            master_fallbacks: prepared.master_fallbacks,
        })
    }

    fn fail(&mut self, step: &StepDescriptor, err: StepError) -> StepError {
        tracing::error!(step = %step.name, state = %StepState::Failed, "{err}");
        self.failed.insert(step.name.clone());
        err
    }
}

pub(crate) fn disabled_reason(step: &StepDescriptor) -> String {
    match &step.condition {
        super::Condition::Always => "always enabled".to_string(),
        super::Condition::CalibrationPresent(tag) => format!("no `{tag}` calibration frames"),
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;
