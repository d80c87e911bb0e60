//! Dry-run planning over the same descriptor list the driver executes.
use super::fallback::resolve_calibration;
use super::{build_pipeline, ArtifactKey, CalibrationSource, RunContext};
use crate::operation::OperationKind;
use crate::paths::MASTER_TAG;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Every output key is already recorded.
    Done,
    /// All inputs are available now.
    Ready,
    /// Inputs will be produced by earlier steps of this plan.
    Waiting,
    /// Some input is neither available nor produced upstream.
    Blocked,
    /// Disabled for this run's calibration catalog.
    Skipped,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Done => "done",
            PlanStatus::Ready => "ready",
            PlanStatus::Waiting => "waiting",
            PlanStatus::Blocked => "blocked",
            PlanStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub step: String,
    pub operation: OperationKind,
    pub status: PlanStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

/// Plan every step of the run's DAG without invoking anything.
pub fn plan(ctx: &RunContext) -> Vec<PlannedStep> {
    let steps = build_pipeline(&ctx.calibration);
    let mut produced_keys: BTreeSet<String> = BTreeSet::new();
    let mut produced_products: BTreeSet<(String, &'static str)> = BTreeSet::new();
    let mut planned = Vec::with_capacity(steps.len());

    for step in &steps {
        let mut entry = PlannedStep {
            step: step.name.clone(),
            operation: step.kind,
            status: PlanStatus::Ready,
            missing: Vec::new(),
        };
        if !step.is_enabled(&ctx.calibration) {
            entry.status = PlanStatus::Skipped;
            planned.push(entry);
            continue;
        }
        if step.is_done(&ctx.steps) {
            entry.status = PlanStatus::Done;
            planned.push(entry);
            continue;
        }

        let mut waiting = false;
        for key in step.required_keys() {
            if ctx.lookup(key).is_some() {
                continue;
            }
            match key {
                ArtifactKey::Step(name) if produced_keys.contains(name) => waiting = true,
                _ => entry.missing.push(key.to_string()),
            }
        }
        for binding in &step.calibrations {
            match &binding.source {
                CalibrationSource::Product { artifact } => {
                    if resolve_calibration(&ctx.paths, &step.tag, artifact).is_some() {
                        continue;
                    }
                    let upstream = produced_products.contains(&(step.tag.clone(), *artifact))
                        || produced_products.contains(&(MASTER_TAG.to_string(), *artifact));
                    if upstream {
                        waiting = true;
                    } else {
                        entry.missing.push(format!("product:{}_{artifact}", step.tag));
                    }
                }
                CalibrationSource::Catalog(tag) => {
                    let key = ArtifactKey::calibration(tag.as_str());
                    if ctx.lookup(&key).is_none() {
                        entry.missing.push(key.to_string());
                    }
                }
            }
        }

        entry.status = if !entry.missing.is_empty() {
            PlanStatus::Blocked
        } else if waiting {
            PlanStatus::Waiting
        } else {
            PlanStatus::Ready
        };
        if entry.status != PlanStatus::Blocked {
            for output in &step.outputs {
                produced_keys.insert(output.key.clone());
                produced_products.insert((step.tag.clone(), output.artifact));
            }
        }
        planned.push(entry);
    }
    planned
}
