//! Step sequencing over a run's fixed reduction DAG.
mod context;
mod driver;
mod fallback;
mod plan;
mod sequencer;
mod steps;

pub use context::RunContext;
pub use driver::{reduce, ReduceOptions};
pub use plan::{plan, PlanStatus};
pub use sequencer::{Sequencer, StepError};
pub use steps::{build_pipeline, ArtifactKey, CalibrationSource, Condition, StepDescriptor};
